//! Joint spatial-range feature space.
//!
//! Each pixel `(row, col)` becomes the vector `[row, col, c1, c2, c3]`, where
//! the range channels are `L, u, v` for RGB input or the raw channel values
//! for pre-split input.

use image::RgbImage;

use crate::color::{rgb_to_luv, RangeVector};
use crate::error::{try_alloc, Result, SegmentationError};
use crate::grid::Grid;

pub const SPATIAL_DIMS: usize = 2;
pub const RANGE_DIMS: usize = 3;
pub const FEATURE_DIMS: usize = SPATIAL_DIMS + RANGE_DIMS;

#[derive(Debug, Clone)]
pub struct FeatureSpace {
    width: usize,
    height: usize,
    features: Vec<f32>,
}

impl FeatureSpace {
    pub fn from_rgb(image: &RgbImage) -> Result<Self> {
        let width = image.width() as usize;
        Self::from_range_fn(width, image.height() as usize, |idx| {
            rgb_to_luv(*image.get_pixel((idx % width) as u32, (idx / width) as u32))
        })
    }

    /// Uses three equally sized channels directly as the range space.
    pub fn from_channels<T: Copy + Into<f32>>(
        first: &Grid<T>,
        second: &Grid<T>,
        third: &Grid<T>,
    ) -> Result<Self> {
        if first.dimensions() != second.dimensions() || first.dimensions() != third.dimensions() {
            return Err(SegmentationError::ChannelSizeMismatch {
                first: first.dimensions(),
                second: second.dimensions(),
                third: third.dimensions(),
            });
        }

        Self::from_range_fn(first.width(), first.height(), |idx| {
            [first[idx].into(), second[idx].into(), third[idx].into()]
        })
    }

    pub(crate) fn from_range_fn(
        width: usize,
        height: usize,
        mut range_at: impl FnMut(usize) -> RangeVector,
    ) -> Result<Self> {
        let pixel_count = width * height;
        let mut features = try_alloc("feature space", pixel_count * FEATURE_DIMS, 0.0f32)?;

        for (idx, feature) in features.chunks_exact_mut(FEATURE_DIMS).enumerate() {
            let range = range_at(idx);
            feature[0] = (idx / width) as f32;
            feature[1] = (idx % width) as f32;
            feature[SPATIAL_DIMS..].copy_from_slice(&range);
        }

        Ok(Self {
            width,
            height,
            features,
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Full feature vector of pixel `idx`.
    #[inline]
    pub fn feature(&self, idx: usize) -> &[f32] {
        &self.features[idx * FEATURE_DIMS..(idx + 1) * FEATURE_DIMS]
    }

    #[inline]
    pub fn range(&self, idx: usize) -> RangeVector {
        let base = idx * FEATURE_DIMS + SPATIAL_DIMS;
        [
            self.features[base],
            self.features[base + 1],
            self.features[base + 2],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_layout_is_row_col_range() {
        let first = Grid::from_fn(3, 2, |x, y| (10 * y + x) as u8);
        let second = Grid::new_filled(3, 2, 1u8);
        let third = Grid::new_filled(3, 2, 2u8);
        let space = FeatureSpace::from_channels(&first, &second, &third).unwrap();

        assert_eq!(space.pixel_count(), 6);
        assert_eq!(space.features.len(), 6 * FEATURE_DIMS);
        // Pixel (x=2, y=1) lives at index 5: row 1, column 2.
        assert_eq!(space.feature(5), &[1.0, 2.0, 12.0, 1.0, 2.0]);
        assert_eq!(space.range(3), [10.0, 1.0, 2.0]);
    }

    #[test]
    fn test_rgb_uses_luv() {
        let image = RgbImage::from_pixel(2, 2, Rgb([255, 255, 255]));
        let space = FeatureSpace::from_rgb(&image).unwrap();
        let range = space.range(3);
        assert!((range[0] - 100.0).abs() < 0.1);
        assert_eq!(&space.feature(3)[..SPATIAL_DIMS], &[1.0, 1.0]);
    }

    #[test]
    fn test_empty_image() {
        let space = FeatureSpace::from_rgb(&RgbImage::new(0, 0)).unwrap();
        assert!(space.is_empty());
        assert_eq!(space.pixel_count(), 0);
    }

    #[test]
    fn test_channel_size_mismatch() {
        let a = Grid::new_filled(2, 2, 0.0f32);
        let b = Grid::new_filled(2, 3, 0.0f32);
        let result = FeatureSpace::from_channels(&a, &a, &b);
        assert!(matches!(
            result,
            Err(SegmentationError::ChannelSizeMismatch { third: (2, 3), .. })
        ));
    }
}
