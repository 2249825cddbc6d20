//! Result types and rendering of label maps.

use image::{Rgb, RgbImage};

use crate::color::{luv_to_rgb, RangeVector};
use crate::diagnostics::Diagnostics;
use crate::grid::Grid;
use crate::regions::RegionSet;

/// Per-pixel region labels, dense in `0..region_count`.
pub type LabelMap = Grid<u32>;

/// Segmentation of an RGB image.
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub labels: LabelMap,
    /// Mode of each region in `L, u, v`.
    pub modes: Vec<RangeVector>,
    /// Mode of each region converted back to RGB.
    pub palette: Vec<Rgb<u8>>,
    pub region_sizes: Vec<usize>,
    pub diagnostics: Diagnostics,
}

impl Segmentation {
    pub(crate) fn from_regions(regions: RegionSet, diagnostics: Diagnostics) -> Self {
        let palette = regions.modes.iter().map(|mode| luv_to_rgb(*mode)).collect();
        Self {
            labels: regions.labels,
            modes: regions.modes,
            palette,
            region_sizes: regions.counts,
            diagnostics,
        }
    }

    #[inline]
    pub fn region_count(&self) -> usize {
        self.palette.len()
    }

    /// Image where every pixel takes its region's palette color.
    pub fn render(&self) -> RgbImage {
        let width = self.labels.width();
        RgbImage::from_fn(width as u32, self.labels.height() as u32, |x, y| {
            self.palette[self.labels[(x as usize, y as usize)] as usize]
        })
    }
}

/// Segmentation of three pre-split channels. Modes stay in channel units.
#[derive(Debug, Clone)]
pub struct ChannelSegmentation {
    pub labels: LabelMap,
    pub modes: Vec<RangeVector>,
    pub region_sizes: Vec<usize>,
    pub diagnostics: Diagnostics,
}

impl ChannelSegmentation {
    pub(crate) fn from_regions(regions: RegionSet, diagnostics: Diagnostics) -> Self {
        Self {
            labels: regions.labels,
            modes: regions.modes,
            region_sizes: regions.counts,
            diagnostics,
        }
    }

    #[inline]
    pub fn region_count(&self) -> usize {
        self.modes.len()
    }
}

/// Every output of one RGB segmentation run.
#[derive(Debug, Clone)]
pub struct FullSegmentation {
    /// Mean-shift filtered image. `None` for the classic algorithm, which
    /// has no per-pixel filtering stage.
    pub filtered: Option<RgbImage>,
    /// Image painted with region colors.
    pub segmented: RgbImage,
    pub segmentation: Segmentation,
}

/// Converts per-pixel range vectors back to an RGB image.
pub(crate) fn render_filtered(width: usize, height: usize, modes: &[RangeVector]) -> RgbImage {
    debug_assert_eq!(modes.len(), width * height);
    RgbImage::from_fn(width as u32, height as u32, |x, y| {
        luv_to_rgb(modes[y as usize * width + x as usize])
    })
}
