//! Connected-component labeling of the filtered image.
//!
//! Pixels are joined through 4-connectivity when their keys are equal. For the
//! feature-space algorithm the key is the filtered range vector rounded to
//! integers per channel. Labels are assigned in row-major order of each
//! component's first pixel.


use crate::color::RangeVector;
use crate::error::{try_alloc, Result};
use crate::grid::Grid;
use crate::regions::RegionSet;

const UNLABELED: u32 = u32::MAX;

/// Dense component labels with per-component pixel counts.
#[derive(Debug, Clone, PartialEq)]
pub struct Components {
    pub labels: Grid<u32>,
    pub counts: Vec<usize>,
}

/// Labels 4-connected components of equal keys with an explicit stack.
pub fn label_components<K: Copy + Eq>(
    width: usize,
    height: usize,
    keys: &[K],
) -> Result<Components> {
    debug_assert_eq!(keys.len(), width * height);

    let mut labels = try_alloc("labels", keys.len(), UNLABELED)?;
    let mut counts = Vec::new();
    let mut stack = Vec::new();

    for seed in 0..keys.len() {
        if labels[seed] != UNLABELED {
            continue;
        }

        let label = counts.len() as u32;
        let key = keys[seed];
        let mut count = 0;
        labels[seed] = label;
        stack.push(seed);

        while let Some(idx) = stack.pop() {
            count += 1;
            let x = idx % width;
            let y = idx / width;

            let mut visit = |neighbor: usize| {
                if labels[neighbor] == UNLABELED && keys[neighbor] == key {
                    labels[neighbor] = label;
                    stack.push(neighbor);
                }
            };
            if x > 0 {
                visit(idx - 1);
            }
            if x + 1 < width {
                visit(idx + 1);
            }
            if y > 0 {
                visit(idx - width);
            }
            if y + 1 < height {
                visit(idx + width);
            }
        }

        counts.push(count);
    }

    Ok(Components {
        labels: Grid::from_vec(width, height, labels),
        counts,
    })
}

/// Rounds each range channel to the nearest integer.
#[inline]
pub fn quantize(range: &RangeVector) -> [i32; 3] {
    range.map(|value| value.round() as i32)
}

/// Partitions the filtered image into regions of identical quantized color.
///
/// Each region's mode is the mean of its members' unrounded filtered values.
pub fn label_regions(width: usize, height: usize, filtered: &[RangeVector]) -> Result<RegionSet> {
    let mut keys = try_alloc("quantized colors", filtered.len(), [0i32; 3])?;
    for (key, range) in keys.iter_mut().zip(filtered) {
        *key = quantize(range);
    }

    let Components { labels, counts } = label_components(width, height, &keys)?;

    let mut sums = try_alloc("mode sums", counts.len(), [0.0f64; 3])?;
    for (&label, range) in labels.data().iter().zip(filtered) {
        for (sum, value) in sums[label as usize].iter_mut().zip(range) {
            *sum += *value as f64;
        }
    }
    let modes = sums
        .iter()
        .zip(&counts)
        .map(|(sum, &count)| sum.map(|value| (value / count as f64) as f32))
        .collect();

    tracing::debug!("Labeling: {} regions", counts.len());

    Ok(RegionSet {
        labels,
        modes,
        counts,
    })
}
