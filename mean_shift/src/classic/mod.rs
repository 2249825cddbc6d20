//! Legacy color-histogram mean-shift segmentation.
//!
//! Color classes are found one at a time by mean-shifting seed colors over
//! the histogram of the not yet classified pixels. A class is accepted when
//! the sphere around its converged color holds enough pixels. Leftover pixels
//! go to the nearest class, undersized classes are dropped and, unless only
//! quantization is requested, small connected regions are absorbed by the
//! neighbouring class with the closest color.
//!
//! Labels of the result are class indices, so two disconnected areas of the
//! same class share a label.


use hashbrown::HashMap;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::adjacency::RegionAdjacency;
use crate::color::RangeVector;
use crate::config::{ClassicConfig, Rect, SegmentationDegree};
use crate::error::{try_alloc, Result};
use crate::feature_space::FeatureSpace;
use crate::grid::Grid;
use crate::labeling::{label_components, quantize, Components};
use crate::regions::RegionSet;

const NO_CLASS: u32 = u32::MAX;

/// Lower bound of the search radius. Keeps a flat image searchable.
const MIN_RADIUS: f64 = 1.0;

/// Color-space shift under which a seed counts as converged.
const SHIFT_EPSILON: f64 = 0.1;

/// Already classified 8-neighbours a pixel needs to join a class, per
/// [`SegmentationDegree::index`].
const NEIGHBOUR_VOTES: [usize; 3] = [1, 2, 3];

/// Upper bound on the classes the automatic search may find.
pub(crate) const AUTO_MAX_CLASSES: usize = 50;

/// Counters of one classic run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassicStats {
    pub radius: f64,
    pub class_threshold: usize,
    pub classes_found: usize,
    pub failed_trials: usize,
}

/// Distinct quantized colors with their number of unclassified pixels.
struct ColorHistogram {
    colors: Vec<RangeVector>,
    remaining: Vec<usize>,
    pixel_colors: Vec<u32>,
}

impl ColorHistogram {
    fn build(space: &FeatureSpace) -> Result<Self> {
        let mut index: HashMap<[i32; 3], u32> = HashMap::new();
        let mut colors = Vec::new();
        let mut remaining = Vec::new();
        let mut pixel_colors = try_alloc("pixel colors", space.pixel_count(), 0u32)?;

        for (idx, pixel_color) in pixel_colors.iter_mut().enumerate() {
            let key = quantize(&space.range(idx));
            let color = *index.entry(key).or_insert_with(|| {
                colors.push(key.map(|value| value as f32));
                remaining.push(0);
                (colors.len() - 1) as u32
            });
            remaining[color as usize] += 1;
            *pixel_color = color;
        }

        Ok(Self {
            colors,
            remaining,
            pixel_colors,
        })
    }

    #[inline]
    fn color_of(&self, idx: usize) -> &RangeVector {
        &self.colors[self.pixel_colors[idx] as usize]
    }

    fn remove_pixel(&mut self, idx: usize) {
        self.remaining[self.pixel_colors[idx] as usize] -= 1;
    }

    /// Unclassified pixels whose color lies within the sphere.
    fn density(&self, center: &[f64; 3], radius_sq: f64) -> usize {
        self.colors
            .iter()
            .zip(&self.remaining)
            .filter(|&(color, &count)| count > 0 && distance_sq(color, center) <= radius_sq)
            .map(|(_, &count)| count)
            .sum()
    }

    /// Moves `center` to the count-weighted mean of the unclassified colors
    /// inside its sphere until it settles.
    fn shift(&self, mut center: [f64; 3], radius_sq: f64, max_iterations: usize) -> [f64; 3] {
        for _ in 0..max_iterations {
            let mut sum = [0.0f64; 3];
            let mut total = 0usize;
            for (color, &count) in self.colors.iter().zip(&self.remaining) {
                if count == 0 || distance_sq(color, &center) > radius_sq {
                    continue;
                }
                for (sum, value) in sum.iter_mut().zip(color) {
                    *sum += count as f64 * *value as f64;
                }
                total += count;
            }
            if total == 0 {
                break;
            }

            let mean = sum.map(|value| value / total as f64);
            let shift_sq: f64 = mean
                .iter()
                .zip(&center)
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            center = mean;
            if shift_sq < SHIFT_EPSILON * SHIFT_EPSILON {
                break;
            }
        }
        center
    }
}

pub(crate) struct ClassicSegmenter<'a> {
    space: &'a FeatureSpace,
    config: &'a ClassicConfig,
    histogram: ColorHistogram,
    assignment: Vec<u32>,
    classes: Vec<[f64; 3]>,
    unclassified: usize,
    radius_sq: f64,
    stats: ClassicStats,
}

impl<'a> ClassicSegmenter<'a> {
    pub(crate) fn new(space: &'a FeatureSpace, config: &'a ClassicConfig) -> Result<Self> {
        let pixel_count = space.pixel_count();
        let option = config.option.index();

        let histogram = ColorHistogram::build(space)?;
        let radius_factor = if config.is_auto() {
            config.auto_radius[option]
        } else {
            config.rect_radius[option]
        };
        let radius =
            (radius_factor as f64 * variance_factor(space, config.min_var)).max(MIN_RADIUS);
        let class_threshold =
            ((config.class_threshold[option] * pixel_count as f64 / 1000.0).ceil() as usize).max(1);

        Ok(Self {
            space,
            config,
            histogram,
            assignment: try_alloc("class assignment", pixel_count, NO_CLASS)?,
            classes: Vec::new(),
            unclassified: pixel_count,
            radius_sq: radius * radius,
            stats: ClassicStats {
                radius,
                class_threshold,
                ..Default::default()
            },
        })
    }

    pub(crate) fn run(mut self) -> Result<(RegionSet, ClassicStats)> {
        let width = self.space.width();
        let height = self.space.height();
        if self.space.is_empty() {
            return Ok((RegionSet::empty(width, height), self.stats));
        }

        if self.config.is_auto() {
            self.search_auto();
        } else {
            let config = self.config;
            for rect in &config.rects {
                self.search_rect(rect);
            }
        }
        self.stats.classes_found = self.classes.len();

        if self.classes.is_empty() {
            let mean = mean_range(self.space, 0..self.space.pixel_count());
            self.classes.push(mean);
        }
        self.assign_nearest(|_| true);
        self.recompute_class_colors();
        self.eliminate_small_classes();

        if self.config.option != SegmentationDegree::Quantization {
            self.absorb_small_regions()?;
        }

        let regions = self.into_regions();
        tracing::debug!(
            "Classic segmentation: {} classes found, {} kept, radius {:.2}",
            self.stats.classes_found,
            regions.region_count(),
            self.stats.radius
        );
        Ok((regions, self.stats))
    }

    // ========================================================================
    // Class search
    // ========================================================================

    fn search_auto(&mut self) {
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let mut candidates = Vec::new();
        let mut failures = 0;

        while failures < self.config.max_trial
            && self.unclassified >= self.stats.class_threshold
            && self.classes.len() < AUTO_MAX_CLASSES
        {
            candidates.clear();
            candidates.extend(
                self.assignment
                    .iter()
                    .enumerate()
                    .filter(|&(_, &class)| class == NO_CLASS)
                    .map(|(idx, _)| idx),
            );

            let Some(seed) = self.sample_seed(&mut rng, &candidates) else {
                break;
            };
            let center = self
                .histogram
                .shift(seed, self.radius_sq, self.config.trial_to_converge);

            if self.histogram.density(&center, self.radius_sq) < self.stats.class_threshold {
                failures += 1;
                self.stats.failed_trials += 1;
                continue;
            }
            failures = 0;
            self.add_class(center);
        }
    }

    /// Densest of several random 3×3 neighbourhood means.
    fn sample_seed(&self, rng: &mut ChaCha8Rng, candidates: &[usize]) -> Option<[f64; 3]> {
        if candidates.is_empty() {
            return None;
        }

        let mut best: Option<(usize, [f64; 3])> = None;
        for _ in 0..self.config.max_trial_random_color {
            let idx = candidates[rng.random_range(0..candidates.len())];
            let seed = self.neighbourhood_mean(idx);
            let density = self.histogram.density(&seed, self.radius_sq);
            match best {
                Some((best_density, _)) if best_density >= density => {}
                _ => best = Some((density, seed)),
            }
        }
        best.map(|(_, seed)| seed)
    }

    /// Mean color of `idx` and its unclassified 8-neighbours.
    fn neighbourhood_mean(&self, idx: usize) -> [f64; 3] {
        let mut sum = [0.0f64; 3];
        let mut count = 0usize;
        for neighbour in self.neighbourhood(idx).chain(std::iter::once(idx)) {
            if self.assignment[neighbour] != NO_CLASS {
                continue;
            }
            for (sum, value) in sum.iter_mut().zip(self.histogram.color_of(neighbour)) {
                *sum += *value as f64;
            }
            count += 1;
        }
        sum.map(|value| value / count as f64)
    }

    fn search_rect(&mut self, rect: &Rect) {
        let width = self.space.width();
        let height = self.space.height();
        let (left, top) = (rect.left as usize, rect.top as usize);
        if left >= width || top >= height {
            tracing::warn!("Seed rectangle {:?} lies outside the image", rect);
            return;
        }
        let right = (rect.right as usize).min(width - 1);
        let bottom = (rect.bottom as usize).min(height - 1);

        let pixels = (top..=bottom).flat_map(|y| (left..=right).map(move |x| y * width + x));
        let mut sum = [0.0f64; 3];
        let mut count = 0usize;
        for idx in pixels {
            for (sum, value) in sum.iter_mut().zip(self.histogram.color_of(idx)) {
                *sum += *value as f64;
            }
            count += 1;
        }
        let seed = sum.map(|value| value / count as f64);
        let center = self
            .histogram
            .shift(seed, self.radius_sq, self.config.trial_to_converge);

        let known = self
            .classes
            .iter()
            .any(|class| distance_sq_f64(class, &center) <= self.radius_sq);
        if known || self.histogram.density(&center, self.radius_sq) == 0 {
            return;
        }
        self.add_class(center);
    }

    /// Registers a class and takes every unclassified pixel inside its sphere,
    /// then pixels backed by enough classified neighbours.
    fn add_class(&mut self, center: [f64; 3]) {
        let class = self.classes.len() as u32;
        self.classes.push(center);

        for idx in 0..self.assignment.len() {
            if self.assignment[idx] == NO_CLASS
                && distance_sq(self.histogram.color_of(idx), &center) <= self.radius_sq
            {
                self.take(idx, class);
            }
        }

        let votes = NEIGHBOUR_VOTES[self.config.option.index()];
        let reach_sq = 4.0 * self.radius_sq;
        let grown: Vec<usize> = (0..self.assignment.len())
            .filter(|&idx| {
                self.assignment[idx] == NO_CLASS
                    && distance_sq(self.histogram.color_of(idx), &center) <= reach_sq
                    && self
                        .neighbourhood(idx)
                        .filter(|&neighbour| self.assignment[neighbour] == class)
                        .count()
                        >= votes
            })
            .collect();
        for idx in grown {
            self.take(idx, class);
        }
    }

    fn take(&mut self, idx: usize, class: u32) {
        self.assignment[idx] = class;
        self.histogram.remove_pixel(idx);
        self.unclassified -= 1;
    }

    /// In-bounds 8-neighbours of `idx`.
    fn neighbourhood(&self, idx: usize) -> impl Iterator<Item = usize> {
        let width = self.space.width() as isize;
        let height = self.space.height() as isize;
        let x = idx as isize % width;
        let y = idx as isize / width;
        (-1..=1isize)
            .flat_map(|dy| (-1..=1isize).map(move |dx| (dx, dy)))
            .filter(|&(dx, dy)| dx != 0 || dy != 0)
            .filter_map(move |(dx, dy)| {
                let (nx, ny) = (x + dx, y + dy);
                (nx >= 0 && ny >= 0 && nx < width && ny < height)
                    .then_some((ny * width + nx) as usize)
            })
    }

    // ========================================================================
    // Class cleanup
    // ========================================================================

    /// Moves every unassigned pixel, and every pixel of a class rejected by
    /// `keep`, to the kept class with the closest color.
    fn assign_nearest(&mut self, keep: impl Fn(u32) -> bool) {
        let kept: Vec<u32> = (0..self.classes.len() as u32).filter(|&c| keep(c)).collect();
        for idx in 0..self.assignment.len() {
            let current = self.assignment[idx];
            if current != NO_CLASS && keep(current) {
                continue;
            }
            let range = self.space.range(idx);
            let nearest = kept
                .iter()
                .copied()
                .min_by(|&a, &b| {
                    distance_sq(&range, &self.classes[a as usize])
                        .total_cmp(&distance_sq(&range, &self.classes[b as usize]))
                        .then(a.cmp(&b))
                })
                .unwrap_or(0);
            self.assignment[idx] = nearest;
        }
    }

    fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.classes.len()];
        for &class in &self.assignment {
            counts[class as usize] += 1;
        }
        counts
    }

    fn recompute_class_colors(&mut self) {
        let mut sums = vec![[0.0f64; 3]; self.classes.len()];
        let counts = self.class_counts();
        for (idx, &class) in self.assignment.iter().enumerate() {
            for (sum, value) in sums[class as usize].iter_mut().zip(self.space.range(idx)) {
                *sum += value as f64;
            }
        }
        for ((class, sum), &count) in self.classes.iter_mut().zip(&sums).zip(&counts) {
            if count > 0 {
                *class = sum.map(|value| value / count as f64);
            }
        }
    }

    /// Drops classes below the class threshold. The most populated class is
    /// kept when all of them are too small.
    fn eliminate_small_classes(&mut self) {
        let counts = self.class_counts();
        let threshold = self.stats.class_threshold;
        let mut keep: Vec<bool> = counts.iter().map(|&count| count >= threshold).collect();
        if !keep.contains(&true) {
            let largest = counts
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)))
                .map_or(0, |(class, _)| class);
            keep[largest] = true;
        }
        if keep.iter().all(|&kept| kept) {
            return;
        }

        self.assign_nearest(|class| keep[class as usize]);
        self.compact_classes();
        self.recompute_class_colors();
    }

    /// Reassigns connected areas smaller than the minimum region size to the
    /// neighbouring class with the closest color, until none is left.
    fn absorb_small_regions(&mut self) -> Result<()> {
        let width = self.space.width();
        let height = self.space.height();

        loop {
            let Components { labels, counts } =
                label_components(width, height, &self.assignment)?;
            let mut small: Vec<u32> = (0..counts.len() as u32)
                .filter(|&component| counts[component as usize] < self.config.min_region_size)
                .collect();
            if small.is_empty() {
                break;
            }
            small.sort_by_key(|&component| (counts[component as usize], component));

            let adjacency = RegionAdjacency::build(&labels, counts.len())?;
            let mut component_class = vec![NO_CLASS; counts.len()];
            for (&component, &class) in labels.data().iter().zip(&self.assignment) {
                component_class[component as usize] = class;
            }

            // A component that received pixels keeps its class for this pass,
            // so every change is a real merge.
            let mut is_target = vec![false; counts.len()];
            let mut changed = false;
            for &component in &small {
                if is_target[component as usize] {
                    continue;
                }
                let own_class = component_class[component as usize];
                let own_color = self.classes[own_class as usize];

                let mut best: Option<(f64, u32, u32)> = None;
                for &neighbour in adjacency.neighbours(component) {
                    let class = component_class[neighbour as usize];
                    if class == own_class {
                        continue;
                    }
                    let distance = distance_sq_f64(&own_color, &self.classes[class as usize]);
                    let closer = match best {
                        None => true,
                        Some((best_distance, best_class, _)) => {
                            distance < best_distance
                                || (distance == best_distance && class < best_class)
                        }
                    };
                    if closer {
                        best = Some((distance, class, neighbour));
                    }
                }

                if let Some((_, class, neighbour)) = best {
                    component_class[component as usize] = class;
                    is_target[neighbour as usize] = true;
                    changed = true;
                }
            }

            if !changed {
                break;
            }
            for (class, &component) in self.assignment.iter_mut().zip(labels.data()) {
                *class = component_class[component as usize];
            }
        }

        self.compact_classes();
        self.recompute_class_colors();
        Ok(())
    }

    /// Removes classes without pixels and renumbers the rest in order.
    fn compact_classes(&mut self) {
        let counts = self.class_counts();
        let mut remap = vec![NO_CLASS; self.classes.len()];
        let mut classes = Vec::new();
        for (class, &count) in counts.iter().enumerate() {
            if count > 0 {
                remap[class] = classes.len() as u32;
                classes.push(self.classes[class]);
            }
        }
        for class in &mut self.assignment {
            *class = remap[*class as usize];
        }
        self.classes = classes;
    }

    fn into_regions(&mut self) -> RegionSet {
        let counts = self.class_counts();
        let modes = self
            .classes
            .iter()
            .map(|class| class.map(|value| value as f32))
            .collect();
        let labels = Grid::from_vec(
            self.space.width(),
            self.space.height(),
            std::mem::take(&mut self.assignment),
        );
        RegionSet {
            labels,
            modes,
            counts,
        }
    }
}

/// `max(min_var, sqrt((var_1 + var_2 + var_3) / 100))` over the range channels.
fn variance_factor(space: &FeatureSpace, min_var: f32) -> f64 {
    let pixel_count = space.pixel_count();
    let mean = mean_range(space, 0..pixel_count);
    let mut variance = 0.0f64;
    for idx in 0..pixel_count {
        variance += distance_sq(&space.range(idx), &mean);
    }
    variance /= pixel_count as f64;
    (variance / 100.0).sqrt().max(min_var as f64)
}

fn mean_range(space: &FeatureSpace, pixels: std::ops::Range<usize>) -> [f64; 3] {
    let count = pixels.len() as f64;
    let mut sum = [0.0f64; 3];
    for idx in pixels {
        for (sum, value) in sum.iter_mut().zip(space.range(idx)) {
            *sum += value as f64;
        }
    }
    sum.map(|value| value / count)
}

#[inline]
fn distance_sq(color: &RangeVector, center: &[f64; 3]) -> f64 {
    color
        .iter()
        .zip(center)
        .map(|(a, b)| {
            let diff = *a as f64 - b;
            diff * diff
        })
        .sum()
}

#[inline]
fn distance_sq_f64(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a.iter().zip(b).map(|(a, b)| (a - b) * (a - b)).sum()
}
