//! Mean-shift mode seeking in the joint spatial-range space.
//!
//! Every pixel is moved to the mean of the feature points inside a uniform
//! kernel window (a spatial disk of radius `sigma_s` intersected with a range
//! ball of radius `sigma_r`) until the step becomes shorter than
//! `threshold_converged` or `max_trial` iterations have been spent. The range
//! part of the final point is the pixel's filtered color.
//!
//! Two acceleration levels avoid iterating every pixel:
//! - [`Speedup::MediumSpeedup`]: pixels the trajectory passes over (and whose
//!   color lies in the basin of the current point) take the final mode. A
//!   trajectory that reaches an already finished pixel inherits its mode.
//! - [`Speedup::HighSpeedup`]: window members close to the current point in
//!   normalized feature distance are captured as well.

#[cfg(test)]
mod tests;

use rayon::prelude::*;

use crate::color::RangeVector;
use crate::config::{EdisonConfig, Speedup};
use crate::error::{try_alloc, Result};
use crate::feature_space::{FeatureSpace, FEATURE_DIMS, RANGE_DIMS, SPATIAL_DIMS};
use crate::grid::Grid;

/// Fraction of `sigma_r²` within which a visited pixel's color counts as
/// belonging to the current trajectory's basin.
const BASIN_FRACTION: f64 = 0.5;

type FeaturePoint = [f64; FEATURE_DIMS];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PixelState {
    Unvisited,
    OnPath,
    Done,
}

/// How a single starting point ended.
#[derive(Debug, Clone, Copy, Default)]
struct Trajectory {
    mode: RangeVector,
    iterations: usize,
    converged: bool,
    empty_window: bool,
}

/// Counters of one mode-seeking run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModeSeekingStats {
    pub starts: usize,
    /// Index `n` counts starting points that stopped after `n` iterations.
    pub iterations_histogram: Vec<usize>,
    pub non_converged: usize,
    pub empty_windows: usize,
}

impl ModeSeekingStats {
    fn new(max_trial: usize) -> Self {
        Self {
            iterations_histogram: vec![0; max_trial + 1],
            ..Default::default()
        }
    }

    fn record(&mut self, trajectory: &Trajectory) {
        self.starts += 1;
        self.iterations_histogram[trajectory.iterations] += 1;
        if trajectory.empty_window {
            self.empty_windows += 1;
        } else if !trajectory.converged {
            self.non_converged += 1;
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModeSeekingResult {
    /// Filtered range vector per pixel, row-major.
    pub modes: Vec<RangeVector>,
    pub stats: ModeSeekingStats,
}

/// Runs mean shift over a [`FeatureSpace`].
#[derive(Debug, Clone, Copy)]
pub struct ModeSeeker<'a> {
    space: &'a FeatureSpace,
    config: &'a EdisonConfig,
    weights: Option<&'a [f32]>,
    sigma_s_sq: f64,
    sigma_r_sq: f64,
}

impl<'a> ModeSeeker<'a> {
    pub fn new(space: &'a FeatureSpace, config: &'a EdisonConfig) -> Self {
        Self {
            space,
            config,
            weights: None,
            sigma_s_sq: config.sigma_s * config.sigma_s,
            sigma_r_sq: config.sigma_r * config.sigma_r,
        }
    }

    /// Per-pixel weights multiplying each window member's contribution.
    /// Consulted by the accelerated variants only. The caller guarantees the
    /// map matches the feature space dimensions.
    pub fn with_weights(mut self, weights: &'a Grid<f32>) -> Self {
        debug_assert_eq!(
            weights.dimensions(),
            (self.space.width(), self.space.height())
        );
        self.weights = Some(weights.data());
        self
    }

    pub fn run(&self) -> Result<ModeSeekingResult> {
        let result = match self.config.speedup {
            Speedup::NoSpeedup => self.run_independent()?,
            Speedup::MediumSpeedup => self.run_with_paths(false)?,
            Speedup::HighSpeedup => self.run_with_paths(true)?,
        };

        tracing::debug!(
            "Mode seeking ({:?}): {} starts for {} pixels, {} not converged, {} empty windows",
            self.config.speedup,
            result.stats.starts,
            self.space.pixel_count(),
            result.stats.non_converged,
            result.stats.empty_windows
        );
        if result.stats.empty_windows > 0 {
            tracing::warn!(
                "{} starting points had an empty kernel window and kept their own color",
                result.stats.empty_windows
            );
        }
        Ok(result)
    }

    // ========================================================================
    // No speedup
    // ========================================================================

    fn run_independent(&self) -> Result<ModeSeekingResult> {
        let pixel_count = self.space.pixel_count();
        let width = self.space.width();
        let mut trajectories = try_alloc("trajectories", pixel_count, Trajectory::default())?;

        if self.config.parallel && width > 0 {
            trajectories
                .par_chunks_mut(width)
                .enumerate()
                .for_each(|(row, chunk)| {
                    for (col, trajectory) in chunk.iter_mut().enumerate() {
                        *trajectory = self.seek(row * width + col);
                    }
                });
        } else {
            for (idx, trajectory) in trajectories.iter_mut().enumerate() {
                *trajectory = self.seek(idx);
            }
        }

        let mut modes = try_alloc("filtered modes", pixel_count, [0.0f32; RANGE_DIMS])?;
        let mut stats = ModeSeekingStats::new(self.config.max_trial);
        for (mode, trajectory) in modes.iter_mut().zip(&trajectories) {
            *mode = trajectory.mode;
            stats.record(trajectory);
        }

        Ok(ModeSeekingResult { modes, stats })
    }

    fn seek(&self, start: usize) -> Trajectory {
        let mut center = self.start_point(start);

        for iteration in 1..=self.config.max_trial {
            let Some(mean) = self.window_mean(&center, None, |_, _| {}) else {
                return Trajectory::empty(self.space.range(start), iteration);
            };
            let shift = distance(&mean, &center);
            center = mean;
            if shift < self.config.threshold_converged {
                return Trajectory::converged(range_of(&center), iteration);
            }
        }

        Trajectory::exhausted(range_of(&center), self.config.max_trial)
    }

    // ========================================================================
    // Path caching (medium and high speedup)
    // ========================================================================

    fn run_with_paths(&self, capture: bool) -> Result<ModeSeekingResult> {
        let pixel_count = self.space.pixel_count();
        let mut state = try_alloc("pixel states", pixel_count, PixelState::Unvisited)?;
        let mut modes = try_alloc("filtered modes", pixel_count, [0.0f32; RANGE_DIMS])?;
        let mut stats = ModeSeekingStats::new(self.config.max_trial);
        let mut path = Vec::new();

        for start in 0..pixel_count {
            if state[start] == PixelState::Done {
                continue;
            }

            path.clear();
            path.push(start);
            state[start] = PixelState::OnPath;

            let trajectory = self.follow_path(start, capture, &mut state, &mut path, &modes);
            stats.record(&trajectory);

            for &idx in &path {
                modes[idx] = trajectory.mode;
                state[idx] = PixelState::Done;
            }
        }

        Ok(ModeSeekingResult { modes, stats })
    }

    fn follow_path(
        &self,
        start: usize,
        capture: bool,
        state: &mut [PixelState],
        path: &mut Vec<usize>,
        modes: &[RangeVector],
    ) -> Trajectory {
        let speed_threshold = self.config.speed_threshold;
        let mut center = self.start_point(start);

        for iteration in 1..=self.config.max_trial {
            let mean = self.window_mean(&center, self.weights, |idx, normalized_distance| {
                if capture
                    && normalized_distance < speed_threshold
                    && state[idx] == PixelState::Unvisited
                {
                    state[idx] = PixelState::OnPath;
                    path.push(idx);
                }
            });
            let Some(mean) = mean else {
                return Trajectory::empty(self.space.range(start), iteration);
            };

            let shift = distance(&mean, &center);
            center = mean;
            if shift < self.config.threshold_converged {
                return Trajectory::converged(range_of(&center), iteration);
            }

            let idx = self.nearest_pixel(&center);
            match state[idx] {
                PixelState::OnPath => {}
                PixelState::Unvisited => {
                    if self.in_basin(idx, &center) {
                        state[idx] = PixelState::OnPath;
                        path.push(idx);
                    }
                }
                PixelState::Done => {
                    if self.in_basin(idx, &center) {
                        return Trajectory::converged(modes[idx], iteration);
                    }
                }
            }
        }

        Trajectory::exhausted(range_of(&center), self.config.max_trial)
    }

    /// Pixel at the rounded spatial position of `point`.
    fn nearest_pixel(&self, point: &FeaturePoint) -> usize {
        let max_row = self.space.height().saturating_sub(1) as f64;
        let max_col = self.space.width().saturating_sub(1) as f64;
        let row = point[0].round().clamp(0.0, max_row) as usize;
        let col = point[1].round().clamp(0.0, max_col) as usize;
        row * self.space.width() + col
    }

    fn in_basin(&self, idx: usize, point: &FeaturePoint) -> bool {
        range_distance_sq(&self.space.range(idx), point) < BASIN_FRACTION * self.sigma_r_sq
    }

    // ========================================================================
    // Kernel window
    // ========================================================================

    fn start_point(&self, idx: usize) -> FeaturePoint {
        let feature = self.space.feature(idx);
        std::array::from_fn(|dim| feature[dim] as f64)
    }

    /// Weighted mean of all feature points inside the kernel window centred on
    /// `center`, or `None` when the window holds no weight.
    ///
    /// `visit` receives every window member with its normalized squared
    /// distance `(ds / sigma_s)² + (dr / sigma_r)²`.
    fn window_mean(
        &self,
        center: &FeaturePoint,
        weights: Option<&[f32]>,
        mut visit: impl FnMut(usize, f64),
    ) -> Option<FeaturePoint> {
        let width = self.space.width();
        let height = self.space.height();
        let sigma_s = self.config.sigma_s;

        let row_lo = (center[0] - sigma_s).ceil().max(0.0) as usize;
        let row_hi = (center[0] + sigma_s).floor().min(height as f64 - 1.0);
        let col_lo = (center[1] - sigma_s).ceil().max(0.0) as usize;
        let col_hi = (center[1] + sigma_s).floor().min(width as f64 - 1.0);
        if row_hi < 0.0 || col_hi < 0.0 {
            return None;
        }

        let mut sum = [0.0f64; FEATURE_DIMS];
        let mut weight_sum = 0.0f64;

        for row in row_lo..=row_hi as usize {
            let dy = row as f64 - center[0];
            for col in col_lo..=col_hi as usize {
                let dx = col as f64 - center[1];
                let spatial_sq = dy * dy + dx * dx;
                if spatial_sq > self.sigma_s_sq {
                    continue;
                }

                let idx = row * width + col;
                let range = self.space.range(idx);
                let range_sq = range_distance_sq(&range, center);
                if range_sq >= self.sigma_r_sq {
                    continue;
                }

                visit(idx, spatial_sq / self.sigma_s_sq + range_sq / self.sigma_r_sq);

                let weight = weights.map_or(1.0, |weights| weights[idx] as f64);
                if weight <= 0.0 {
                    continue;
                }
                sum[0] += weight * row as f64;
                sum[1] += weight * col as f64;
                for (dim, value) in range.iter().enumerate() {
                    sum[SPATIAL_DIMS + dim] += weight * *value as f64;
                }
                weight_sum += weight;
            }
        }

        (weight_sum > 0.0).then(|| sum.map(|value| value / weight_sum))
    }
}

impl Trajectory {
    fn converged(mode: RangeVector, iterations: usize) -> Self {
        Self {
            mode,
            iterations,
            converged: true,
            empty_window: false,
        }
    }

    fn exhausted(mode: RangeVector, iterations: usize) -> Self {
        Self {
            mode,
            iterations,
            converged: false,
            empty_window: false,
        }
    }

    fn empty(mode: RangeVector, iterations: usize) -> Self {
        Self {
            mode,
            iterations,
            converged: false,
            empty_window: true,
        }
    }
}

#[inline]
fn range_of(point: &FeaturePoint) -> RangeVector {
    std::array::from_fn(|dim| point[SPATIAL_DIMS + dim] as f32)
}

#[inline]
fn range_distance_sq(range: &RangeVector, point: &FeaturePoint) -> f64 {
    range
        .iter()
        .zip(&point[SPATIAL_DIMS..])
        .map(|(value, center)| {
            let diff = *value as f64 - center;
            diff * diff
        })
        .sum()
}

#[inline]
fn distance(a: &FeaturePoint, b: &FeaturePoint) -> f64 {
    a.iter()
        .zip(b)
        .map(|(a, b)| (a - b) * (a - b))
        .sum::<f64>()
        .sqrt()
}
