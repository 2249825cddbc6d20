//! Configuration types for mean-shift segmentation.
//!
//! [`MeanShiftConfig`] selects one of two independent algorithms:
//! the EDISON-style feature-space algorithm ([`EdisonConfig`]) or the legacy
//! color-histogram algorithm ([`ClassicConfig`]). Each variant carries only
//! the parameters it consults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

// ============================================================================
// Enums
// ============================================================================

/// Mode-seeking acceleration. Higher levels trade accuracy for speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speedup {
    /// Every pixel is iterated independently. Most accurate, slowest.
    NoSpeedup,
    /// Pixels passed by an iteration inherit its mode (path caching).
    #[default]
    MediumSpeedup,
    /// Path caching plus capture of close window members. Fastest.
    HighSpeedup,
}

/// Degree of segmentation for the classic algorithm.
///
/// Indexes the per-option arrays of [`ClassicConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentationDegree {
    /// Color quantization only; small connected regions are not removed.
    Quantization,
    Oversegmentation,
    #[default]
    Undersegmentation,
}

impl SegmentationDegree {
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Self::Quantization => 0,
            Self::Oversegmentation => 1,
            Self::Undersegmentation => 2,
        }
    }
}

/// Inclusive pixel rectangle used to seed classic color classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Rect {
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// `(0,0,0,0)` requests auto-segmentation over the whole image.
    pub fn is_auto_marker(&self) -> bool {
        *self == Self::default()
    }
}

// ============================================================================
// EDISON configuration
// ============================================================================

/// Parameters of the feature-space (EDISON) algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdisonConfig {
    pub speedup: Speedup,
    /// Spatial kernel radius in pixels. Larger values smooth region borders.
    pub sigma_s: f64,
    /// Range kernel radius in color units. Larger values give fewer regions.
    pub sigma_r: f64,
    /// Adjacent regions with closer modes are fused. Expected below `sigma_r`.
    pub max_neighbour_color_distance: f64,
    /// Mean-shift step length under which an iteration counts as converged.
    pub threshold_converged: f64,
    /// Regions with fewer pixels are absorbed by their closest neighbour.
    pub min_region_size: usize,
    /// Iteration cap per starting point.
    pub max_trial: usize,
    /// Normalized squared feature distance under which window members are
    /// captured by the current path. Only used by [`Speedup::HighSpeedup`].
    pub speed_threshold: f64,
    /// Run [`Speedup::NoSpeedup`] mode seeking on the rayon pool.
    pub parallel: bool,
}

impl Default for EdisonConfig {
    fn default() -> Self {
        Self {
            speedup: Speedup::MediumSpeedup,
            sigma_s: 5.0,
            sigma_r: 5.0,
            max_neighbour_color_distance: 3.0,
            threshold_converged: 0.1,
            min_region_size: 15,
            max_trial: 10,
            speed_threshold: 0.5,
            parallel: false,
        }
    }
}

impl EdisonConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        positive("sigma_s", self.sigma_s)?;
        positive("sigma_r", self.sigma_r)?;
        positive(
            "max_neighbour_color_distance",
            self.max_neighbour_color_distance,
        )?;
        positive("threshold_converged", self.threshold_converged)?;
        at_least_one("min_region_size", self.min_region_size)?;
        at_least_one("max_trial", self.max_trial)?;
        positive("speed_threshold", self.speed_threshold)?;

        if self.max_neighbour_color_distance >= self.sigma_r {
            tracing::warn!(
                "max_neighbour_color_distance ({}) is not below sigma_r ({})",
                self.max_neighbour_color_distance,
                self.sigma_r
            );
        }
        Ok(())
    }

    pub fn with_speedup(mut self, speedup: Speedup) -> Self {
        self.speedup = speedup;
        self
    }

    pub fn with_bandwidth(mut self, sigma_s: f64, sigma_r: f64) -> Self {
        self.sigma_s = sigma_s;
        self.sigma_r = sigma_r;
        self
    }

    pub fn with_max_neighbour_color_distance(mut self, distance: f64) -> Self {
        self.max_neighbour_color_distance = distance;
        self
    }

    pub fn with_min_region_size(mut self, min_region_size: usize) -> Self {
        self.min_region_size = min_region_size;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

// ============================================================================
// Classic configuration
// ============================================================================

/// Parameters of the legacy color-histogram algorithm.
///
/// The three-element arrays are indexed by [`SegmentationDegree::index`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassicConfig {
    pub option: SegmentationDegree,
    /// Seed rectangles. Empty, or a single `(0,0,0,0)`, selects auto mode.
    pub rects: Vec<Rect>,
    /// Consecutive failed class searches before auto mode gives up.
    pub max_trial: usize,
    /// Iteration cap of the color-space mean shift.
    pub trial_to_converge: usize,
    /// Minimum class population in promille of the image.
    pub class_threshold: [f64; 3],
    /// Random neighbourhood samples drawn per class search.
    pub max_trial_random_color: usize,
    /// Connected regions with fewer pixels are absorbed (not for quantization).
    pub min_region_size: usize,
    /// Radius factor in rectangle mode.
    pub rect_radius: [f32; 3],
    /// Radius factor in auto mode.
    pub auto_radius: [f32; 3],
    /// Lower bound of the variance-derived radius factor.
    pub min_var: f32,
    /// Seed for the color sampler.
    pub seed: u64,
}

impl Default for ClassicConfig {
    fn default() -> Self {
        Self {
            option: SegmentationDegree::Undersegmentation,
            rects: Vec::new(),
            max_trial: 10,
            trial_to_converge: 15,
            class_threshold: [2.5, 5.0, 10.0],
            max_trial_random_color: 25,
            min_region_size: 15,
            rect_radius: [8.0, 6.0, 4.0],
            auto_radius: [2.0, 3.0, 4.0],
            min_var: 0.0,
            seed: 0,
        }
    }
}

impl ClassicConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        at_least_one("max_trial", self.max_trial)?;
        at_least_one("trial_to_converge", self.trial_to_converge)?;
        at_least_one("max_trial_random_color", self.max_trial_random_color)?;
        at_least_one("min_region_size", self.min_region_size)?;

        let option = self.option.index();
        non_negative("class_threshold", self.class_threshold[option])?;
        positive("rect_radius", self.rect_radius[option] as f64)?;
        positive("auto_radius", self.auto_radius[option] as f64)?;
        non_negative("min_var", self.min_var as f64)?;

        for (index, rect) in self.rects.iter().enumerate() {
            if rect.left > rect.right || rect.top > rect.bottom {
                return Err(ConfigError::InvertedRect {
                    index,
                    left: rect.left,
                    top: rect.top,
                    right: rect.right,
                    bottom: rect.bottom,
                });
            }
        }
        Ok(())
    }

    /// True when colors are searched over the whole image.
    pub fn is_auto(&self) -> bool {
        self.rects.is_empty() || (self.rects.len() == 1 && self.rects[0].is_auto_marker())
    }

    pub fn with_option(mut self, option: SegmentationDegree) -> Self {
        self.option = option;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

// ============================================================================
// Top-level configuration
// ============================================================================

/// Algorithm selection. The two variants share no internal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    Edison(EdisonConfig),
    Classic(ClassicConfig),
}

impl Default for Algorithm {
    fn default() -> Self {
        Self::Edison(EdisonConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MeanShiftConfig {
    pub algorithm: Algorithm,
}

impl MeanShiftConfig {
    pub fn edison(config: EdisonConfig) -> Self {
        Self {
            algorithm: Algorithm::Edison(config),
        }
    }

    pub fn classic(config: ClassicConfig) -> Self {
        Self {
            algorithm: Algorithm::Classic(config),
        }
    }

    pub fn is_classic(&self) -> bool {
        matches!(self.algorithm, Algorithm::Classic(_))
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        match &self.algorithm {
            Algorithm::Edison(config) => config.validate(),
            Algorithm::Classic(config) => config.validate(),
        }
    }

    /// Loads a YAML or JSON file (chosen by extension) and validates it.
    pub fn from_file(path: &Path) -> Result<Self> {
        let config: Self = common::load_file(path)?;
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Validation helpers
// ============================================================================

fn positive(name: &'static str, value: f64) -> std::result::Result<(), ConfigError> {
    // NaN fails the comparison and is rejected too
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { name, value })
    }
}

fn non_negative(name: &'static str, value: f64) -> std::result::Result<(), ConfigError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Negative { name, value })
    }
}

fn at_least_one(name: &'static str, value: usize) -> std::result::Result<(), ConfigError> {
    if value >= 1 {
        Ok(())
    } else {
        Err(ConfigError::BelowOne { name, value })
    }
}
