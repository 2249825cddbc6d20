//! Public segmentation entry point.
//!
//! [`MeanShiftSegmenter`] validates its configuration, builds the feature
//! space and dispatches to the selected algorithm. Every buffer lives for one
//! call only.


// =============================================================================
// Imports
// =============================================================================

use std::path::Path;

use image::RgbImage;

use crate::classic::ClassicSegmenter;
use crate::color::RangeVector;
use crate::config::{Algorithm, ClassicConfig, EdisonConfig, MeanShiftConfig};
use crate::diagnostics::Diagnostics;
use crate::error::{Result, SegmentationError};
use crate::feature_space::FeatureSpace;
use crate::fusion::fuse_regions;
use crate::grid::Grid;
use crate::labeling::label_regions;
use crate::mode_seeking::{ModeSeeker, ModeSeekingResult};
use crate::output::{render_filtered, ChannelSegmentation, FullSegmentation, Segmentation};
use crate::pruning::prune_regions;
use crate::regions::RegionSet;

/// Regions and per-pixel modes of one run, before rendering.
struct RunOutput {
    regions: RegionSet,
    /// Filtered range vector per pixel. `None` for the classic algorithm.
    filtered: Option<Vec<RangeVector>>,
    diagnostics: Diagnostics,
}

// =============================================================================
// MeanShiftSegmenter
// =============================================================================

/// Mean-shift segmenter for color images and pre-split channels.
///
/// # Example
///
/// ```rust,ignore
/// use mean_shift::{EdisonConfig, MeanShiftConfig, MeanShiftSegmenter, Speedup};
///
/// // Defaults: EDISON algorithm with medium speedup
/// let segmenter = MeanShiftSegmenter::new();
/// let segmentation = segmenter.segment(&image)?;
///
/// // Custom bandwidths
/// let config = MeanShiftConfig::edison(
///     EdisonConfig::default()
///         .with_bandwidth(7.0, 6.5)
///         .with_speedup(Speedup::HighSpeedup),
/// );
/// let segmenter = MeanShiftSegmenter::from_config(config);
/// let full = segmenter.segment_full(&image)?;
/// full.segmented.save("segmented.png")?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct MeanShiftSegmenter {
    config: MeanShiftConfig,
    weights: Option<Grid<f32>>,
}

impl MeanShiftSegmenter {
    /// Segmenter with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: MeanShiftConfig) -> Self {
        Self {
            config,
            weights: None,
        }
    }

    /// Loads the configuration from a YAML or JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self::from_config(MeanShiftConfig::from_file(path)?))
    }

    /// Per-pixel weights for the window means of the accelerated EDISON
    /// variants. Must match the dimensions of every segmented image.
    pub fn with_weight_map(mut self, weights: Grid<f32>) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn config(&self) -> &MeanShiftConfig {
        &self.config
    }

    /// Segments an RGB image.
    pub fn segment(&self, image: &RgbImage) -> Result<Segmentation> {
        let output = self.run_rgb(image)?;
        Ok(Segmentation::from_regions(output.regions, output.diagnostics))
    }

    /// Segments an RGB image and renders the filtered and segmented images.
    pub fn segment_full(&self, image: &RgbImage) -> Result<FullSegmentation> {
        let output = self.run_rgb(image)?;
        let filtered = output.filtered.as_deref().map(|modes| {
            render_filtered(image.width() as usize, image.height() as usize, modes)
        });
        let segmentation = Segmentation::from_regions(output.regions, output.diagnostics);

        Ok(FullSegmentation {
            filtered,
            segmented: segmentation.render(),
            segmentation,
        })
    }

    /// Segments three equally sized channels used directly as range values.
    pub fn segment_channels<T: Copy + Into<f32>>(
        &self,
        first: &Grid<T>,
        second: &Grid<T>,
        third: &Grid<T>,
    ) -> Result<ChannelSegmentation> {
        self.config.validate()?;
        self.check_weights(first.width(), first.height())?;

        let space = FeatureSpace::from_channels(first, second, third)?;
        let output = self.run(&space)?;
        Ok(ChannelSegmentation::from_regions(
            output.regions,
            output.diagnostics,
        ))
    }

    /// Mean-shift filtered copy of `image`. EDISON only.
    pub fn filter(&self, image: &RgbImage) -> Result<RgbImage> {
        let (modes, _) = self.filter_modes(image)?;
        Ok(render_filtered(
            image.width() as usize,
            image.height() as usize,
            &modes,
        ))
    }

    /// Replaces every pixel of `image` with its filtered color.
    pub fn filter_in_place(&self, image: &mut RgbImage) -> Result<Diagnostics> {
        let (modes, diagnostics) = self.filter_modes(image)?;
        let filtered = render_filtered(image.width() as usize, image.height() as usize, &modes);
        image.copy_from_slice(filtered.as_raw());
        Ok(diagnostics)
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    fn run_rgb(&self, image: &RgbImage) -> Result<RunOutput> {
        self.config.validate()?;
        self.check_weights(image.width() as usize, image.height() as usize)?;

        let space = FeatureSpace::from_rgb(image)?;
        self.run(&space)
    }

    fn run(&self, space: &FeatureSpace) -> Result<RunOutput> {
        match &self.config.algorithm {
            Algorithm::Edison(config) => self.run_edison(space, config),
            Algorithm::Classic(config) => run_classic(space, config),
        }
    }

    fn filter_modes(&self, image: &RgbImage) -> Result<(Vec<RangeVector>, Diagnostics)> {
        self.config.validate()?;
        let Algorithm::Edison(config) = &self.config.algorithm else {
            return Err(SegmentationError::FilterUnsupported);
        };
        self.check_weights(image.width() as usize, image.height() as usize)?;

        let space = FeatureSpace::from_rgb(image)?;
        let mut diagnostics = Diagnostics {
            pixels: space.pixel_count(),
            ..Default::default()
        };
        if space.is_empty() {
            return Ok((Vec::new(), diagnostics));
        }

        let result = self.seek_modes(&space, config)?;
        record_mode_seeking(&mut diagnostics, &result);
        Ok((result.modes, diagnostics))
    }

    // =========================================================================
    // EDISON pipeline
    // =========================================================================

    fn run_edison(&self, space: &FeatureSpace, config: &EdisonConfig) -> Result<RunOutput> {
        let width = space.width();
        let height = space.height();
        let mut diagnostics = Diagnostics {
            pixels: space.pixel_count(),
            ..Default::default()
        };
        if space.is_empty() {
            return Ok(RunOutput {
                regions: RegionSet::empty(width, height),
                filtered: Some(Vec::new()),
                diagnostics,
            });
        }

        // Step 1: Move every pixel to its density mode
        let result = self.seek_modes(space, config)?;
        record_mode_seeking(&mut diagnostics, &result);

        // Step 2: Connected regions of equal quantized mode
        let mut regions = label_regions(width, height, &result.modes)?;
        diagnostics.regions_after_labeling = regions.region_count();

        // Step 3: Fuse neighbours with similar modes
        diagnostics.fusion_passes =
            fuse_regions(&mut regions, config.max_neighbour_color_distance)?;
        diagnostics.regions_after_fusion = regions.region_count();

        // Step 4: Absorb regions below the minimum size
        diagnostics.pruning_passes = prune_regions(&mut regions, config.min_region_size)?;
        diagnostics.regions_after_pruning = regions.region_count();

        tracing::debug!(
            "EDISON segmentation: {} -> {} -> {} regions",
            diagnostics.regions_after_labeling,
            diagnostics.regions_after_fusion,
            diagnostics.regions_after_pruning
        );

        Ok(RunOutput {
            regions,
            filtered: Some(result.modes),
            diagnostics,
        })
    }

    fn seek_modes(&self, space: &FeatureSpace, config: &EdisonConfig) -> Result<ModeSeekingResult> {
        let seeker = ModeSeeker::new(space, config);
        match &self.weights {
            Some(weights) => seeker.with_weights(weights).run(),
            None => seeker.run(),
        }
    }

    fn check_weights(&self, width: usize, height: usize) -> Result<()> {
        match &self.weights {
            Some(weights) if weights.dimensions() != (width, height) => {
                Err(SegmentationError::WeightMapSizeMismatch {
                    expected: (width, height),
                    actual: weights.dimensions(),
                })
            }
            _ => Ok(()),
        }
    }
}

fn run_classic(space: &FeatureSpace, config: &ClassicConfig) -> Result<RunOutput> {
    let (regions, stats) = ClassicSegmenter::new(space, config)?.run()?;
    let diagnostics = Diagnostics {
        pixels: space.pixel_count(),
        classic_classes_found: stats.classes_found,
        regions_after_pruning: regions.region_count(),
        ..Default::default()
    };

    Ok(RunOutput {
        regions,
        filtered: None,
        diagnostics,
    })
}

fn record_mode_seeking(diagnostics: &mut Diagnostics, result: &ModeSeekingResult) {
    diagnostics.mean_shift_starts = result.stats.starts;
    diagnostics.iterations_histogram = result.stats.iterations_histogram.clone();
    diagnostics.non_converged = result.stats.non_converged;
    diagnostics.empty_windows = result.stats.empty_windows;
}
