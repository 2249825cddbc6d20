//! Mean shift - color image segmentation by density mode seeking.
//!
//! Two independent algorithms sit behind one entry point:
//! - EDISON-style feature-space mean shift: every pixel is moved to a density
//!   mode of the joint `(row, col, L, u, v)` space, equal modes form regions,
//!   similar neighbours are fused and small regions are absorbed.
//! - The classic color-histogram algorithm, which finds color classes by
//!   mean-shifting random seed colors.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use mean_shift::{MeanShiftConfig, MeanShiftSegmenter};
//!
//! let image = image::open("photo.png")?.to_rgb8();
//! let segmenter = MeanShiftSegmenter::from_config(MeanShiftConfig::default());
//! let result = segmenter.segment_full(&image)?;
//!
//! println!("Found {} regions", result.segmentation.region_count());
//! result.segmented.save("segmented.png")?;
//! ```

mod adjacency;
mod classic;
mod color;
mod config;
mod diagnostics;
mod error;
mod feature_space;
mod fusion;
mod grid;
mod labeling;
mod mode_seeking;
mod output;
mod pruning;
mod regions;
mod segmenter;

// ============================================================================
// Configuration
// ============================================================================

pub use config::{
    Algorithm, ClassicConfig, EdisonConfig, MeanShiftConfig, Rect, SegmentationDegree, Speedup,
};

// ============================================================================
// Segmentation
// ============================================================================

pub use diagnostics::Diagnostics;
pub use error::{ConfigError, Result, SegmentationError};
pub use output::{ChannelSegmentation, FullSegmentation, LabelMap, Segmentation};
pub use segmenter::MeanShiftSegmenter;

// ============================================================================
// Building blocks
// ============================================================================

pub use color::{luv_to_rgb, rgb_to_luv, RangeVector};
pub use grid::Grid;
