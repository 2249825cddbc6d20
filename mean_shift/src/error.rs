use std::collections::TryReserveError;

use thiserror::Error;

/// Rejected parameter values. Always reported before any buffer is allocated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{name} must be positive, got {value}")]
    NotPositive { name: &'static str, value: f64 },

    #[error("{name} must be at least 1, got {value}")]
    BelowOne { name: &'static str, value: usize },

    #[error("{name} must be finite and non-negative, got {value}")]
    Negative { name: &'static str, value: f64 },

    #[error("rectangle {index} is inverted: ({left}, {top}) .. ({right}, {bottom})")]
    InvertedRect {
        index: usize,
        left: u32,
        top: u32,
        right: u32,
        bottom: u32,
    },
}

/// Errors surfaced by [`crate::MeanShiftSegmenter`].
///
/// A zero-sized image is not an error; it produces an empty result.
#[derive(Debug, Error)]
pub enum SegmentationError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("failed to allocate {bytes} bytes for {buffer}")]
    Allocation {
        buffer: &'static str,
        bytes: usize,
        #[source]
        source: TryReserveError,
    },

    #[error("channel sizes differ: {first:?}, {second:?}, {third:?}")]
    ChannelSizeMismatch {
        first: (usize, usize),
        second: (usize, usize),
        third: (usize, usize),
    },

    #[error("weight map is {actual:?}, image is {expected:?}")]
    WeightMapSizeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("mean-shift filtering is not available for the classic algorithm")]
    FilterUnsupported,

    #[error("failed to load configuration: {0}")]
    ConfigFile(#[from] common::SerdeFormatError),
}

pub type Result<T> = std::result::Result<T, SegmentationError>;

/// Builds a `Vec` of `len` copies of `value`, reporting allocation failure
/// instead of aborting.
pub(crate) fn try_alloc<T: Clone>(buffer: &'static str, len: usize, value: T) -> Result<Vec<T>> {
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|source| SegmentationError::Allocation {
            buffer,
            bytes: len.saturating_mul(std::mem::size_of::<T>()),
            source,
        })?;
    data.resize(len, value);
    Ok(data)
}
