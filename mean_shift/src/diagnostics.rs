//! Per-run statistics for tuning and analysis. Not used for any decision.

/// Counters collected by one segmentation or filter call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    /// Number of image pixels.
    pub pixels: usize,
    /// Pixels iterated as mean-shift starting points. Lower than `pixels`
    /// when a speedup lets pixels inherit modes.
    pub mean_shift_starts: usize,
    /// `iterations_histogram[n]` counts starting points that stopped after
    /// `n` iterations.
    pub iterations_histogram: Vec<usize>,
    /// Starting points that hit the iteration cap without converging.
    pub non_converged: usize,
    /// Starting points whose kernel window came up empty.
    pub empty_windows: usize,
    /// Regions right after connected-component labeling.
    pub regions_after_labeling: usize,
    /// Regions after fusion of similar neighbours.
    pub regions_after_fusion: usize,
    /// Regions after removal of small regions.
    pub regions_after_pruning: usize,
    pub fusion_passes: usize,
    pub pruning_passes: usize,
    /// Color classes found by the classic algorithm before elimination.
    pub classic_classes_found: usize,
}

impl Diagnostics {
    /// Mean iterations per starting point, 0 when nothing was iterated.
    pub fn mean_iterations(&self) -> f64 {
        let starts: usize = self.iterations_histogram.iter().sum();
        if starts == 0 {
            return 0.0;
        }
        let total: usize = self
            .iterations_histogram
            .iter()
            .enumerate()
            .map(|(iterations, count)| iterations * count)
            .sum();
        total as f64 / starts as f64
    }
}
