//! Example: Mean-Shift Segmentation
//!
//! Segments an image and writes the filtered and segmented results next to
//! it. An optional YAML or JSON file replaces the default configuration.
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --example segment_image -- /path/to/image.png [config.yaml]
//! ```

use std::env;
use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use mean_shift::{Diagnostics, MeanShiftConfig, MeanShiftSegmenter};

fn main() -> anyhow::Result<()> {
    common::log_setup::setup_logging("info,mean_shift=debug", None)?;

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <image_path> [config_path]", args[0]);
        eprintln!("Config files may be YAML (.yaml, .yml) or JSON (.json)");
        std::process::exit(1);
    }
    let image_path = Path::new(&args[1]);

    let config = match args.get(2) {
        Some(path) => MeanShiftConfig::from_file(Path::new(path))?,
        None => MeanShiftConfig::default(),
    };
    println!("Configuration:\n{}", common::serialize(&config, common::FileFormat::Yaml)?);

    let image = image::open(image_path)
        .with_context(|| format!("failed to open {}", image_path.display()))?
        .to_rgb8();
    println!(
        "Image: {} ({}x{})",
        image_path.display(),
        image.width(),
        image.height()
    );

    let segmenter = MeanShiftSegmenter::from_config(config);
    let start = Instant::now();
    let result = segmenter.segment_full(&image)?;
    println!(
        "Segmented into {} regions in {:.2?}",
        result.segmentation.region_count(),
        start.elapsed()
    );
    print_diagnostics(&result.segmentation.diagnostics);

    let stem = image_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("image");
    let output_dir = image_path.parent().unwrap_or(Path::new("."));

    let segmented_path = output_dir.join(format!("{stem}_segmented.png"));
    result.segmented.save(&segmented_path)?;
    println!("Wrote {}", segmented_path.display());

    if let Some(filtered) = &result.filtered {
        let filtered_path = output_dir.join(format!("{stem}_filtered.png"));
        filtered.save(&filtered_path)?;
        println!("Wrote {}", filtered_path.display());
    }

    Ok(())
}

fn print_diagnostics(diag: &Diagnostics) {
    println!("  Mode seeking:");
    println!("    Starting points: {} of {} pixels", diag.mean_shift_starts, diag.pixels);
    println!("    Mean iterations: {:.2}", diag.mean_iterations());
    println!("    Not converged: {}", diag.non_converged);
    println!("    Empty windows: {}", diag.empty_windows);
    println!("  Regions:");
    println!("    After labeling: {}", diag.regions_after_labeling);
    println!(
        "    After fusion: {} ({} passes)",
        diag.regions_after_fusion, diag.fusion_passes
    );
    println!(
        "    After pruning: {} ({} passes)",
        diag.regions_after_pruning, diag.pruning_passes
    );
    if diag.classic_classes_found > 0 {
        println!("    Classic classes found: {}", diag.classic_classes_found);
    }
}
