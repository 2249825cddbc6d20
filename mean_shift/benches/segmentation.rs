use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{Rgb, RgbImage};
use mean_shift::{ClassicConfig, EdisonConfig, MeanShiftConfig, MeanShiftSegmenter, Speedup};

/// Soft gradients with a few hard edges, similar to a simple photo.
fn synthetic_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let band = ((x / 32 + y / 24) % 4) as u8;
        let ripple = ((x * 3 + y * 5) % 7) as u8;
        Rgb([
            band * 50 + ripple,
            120 + ripple * 2 - band * 20,
            (x % 64) as u8 + band * 30,
        ])
    })
}

fn edison_benchmarks(c: &mut Criterion) {
    let image = synthetic_image(256, 192);
    let mut group = c.benchmark_group("edison");
    group.sample_size(10);

    for speedup in [
        Speedup::NoSpeedup,
        Speedup::MediumSpeedup,
        Speedup::HighSpeedup,
    ] {
        let segmenter = MeanShiftSegmenter::from_config(MeanShiftConfig::edison(
            EdisonConfig::default().with_speedup(speedup),
        ));
        group.bench_with_input(
            BenchmarkId::new("segment", format!("{:?}", speedup)),
            &image,
            |b, image| b.iter(|| black_box(segmenter.segment(black_box(image)))),
        );
    }

    let parallel = MeanShiftSegmenter::from_config(MeanShiftConfig::edison(
        EdisonConfig::default()
            .with_speedup(Speedup::NoSpeedup)
            .with_parallel(true),
    ));
    group.bench_with_input(
        BenchmarkId::new("segment", "NoSpeedupParallel"),
        &image,
        |b, image| b.iter(|| black_box(parallel.segment(black_box(image)))),
    );

    group.finish();
}

fn classic_benchmarks(c: &mut Criterion) {
    let image = synthetic_image(256, 192);
    let segmenter =
        MeanShiftSegmenter::from_config(MeanShiftConfig::classic(ClassicConfig::default()));

    let mut group = c.benchmark_group("classic");
    group.sample_size(10);
    group.bench_function("segment", |b| {
        b.iter(|| black_box(segmenter.segment(black_box(&image))))
    });
    group.finish();
}

criterion_group!(benches, edison_benchmarks, classic_benchmarks);
criterion_main!(benches);
