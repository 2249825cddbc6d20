use super::*;

fn space_from(width: usize, height: usize, value: impl Fn(usize, usize) -> f32) -> FeatureSpace {
    let first = Grid::from_fn(width, height, |x, y| value(x, y));
    let zeros = Grid::new_filled(width, height, 0.0f32);
    FeatureSpace::from_channels(&first, &zeros, &zeros).unwrap()
}

fn edison_config(speedup: Speedup) -> EdisonConfig {
    EdisonConfig::default()
        .with_speedup(speedup)
        .with_bandwidth(2.0, 5.0)
}

const ALL_SPEEDUPS: [Speedup; 3] = [
    Speedup::NoSpeedup,
    Speedup::MediumSpeedup,
    Speedup::HighSpeedup,
];

#[test]
fn test_uniform_image_keeps_its_color() {
    let space = space_from(7, 5, |_, _| 42.0);
    for speedup in ALL_SPEEDUPS {
        let config = edison_config(speedup);
        let result = ModeSeeker::new(&space, &config).run().unwrap();
        assert_eq!(result.modes.len(), 35);
        assert!(
            result.modes.iter().all(|mode| *mode == [42.0, 0.0, 0.0]),
            "{:?}",
            speedup
        );
    }
}

#[test]
fn test_distant_blocks_keep_block_colors() {
    let space = space_from(8, 6, |x, _| if x < 4 { 10.0 } else { 200.0 });
    for speedup in ALL_SPEEDUPS {
        let config = edison_config(speedup);
        let result = ModeSeeker::new(&space, &config).run().unwrap();
        for y in 0..6 {
            for x in 0..8 {
                let expected = if x < 4 { 10.0 } else { 200.0 };
                assert_eq!(
                    result.modes[y * 8 + x][0],
                    expected,
                    "{:?} at ({}, {})",
                    speedup,
                    x,
                    y
                );
            }
        }
    }
}

#[test]
fn test_speedups_agree_on_piecewise_constant_image() {
    let space = space_from(12, 10, |x, y| match (x < 6, y < 5) {
        (true, true) => 0.0,
        (false, true) => 50.0,
        (true, false) => 100.0,
        (false, false) => 150.0,
    });

    let reference = ModeSeeker::new(&space, &edison_config(Speedup::NoSpeedup))
        .run()
        .unwrap();
    for speedup in [Speedup::MediumSpeedup, Speedup::HighSpeedup] {
        let config = edison_config(speedup);
        let result = ModeSeeker::new(&space, &config).run().unwrap();
        assert_eq!(result.modes, reference.modes, "{:?}", speedup);
    }
}

#[test]
fn test_parallel_matches_sequential() {
    let space = space_from(23, 17, |x, y| ((x * 7 + y * 13) % 11) as f32 * 0.8);
    let sequential = edison_config(Speedup::NoSpeedup);
    let parallel = sequential.clone().with_parallel(true);

    let a = ModeSeeker::new(&space, &sequential).run().unwrap();
    let b = ModeSeeker::new(&space, &parallel).run().unwrap();
    assert_eq!(a.modes, b.modes);
    assert_eq!(a.stats, b.stats);
}

#[test]
fn test_modes_stay_within_input_range() {
    let space = space_from(16, 4, |x, _| x as f32);
    for speedup in ALL_SPEEDUPS {
        let config = EdisonConfig::default()
            .with_speedup(speedup)
            .with_bandwidth(3.0, 4.0);
        let result = ModeSeeker::new(&space, &config).run().unwrap();
        for mode in &result.modes {
            assert!((0.0..=15.0).contains(&mode[0]), "{:?}: {:?}", speedup, mode);
        }
    }
}

#[test]
fn test_no_speedup_iterates_every_pixel() {
    let space = space_from(9, 9, |x, y| ((x + y) % 3) as f32);
    let config = edison_config(Speedup::NoSpeedup);
    let result = ModeSeeker::new(&space, &config).run().unwrap();

    assert_eq!(result.stats.starts, 81);
    assert_eq!(result.stats.iterations_histogram.len(), config.max_trial + 1);
    assert_eq!(result.stats.iterations_histogram.iter().sum::<usize>(), 81);
    assert_eq!(result.stats.iterations_histogram[0], 0);
    assert_eq!(result.stats.empty_windows, 0);
}

#[test]
fn test_path_caching_skips_pixels() {
    let space = space_from(10, 10, |_, _| 7.0);
    for speedup in [Speedup::MediumSpeedup, Speedup::HighSpeedup] {
        let config = EdisonConfig::default().with_speedup(speedup);
        let result = ModeSeeker::new(&space, &config).run().unwrap();
        assert!(result.stats.starts < 100, "{:?}: {}", speedup, result.stats.starts);
        assert_eq!(
            result.stats.iterations_histogram.iter().sum::<usize>(),
            result.stats.starts
        );
    }
}

#[test]
fn test_zero_weights_leave_pixels_unfiltered() {
    let space = space_from(5, 4, |x, y| (x + 2 * y) as f32);
    let weights = Grid::new_filled(5, 4, 0.0f32);

    let medium = edison_config(Speedup::MediumSpeedup);
    let result = ModeSeeker::new(&space, &medium)
        .with_weights(&weights)
        .run()
        .unwrap();
    assert_eq!(result.stats.starts, 20);
    assert_eq!(result.stats.empty_windows, 20);
    for (idx, mode) in result.modes.iter().enumerate() {
        assert_eq!(*mode, space.range(idx));
    }

    // The unaccelerated variant ignores the weight map
    let unaccelerated = edison_config(Speedup::NoSpeedup);
    let result = ModeSeeker::new(&space, &unaccelerated)
        .with_weights(&weights)
        .run()
        .unwrap();
    assert_eq!(result.stats.empty_windows, 0);
}

#[test]
fn test_weights_pull_modes_toward_heavy_pixels() {
    let space = space_from(3, 1, |x, _| 2.0 * x as f32);
    let weights = Grid::from_vec(3, 1, vec![0.0, 0.0, 1.0]);
    let config = EdisonConfig::default()
        .with_speedup(Speedup::MediumSpeedup)
        .with_bandwidth(3.0, 10.0);

    let result = ModeSeeker::new(&space, &config)
        .with_weights(&weights)
        .run()
        .unwrap();
    assert!(result.modes.iter().all(|mode| *mode == [4.0, 0.0, 0.0]));
    assert!(result.stats.starts < 3);
}

#[test]
fn test_single_pixel() {
    let space = space_from(1, 1, |_, _| 3.5);
    for speedup in ALL_SPEEDUPS {
        let config = edison_config(speedup);
        let result = ModeSeeker::new(&space, &config).run().unwrap();
        assert_eq!(result.modes, vec![[3.5, 0.0, 0.0]]);
        assert_eq!(result.stats.starts, 1);
        assert_eq!(result.stats.iterations_histogram[1], 1);
    }
}
