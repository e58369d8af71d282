//! Device kernel against the host reference.
//!
//! Every test needs a compute adapter and is ignored by default; run with
//! `cargo test --test gpu_equivalence -- --include-ignored`.

use glyphtrigger::kernel::scalar::scan_all_matches;
use glyphtrigger::{
    validate_inputs, CpuMatcher, DevicePreference, GpuMatcher, GrayscaleMatrix, MatchParams,
    MatchResult, Point, TemplateMatcher, TieBreak,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_scene(width: usize, height: usize, seed: u64) -> GrayscaleMatrix {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; width * height];
    for value in &mut data {
        *value = rng.random_range(0..=255);
    }
    GrayscaleMatrix::from_luma8(&data, width, height).unwrap()
}

fn block_scene() -> GrayscaleMatrix {
    let mut data = vec![0.0f32; 100 * 100];
    for y in 30..40 {
        for x in 40..50 {
            data[y * 100 + x] = 1.0;
        }
    }
    GrayscaleMatrix::new(data, 100, 100).unwrap()
}

fn gpu() -> GpuMatcher {
    let mut matcher = GpuMatcher::new(DevicePreference::GpuThenCpu);
    assert!(matcher.ensure_initialized(), "no compute adapter");
    matcher
}

#[test]
#[ignore = "requires a compute adapter"]
fn block_scenes_agree() {
    let mut gpu = gpu();
    let mut cpu = CpuMatcher::new();
    let source = block_scene();
    let params = MatchParams::with_threshold(0.95);

    let ones = GrayscaleMatrix::filled(10, 10, 1.0).unwrap();
    assert_eq!(
        gpu.try_find_first_match(&source, &ones, &params).unwrap(),
        MatchResult::FoundAt(Point::new(40, 30))
    );

    let zeros = GrayscaleMatrix::filled(10, 10, 0.0).unwrap();
    assert_eq!(
        gpu.try_find_first_match(&source, &zeros, &params).unwrap(),
        cpu.try_find_first_match(&source, &zeros, &params).unwrap()
    );
}

#[test]
#[ignore = "requires a compute adapter"]
fn random_injections_agree() {
    let mut gpu = gpu();
    let mut cpu = CpuMatcher::new();
    let source = random_scene(257, 193, 21);
    let params = MatchParams::with_threshold(1.0);
    for &(px, py) in &[(0usize, 0usize), (100, 60), (225, 161)] {
        let template = source.crop(px, py, 32, 32).unwrap();
        let expected = MatchResult::FoundAt(Point::new(px as i32, py as i32));
        assert_eq!(gpu.try_find_first_match(&source, &template, &params).unwrap(), expected);
        assert_eq!(cpu.try_find_first_match(&source, &template, &params).unwrap(), expected);
    }
    let absent = random_scene(20, 20, 99);
    assert_eq!(
        gpu.try_find_first_match(&source, &absent, &MatchParams::with_threshold(0.9)).unwrap(),
        MatchResult::NotFound
    );
}

#[test]
#[ignore = "requires a compute adapter"]
fn first_found_hit_qualifies() {
    let mut gpu = gpu();
    let source = GrayscaleMatrix::filled(96, 80, 0.4).unwrap();
    let template = GrayscaleMatrix::filled(7, 5, 0.41).unwrap();
    let params = MatchParams {
        tie_break: TieBreak::FirstFound,
        ..MatchParams::with_threshold(1.0)
    };
    let grid = validate_inputs(&source, &template, &params).unwrap();
    let all = scan_all_matches(&source, &template, grid, &params);
    for _ in 0..4 {
        let point = gpu
            .try_find_first_match(&source, &template, &params)
            .unwrap()
            .point()
            .expect("uniform scene");
        assert!(all.contains(&point));
    }
}

#[test]
#[ignore = "requires a compute adapter"]
fn teardown_and_reinitialize() {
    let mut gpu = gpu();
    let source = block_scene();
    let template = GrayscaleMatrix::filled(10, 10, 1.0).unwrap();
    let params = MatchParams::default();
    let before = gpu.try_find_first_match(&source, &template, &params).unwrap();
    gpu.manager_mut().teardown();
    assert_eq!(gpu.describe(), "Device is not initialized.");
    assert_eq!(gpu.try_find_first_match(&source, &template, &params).unwrap(), before);
    assert!(gpu.manager().is_initialized());
}
