use glyphtrigger::{CpuMatcher, GpuMatcher, GrayscaleMatrix, MatchParams, TemplateMatcher};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

fn make_image(width: usize, height: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let value = ((x * 13) ^ (y * 7) ^ (x * y)) & 0xFF;
            data.push(value as u8);
        }
    }
    data
}

fn bench_matcher(c: &mut Criterion) {
    // Detect-area sized source, glyph near the bottom-right so most of the
    // grid is scanned before the hit.
    let (img_width, img_height) = (550, 950);
    let image = make_image(img_width, img_height);
    let source = GrayscaleMatrix::from_luma8(&image, img_width, img_height).unwrap();
    let template = source.crop(480, 880, 32, 32).unwrap();
    let absent = GrayscaleMatrix::filled(32, 32, 0.5).unwrap();
    let params = MatchParams::default();

    let mut cpu = CpuMatcher::new();
    c.bench_function("cpu_first_match_hit", |b| {
        b.iter(|| black_box(cpu.find_first_match(&source, &template, &params)));
    });
    c.bench_function("cpu_first_match_miss", |b| {
        b.iter(|| black_box(cpu.find_first_match(&source, &absent, &params)));
    });

    if cfg!(feature = "rayon") {
        let mut cpu_par = CpuMatcher::new().with_parallel(true);
        c.bench_function("cpu_first_match_hit_parallel", |b| {
            b.iter(|| black_box(cpu_par.find_first_match(&source, &template, &params)));
        });
    }

    let mut gpu = GpuMatcher::default();
    if gpu.ensure_initialized() {
        c.bench_function("gpu_first_match_hit", |b| {
            b.iter(|| black_box(gpu.find_first_match(&source, &template, &params)));
        });
        c.bench_function("gpu_first_match_miss", |b| {
            b.iter(|| black_box(gpu.find_first_match(&source, &absent, &params)));
        });
    }
}

criterion_group!(benches, bench_matcher);
criterion_main!(benches);
