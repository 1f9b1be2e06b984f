use criterion::{black_box, criterion_group, criterion_main, Criterion};

use weldtrim::motion::{DetectionConfig, MotionDetector, SegmentBuilder};
use weldtrim::video::MemoryClip;

/// One hour at 30 fps with a burst of motion every ten seconds
fn sparse_motion_frames() -> (Vec<usize>, usize) {
    let total = 30 * 60 * 60;
    let frames = (0..total).filter(|i| i % 300 < 45).collect();
    (frames, total)
}

fn bench_segment_builder(c: &mut Criterion) {
    let config = DetectionConfig::default();
    let builder = SegmentBuilder::new(&config);
    let (frames, total) = sparse_motion_frames();

    c.bench_function("build_segments_one_hour", |b| {
        b.iter(|| builder.build(black_box(&frames), total, 30.0))
    });
}

fn bench_motion_detector(c: &mut Criterion) {
    let clip = MemoryClip::alternating(60, 320, 240, 30.0);
    let detector = MotionDetector::new(DetectionConfig::default());

    c.bench_function("detect_60_frames_320x240", |b| {
        b.iter(|| detector.detect(&mut clip.source()))
    });
}

criterion_group!(benches, bench_segment_builder, bench_motion_detector);
criterion_main!(benches);
