//! Benchmark tests for marquee-core operations
//!
//! Run with: cargo bench -p marquee-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use marquee_core::buffer::{merge_ranges, BufferTracker};
use marquee_core::engine::build_quality_levels;
use marquee_core::event::{self, Envelope};
use marquee_core::filter::compose_filter;
use marquee_core::testing::{ManualScheduler, MockEngineFactory, MockSink};
use marquee_core::{Command, EngineLevel, MediaEvent, PlayerConfig, PlayerSession};

// ============================================================================
// Helpers
// ============================================================================

/// Fragmented buffered intervals in shuffled order, half of them touching
fn create_raw_ranges(count: usize) -> Vec<(f64, f64)> {
    let mut ranges: Vec<(f64, f64)> = (0..count)
        .map(|i| {
            let start = i as f64 * 4.0;
            let gap = if i % 2 == 0 { 0.0 } else { 0.5 };
            (start, start + 4.0 - gap)
        })
        .collect();
    ranges.reverse();
    ranges
}

fn create_engine_levels(count: i32) -> Vec<EngineLevel> {
    (0..count)
        .map(|index| EngineLevel {
            index,
            height: 144 + ((index * 7919) % 20) as u32 * 108,
            bitrate: 300_000 + index as u64 * 250_000,
        })
        .collect()
}

// ============================================================================
// Buffer Benchmarks
// ============================================================================

fn bench_merge_ranges(c: &mut Criterion) {
    let mut group = c.benchmark_group("Buffer Range Merging");

    for &count in &[1, 10, 100, 1000] {
        let raw = create_raw_ranges(count);
        group.bench_with_input(BenchmarkId::new("merge_ranges", count), &raw, |b, raw| {
            b.iter(|| black_box(merge_ranges(raw.iter().copied())))
        });
    }

    group.finish();
}

fn bench_buffer_tracker(c: &mut Criterion) {
    let mut group = c.benchmark_group("Buffer Tracker");
    let raw = create_raw_ranges(50);

    group.bench_function("update_changed", |b| {
        b.iter(|| {
            let mut tracker = BufferTracker::new();
            black_box(tracker.update(raw.iter().copied()))
        })
    });

    let mut tracker = BufferTracker::new();
    tracker.update(raw.iter().copied());
    group.bench_function("update_unchanged", |b| {
        b.iter(|| black_box(tracker.update(raw.iter().copied())))
    });

    group.bench_function("buffered_ahead", |b| {
        b.iter(|| black_box(tracker.buffered_ahead(black_box(97.0))))
    });

    group.finish();
}

// ============================================================================
// Quality Level Benchmarks
// ============================================================================

fn bench_quality_levels(c: &mut Criterion) {
    let mut group = c.benchmark_group("Quality Levels");

    for &count in &[3, 8, 20] {
        let levels = create_engine_levels(count);
        group.bench_with_input(BenchmarkId::new("build_quality_levels", count), &levels, |b, levels| {
            b.iter(|| black_box(build_quality_levels(levels)))
        });
    }

    group.finish();
}

// ============================================================================
// Filter Benchmarks
// ============================================================================

fn bench_filters(c: &mut Criterion) {
    let mut group = c.benchmark_group("Display Filters");

    group.bench_function("compose_filter_css", |b| {
        b.iter(|| black_box(compose_filter(black_box(120.0), black_box(85.5), black_box(100.0)).to_string()))
    });

    group.finish();
}

// ============================================================================
// Session Benchmarks
// ============================================================================

fn bench_session_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("Session Dispatch");

    let (tx, _rx) = event::channel();
    let mut session = PlayerSession::new(
        PlayerConfig::default(),
        MockSink::new(),
        Box::new(MockEngineFactory::new()),
        Box::new(ManualScheduler::new()),
        tx,
    )
    .unwrap();
    session.load("https://cdn.example.com/master.m3u8").unwrap();
    let attachment = session.attachment().unwrap();
    session
        .dispatch(Envelope::media(attachment, MediaEvent::LoadedMetadata { duration: 3600.0 }))
        .unwrap();

    let mut time = 0.0;
    group.bench_function("time_update", |b| {
        b.iter(|| {
            time = (time + 0.25) % 3600.0;
            session
                .dispatch(Envelope::media(attachment, MediaEvent::TimeUpdate { time }))
                .unwrap()
        })
    });

    group.bench_function("seek_command", |b| {
        b.iter(|| session.command(Command::Seek(black_box(1800.0))).unwrap())
    });

    group.finish();
}

criterion_group!(buffer_benches, bench_merge_ranges, bench_buffer_tracker);
criterion_group!(quality_benches, bench_quality_levels);
criterion_group!(filter_benches, bench_filters);
criterion_group!(session_benches, bench_session_dispatch);

criterion_main!(buffer_benches, quality_benches, filter_benches, session_benches);
