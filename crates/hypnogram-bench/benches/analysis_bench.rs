//! Whole-night analysis throughput.
//!
//! Five cycles is a typical eight-hour recording at 30 s epochs; the
//! fragmented night stresses the window scans.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use hypnogram_bench::{fragmented_night, synthetic_night};
use hypnogram_core::cycles::CycleSegmentation;
use hypnogram_core::transitions::TransitionAnalysis;
use hypnogram_core::{EpochSequence, Thresholds, analyze};

fn bench_analyze(c: &mut Criterion) {
    let thresholds = Thresholds::default();
    let mut group = c.benchmark_group("analyze");
    for cycles in [1, 5, 20] {
        let sequence = EpochSequence::new(synthetic_night(cycles), 30.0);
        group.bench_with_input(BenchmarkId::from_parameter(cycles), &sequence, |b, seq| {
            b.iter(|| criterion::black_box(analyze(seq, &thresholds)));
        });
    }
    group.finish();
}

fn bench_fragmented(c: &mut Criterion) {
    let sequence = EpochSequence::new(fragmented_night(960), 30.0);
    let thresholds = Thresholds::default();
    c.bench_function("analyze_fragmented_960", |b| {
        b.iter(|| criterion::black_box(analyze(&sequence, &thresholds)));
    });
}

fn bench_passes(c: &mut Criterion) {
    let stages = synthetic_night(5);
    let epochs = Thresholds::default().to_epochs(30.0).expect("default thresholds");
    c.bench_function("cycle_segmentation", |b| {
        b.iter(|| criterion::black_box(CycleSegmentation::run(&stages, &epochs, 0.5)));
    });
    c.bench_function("transition_analysis", |b| {
        b.iter(|| criterion::black_box(TransitionAnalysis::run(&stages, &epochs)));
    });
}

criterion_group!(benches, bench_analyze, bench_fragmented, bench_passes);
criterion_main!(benches);
