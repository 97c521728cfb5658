//! Benchmarks for trace processing
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hp3582_control::analysis::{phase_difference, ratio, reconstruct, split_halves};
use hp3582_control::backend::link::parse_values;
use hp3582_control::session::write_csv;
use hp3582_control::types::{
    AcquisitionResult, AmplitudeScale, Derivation, InputSource, SweepMode, Trace, TraceQuantity,
};

fn reply(n: usize) -> String {
    (0..n)
        .map(|i| format!("{:.6}", -20.0 - i as f64 * 0.01))
        .collect::<Vec<_>>()
        .join(",")
}

fn bench_reply_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("reply_parsing");

    for size in [64, 128, 1024].iter() {
        let text = reply(*size);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &text, |b, text| {
            b.iter(|| black_box(parse_values(text).unwrap()));
        });
    }

    group.finish();
}

fn bench_axis_reconstruction(c: &mut Criterion) {
    let mut group = c.benchmark_group("axis_reconstruction");

    for mode in [SweepMode::Fixed25k, SweepMode::Centered] {
        group.bench_function(format!("{}", mode), |b| {
            b.iter(|| black_box(reconstruct(mode, 2_500.0, 10_000.0, 128)));
        });
    }

    group.finish();
}

fn bench_transfer(c: &mut Criterion) {
    let mut group = c.benchmark_group("transfer");
    let a: Vec<f64> = (0..128).map(|i| 1.0 + i as f64 * 0.01).collect();
    let b: Vec<f64> = a.iter().map(|v| v * 0.5).collect();
    let dual: Vec<f64> = a.iter().chain(b.iter()).copied().collect();

    group.bench_function("ratio", |bench| {
        bench.iter(|| black_box(ratio(&a, &b).unwrap()));
    });

    group.bench_function("phase_difference", |bench| {
        bench.iter(|| black_box(phase_difference(&a, &b).unwrap()));
    });

    group.bench_function("split_halves", |bench| {
        bench.iter(|| black_box(split_halves(&dual).unwrap()));
    });

    group.finish();
}

fn bench_csv_export(c: &mut Criterion) {
    let trace = |source| {
        Trace::new(
            source,
            TraceQuantity::for_source(source, AmplitudeScale::TenDbPerDiv),
            Derivation::direct(source),
            vec![-20.5; 128],
        )
    };
    let result = AcquisitionResult::new(
        vec![trace(InputSource::AAmplitude), trace(InputSource::BAmplitude)],
        reconstruct(SweepMode::Fixed25k, 0.0, 0.0, 128),
    )
    .unwrap();

    c.bench_function("csv_export_two_traces", |b| {
        b.iter(|| {
            let mut out = Vec::with_capacity(8 * 1024);
            write_csv(&mut out, black_box(&result)).unwrap();
            black_box(out)
        });
    });
}

criterion_group!(
    benches,
    bench_reply_parsing,
    bench_axis_reconstruction,
    bench_transfer,
    bench_csv_export
);
criterion_main!(benches);
