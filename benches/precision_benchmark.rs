//! Performance benchmarks for PerfTier
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use perftier::config::TuningConfig;
use perftier::perf::PerformanceController;
use perftier::precision::{decode, encode_at_level, PrecisionManager, ResidueTable};
use perftier::system::{CapabilityClassifier, GpuVendorClass, HardwareProfile, PerformanceTier};

fn bench_encode_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    let values: Vec<f64> = (0..10_000).map(|i| i as f64 * 0.314_159).collect();
    group.throughput(Throughput::Elements(values.len() as u64));

    for level in [0u8, 2, 4] {
        group.bench_with_input(BenchmarkId::new("encode_decode", level), &level, |b, &level| {
            b.iter(|| {
                let mut table = ResidueTable::new();
                let mut sum = 0.0;
                for v in &values {
                    let encoded = encode_at_level(*v, level, 1, &mut table, None);
                    sum += decode(&encoded, &table);
                }
                black_box(sum)
            });
        });
    }

    group.finish();
}

fn bench_manager_reencode(c: &mut Criterion) {
    let mut store = PrecisionManager::new(&TuningConfig::default());
    let ids: Vec<String> = (0..1000).map(|i| format!("cell-{}", i)).collect();
    for id in &ids {
        store.register_cell(id, 0.0);
    }

    c.bench_function("manager_reencode_1000_cells", |b| {
        let mut tick = 0.0;
        b.iter(|| {
            tick += 0.001;
            for (i, id) in ids.iter().enumerate() {
                black_box(store.encode(id, i as f64 + tick, (i % 9) as u32 + 1));
            }
        });
    });
}

fn bench_classify(c: &mut Criterion) {
    let profiles: Vec<HardwareProfile> = [
        GpuVendorClass::Nvidia,
        GpuVendorClass::Amd,
        GpuVendorClass::Intel,
        GpuVendorClass::Apple,
        GpuVendorClass::Unknown,
    ]
    .iter()
    .flat_map(|gpu| {
        [2.0, 6.0, 12.0, 64.0].map(|memory_gb| HardwareProfile {
            memory_gb,
            gpu_vendor: *gpu,
            ..Default::default()
        })
    })
    .collect();

    c.bench_function("classify_all_buckets", |b| {
        b.iter(|| {
            for profile in &profiles {
                black_box(CapabilityClassifier::classify(profile));
            }
        });
    });
}

fn bench_evaluate(c: &mut Criterion) {
    let mut controller = PerformanceController::new(&TuningConfig::default());
    controller.initialize(None);

    c.bench_function("evaluate_full_history", |b| {
        b.iter(|| {
            controller.set_tier(PerformanceTier::Standard);
            for _ in 0..60 {
                controller.record_sample(58.0);
            }
            black_box(controller.evaluate())
        });
    });
}

criterion_group!(
    benches,
    bench_encode_decode,
    bench_manager_reencode,
    bench_classify,
    bench_evaluate
);
criterion_main!(benches);
