use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use std::time::Duration;

use kg_memory_manager::{
    monitor::{MemorySampler, ProcessProbe},
    CacheCategoryConfig, CacheRegistry, Pool, StringPool,
};

/// Pooled buffer reuse against a fresh allocation per request
fn bench_buffer_reuse(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_reuse");

    for size in [256usize, 4_096, 65_536].iter() {
        let pool: Pool<Vec<u8>> = Pool::new("buffer", 64);

        group.bench_with_input(BenchmarkId::new("pooled", size), size, |b, &size| {
            b.iter(|| {
                let mut buffer = pool.acquire(size);
                buffer.resize(size, 1);
                black_box(&buffer);
                pool.release(buffer);
            });
        });

        group.bench_with_input(BenchmarkId::new("fresh", size), size, |b, &size| {
            b.iter(|| {
                let mut buffer: Vec<u8> = Vec::with_capacity(size);
                buffer.resize(size, 1);
                black_box(&buffer);
            });
        });
    }

    group.finish();
}

/// String interning hit path
fn bench_interning(c: &mut Criterion) {
    let strings = StringPool::new("string", 64, 10_000, true);
    let names: Vec<String> = (0..1_000).map(|i| format!("entity-{}", i)).collect();
    for name in &names {
        strings.intern(name);
    }

    c.bench_function("intern_existing", |b| {
        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % names.len();
            black_box(strings.intern(&names[i]));
        });
    });
}

/// Cache set and get with eviction at capacity
fn bench_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache");

    for capacity in [100usize, 10_000].iter() {
        let registry: CacheRegistry<Arc<str>> = CacheRegistry::new(
            &[CacheCategoryConfig::new("query", *capacity, Duration::from_secs(300))],
            true,
        );
        let value: Arc<str> = Arc::from("cached result");

        group.bench_with_input(BenchmarkId::new("set_get", capacity), capacity, |b, &capacity| {
            let mut i = 0usize;
            b.iter(|| {
                i = i.wrapping_add(1);
                let key = format!("k{}", i % (capacity * 2));
                registry.set("query", key.clone(), Arc::clone(&value), None);
                black_box(registry.get("query", &key));
            });
        });
    }

    group.finish();
}

/// Cost of one sample capture against the live process
fn bench_sample_capture(c: &mut Criterion) {
    let sampler = MemorySampler::new(Arc::new(ProcessProbe::new(None)), 1_000, true);

    c.bench_function("sample_capture", |b| {
        b.iter(|| black_box(sampler.capture(None, None)));
    });
}

criterion_group!(
    benches,
    bench_buffer_reuse,
    bench_interning,
    bench_cache,
    bench_sample_capture
);

criterion_main!(benches);
