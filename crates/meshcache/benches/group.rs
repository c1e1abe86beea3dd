use std::sync::Arc;
use std::thread;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use meshcache::{BoxError, Group, HashRing};

fn value_loader(key: &str) -> Result<Vec<u8>, BoxError> {
    let mut value = key.as_bytes().to_vec();
    value.resize(1024, b'x');
    Ok(value)
}

fn bench_cached_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("cached_get");
    group.sample_size(50);
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_1kb_cached", |b| {
        let cache = Group::new("bench", 1 << 20, value_loader);
        let keys: Vec<String> = (0..100).map(|i| format!("key{}", i)).collect();

        // Warm the cache
        for key in &keys {
            cache.get(key).unwrap();
        }

        let mut counter = 0;
        b.iter(|| {
            black_box(cache.get(&keys[counter % 100]).unwrap());
            counter += 1;
        });
    });

    group.finish();
}

fn bench_cache_miss(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_miss");
    group.sample_size(50);
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_1kb_miss", |b| {
        // Room for ~10 entries, so cycling 100 keys always misses
        let cache = Group::new("bench", 10 * 1030, value_loader);
        let keys: Vec<String> = (0..100).map(|i| format!("key{}", i)).collect();

        let mut counter = 0;
        b.iter(|| {
            black_box(cache.get(&keys[counter % 100]).unwrap());
            counter += 1;
        });
    });

    group.finish();
}

fn bench_contended_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended");
    group.sample_size(20);
    group.throughput(Throughput::Elements(4 * 1000));

    group.bench_function("4_threads_shared_keys", |b| {
        let cache = Arc::new(Group::new("bench", 1 << 20, value_loader));

        b.iter(|| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let cache = Arc::clone(&cache);
                    thread::spawn(move || {
                        for i in 0..1000 {
                            black_box(cache.get(&format!("key{}", i % 50)).unwrap());
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
        });
    });

    group.finish();
}

fn bench_ring_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_10_peers", |b| {
        let mut ring = HashRing::default();
        ring.add((0..10).map(|i| format!("10.0.0.{}:7000", i)));

        let mut counter = 0u64;
        b.iter(|| {
            black_box(ring.get(&format!("key{}", counter)));
            counter += 1;
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_cached_get,
    bench_cache_miss,
    bench_contended_get,
    bench_ring_lookup
);
criterion_main!(benches);
