use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use hybrid_hashmap::HybridHashMap;
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn key(n: u64) -> String {
    format!("k{:016x}", n)
}

fn filled(seed: u64, n: usize) -> (HybridHashMap<String, u64>, Vec<String>) {
    let mut m = HybridHashMap::new();
    let keys: Vec<String> = lcg(seed).take(n).map(key).collect();
    for (i, k) in keys.iter().enumerate() {
        m.insert(k.clone(), i as u64);
    }
    (m, keys)
}

fn bench_insert_fresh_100k(c: &mut Criterion) {
    c.bench_function("hybrid::insert_fresh_100k", |b| {
        b.iter_batched(
            HybridHashMap::<String, u64>::new,
            |mut m| {
                for (i, x) in lcg(1).take(100_000).enumerate() {
                    m.insert(key(x), i as u64);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_put_all_presized_100k(c: &mut Criterion) {
    c.bench_function("hybrid::put_all_100k", |b| {
        b.iter_batched(
            || lcg(2).take(100_000).map(key).zip(0u64..).collect::<Vec<_>>(),
            |pairs| {
                let mut m = HybridHashMap::new();
                m.put_all(pairs);
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_remove_random_10k(c: &mut Criterion) {
    c.bench_function("hybrid::remove_random_10k_of_110k", |b| {
        b.iter_batched(
            || {
                let (m, keys) = filled(5, 110_000);
                let n = keys.len();
                let mut sel = std::collections::HashSet::with_capacity(10_000);
                let mut s = 0x9e3779b97f4a7c15u64;
                while sel.len() < 10_000 {
                    s = s.wrapping_mul(2862933555777941757).wrapping_add(3037000493);
                    sel.insert((s as usize) % n);
                }
                let to_remove: Vec<String> = sel.into_iter().map(|i| keys[i].clone()).collect();
                (m, to_remove)
            },
            |(mut m, to_remove)| {
                for k in &to_remove {
                    black_box(m.remove(k));
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_get_hit_and_miss(c: &mut Criterion) {
    c.bench_function("hybrid::get_hit_10k_on_100k", |b| {
        let (m, keys) = filled(7, 100_000);
        let n = keys.len();
        let mut s = 0x9e3779b97f4a7c15u64;
        let queries: Vec<String> = (0..10_000)
            .map(|_| {
                s = s.wrapping_mul(2862933555777941757).wrapping_add(3037000493);
                keys[(s as usize) % n].clone()
            })
            .collect();
        b.iter(|| {
            for k in &queries {
                black_box(m.get(k));
            }
        })
    });

    c.bench_function("hybrid::get_miss_10k_on_100k", |b| {
        let (m, _) = filled(11, 100_000);
        let mut miss = lcg(0xdead_beef);
        b.iter(|| {
            for _ in 0..10_000 {
                let k = key(miss.next().unwrap());
                black_box(m.get(&k));
            }
        })
    });
}

fn bench_compute_and_merge(c: &mut Criterion) {
    c.bench_function("hybrid::merge_counts_100k", |b| {
        let words: Vec<u64> = lcg(13).take(100_000).map(|x| x % 5_000).collect();
        b.iter_batched(
            HybridHashMap::<u64, u64>::new,
            |mut m| {
                for w in &words {
                    m.merge(*w, 1, |a, b| Some(a + b));
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_iterate(c: &mut Criterion) {
    c.bench_function("hybrid::iter_all_100k", |b| {
        let (m, _) = filled(999, 100_000);
        b.iter(|| {
            let mut sum = 0u64;
            for (_k, v) in m.iter() {
                sum = sum.wrapping_add(*v);
            }
            black_box(sum)
        })
    });

    c.bench_function("hybrid::cursor_all_100k", |b| {
        let (m, _) = filled(1001, 100_000);
        b.iter(|| {
            let mut sum = 0u64;
            let mut cur = m.cursor();
            while let Ok(Some((_k, v))) = cur.next(&m) {
                sum = sum.wrapping_add(*v);
            }
            black_box(sum)
        })
    });

    c.bench_function("hybrid::clone_100k", |b| {
        let (m, _) = filled(1003, 100_000);
        b.iter(|| black_box(m.clone()))
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(12)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1))
}

criterion_group! {
    name = benches_insert;
    config = bench_config();
    targets = bench_insert_fresh_100k, bench_put_all_presized_100k
}
criterion_group! {
    name = benches_ops;
    config = bench_config();
    targets = bench_remove_random_10k,
              bench_get_hit_and_miss,
              bench_compute_and_merge,
              bench_iterate
}
criterion_main!(benches_insert, benches_ops);
