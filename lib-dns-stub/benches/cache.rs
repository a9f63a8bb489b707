use std::time::SystemTime;

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};

use dns_wire::message::types::test_util::*;
use dns_wire::message::types::{Message, RdataClass, RdataType};
use dns_stub::answer::Answer;
use dns_stub::cache::{AnswerCache, Cache, CacheKey, LruCache};

fn make_entries(count: usize) -> Vec<(CacheKey, Answer)> {
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let owner = format!("host{i}.example.com.");
        let mut response = Message::from_question(1, question(&owner, RdataType::A)).make_response();
        response.answers = vec![a_record(&owner, "192.0.2.1")];
        let answer = Answer::new(
            name(&owner),
            RdataType::A,
            RdataClass::IN,
            response,
            SystemTime::now(),
        );
        out.push(((name(&owner), RdataType::A, RdataClass::IN), answer));
    }
    out
}

#[allow(non_snake_case)]
fn bench__put(c: &mut Criterion) {
    let mut group = c.benchmark_group("put");
    for size in [1, 100, 1000] {
        let entries = make_entries(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("simple", size), &entries, |b, entries| {
            b.iter_batched(
                Cache::new,
                |cache| {
                    for (key, answer) in entries {
                        cache.put(key.clone(), answer.clone());
                    }
                },
                BatchSize::SmallInput,
            );
        });
        group.bench_with_input(BenchmarkId::new("lru", size), &entries, |b, entries| {
            b.iter_batched(
                LruCache::new,
                |cache| {
                    for (key, answer) in entries {
                        cache.put(key.clone(), answer.clone());
                    }
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

#[allow(non_snake_case)]
fn bench__get__hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("get/hit");
    for size in [1, 100, 1000] {
        let entries = make_entries(size);

        let simple = Cache::new();
        let lru = LruCache::new();
        for (key, answer) in &entries {
            simple.put(key.clone(), answer.clone());
            lru.put(key.clone(), answer.clone());
        }

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("simple", size), &entries, |b, entries| {
            b.iter(|| {
                for (key, _) in entries {
                    let _ = simple.get(key);
                }
            });
        });
        group.bench_with_input(BenchmarkId::new("lru", size), &entries, |b, entries| {
            b.iter(|| {
                for (key, _) in entries {
                    let _ = lru.get(key);
                }
            });
        });
    }
    group.finish();
}

#[allow(non_snake_case)]
fn bench__lru__eviction_churn(c: &mut Criterion) {
    let entries = make_entries(1000);
    c.bench_function("lru/eviction_churn", |b| {
        b.iter_batched(
            || LruCache::with_max_size(100),
            |cache| {
                for (key, answer) in &entries {
                    cache.put(key.clone(), answer.clone());
                }
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench__put, bench__get__hit, bench__lru__eviction_churn);
criterion_main!(benches);
