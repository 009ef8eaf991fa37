use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use handoff::PoolQueue;

const MESSAGES: usize = 100_000;
const POOL_CAPACITY: usize = 4096;

fn bench_uncontended(c: &mut Criterion) {
    let mut group = c.benchmark_group("mpmc_uncontended");
    group.throughput(Throughput::Elements(MESSAGES as u64));

    group.bench_function("push_pop_cycle", |b| {
        let queue = PoolQueue::with_capacity(POOL_CAPACITY);
        b.iter(|| {
            for i in 0..MESSAGES {
                queue.push(black_box(i));
                black_box(queue.pop());
            }
        });
    });

    group.finish();
}

fn bench_handoff(c: &mut Criterion) {
    let mut group = c.benchmark_group("mpmc_handoff");
    group.throughput(Throughput::Elements(MESSAGES as u64));
    group.sample_size(10);

    for (producers, consumers) in [(1, 1), (4, 4), (8, 4)] {
        let name = format!("{producers}p_{consumers}c");
        group.bench_function(name.as_str(), |b| {
            b.iter(|| {
                let queue: Arc<PoolQueue<usize>> = Arc::new(PoolQueue::with_capacity(POOL_CAPACITY));
                let popped = Arc::new(AtomicUsize::new(0));
                let per_producer = MESSAGES / producers;
                let total = per_producer * producers;

                let mut handles = Vec::new();
                for p in 0..producers {
                    let queue = Arc::clone(&queue);
                    handles.push(thread::spawn(move || {
                        for i in 0..per_producer {
                            queue.push(black_box(p * per_producer + i));
                        }
                    }));
                }
                for _ in 0..consumers {
                    let queue = Arc::clone(&queue);
                    let popped = Arc::clone(&popped);
                    handles.push(thread::spawn(move || {
                        while popped.load(Ordering::Relaxed) < total {
                            match queue.pop() {
                                Some(v) => {
                                    black_box(v);
                                    popped.fetch_add(1, Ordering::Relaxed);
                                }
                                None => thread::yield_now(),
                            }
                        }
                    }));
                }
                for h in handles {
                    h.join().unwrap();
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_uncontended, bench_handoff);
criterion_main!(benches);
