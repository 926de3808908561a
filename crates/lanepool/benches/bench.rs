use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use crossbeam_utils::sync::WaitGroup;
use lanepool::{Dispatcher, DispatcherConfig};
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    thread::scope,
    time::{Duration, Instant},
};

// Number of tasks submitted per benchmark iteration (split across producers).
const TOTAL_TASKS: usize = 4096;

type Submit = fn(&Dispatcher, Box<dyn FnOnce() + Send>) -> bool;

/// Benchmarks submit-to-completion throughput for one submission mode across
/// producer counts, against a dispatcher with 50 lanes of 200 slots.
fn bench_mode(c: &mut Criterion, group_name: &str, submit: Submit) {
    let mut group = c.benchmark_group(group_name);
    group.throughput(Throughput::Elements(TOTAL_TASKS as u64));

    let dispatcher = Dispatcher::with_config(
        DispatcherConfig::new(50, 200).with_thread_name("bench-lane"),
    )
    .expect("dispatcher starts");

    for producers in [1, 2, 4, 8, 16] {
        group.bench_function(
            format!("elems/{TOTAL_TASKS}/producers/{producers}"),
            |b| {
                b.iter_custom(|iters| {
                    let count = Arc::new(AtomicU64::new(0));
                    let start = Instant::now();

                    for _ in 0..iters {
                        let wg = WaitGroup::new();
                        scope(|s| {
                            for _ in 0..producers {
                                let wg = wg.clone();
                                let count = Arc::clone(&count);
                                let dispatcher = &dispatcher;
                                s.spawn(move || {
                                    for _ in 0..TOTAL_TASKS / producers {
                                        let wg = wg.clone();
                                        let count = Arc::clone(&count);
                                        black_box(submit(
                                            dispatcher,
                                            Box::new(move || {
                                                count.fetch_add(1, Ordering::Relaxed);
                                                drop(wg);
                                            }),
                                        ));
                                    }
                                });
                            }
                        });
                        wg.wait();
                    }

                    start.elapsed()
                });
            },
        );
    }

    group.finish();

    let report = dispatcher.graceful_stop();
    assert_eq!(report.lost, 0);
}

fn benchmark_serve(c: &mut Criterion) {
    bench_mode(c, "serve", |dispatcher, task| {
        dispatcher.serve(task).is_ok()
    });
}

fn benchmark_serve_with_timeout(c: &mut Criterion) {
    bench_mode(c, "serve_with_timeout", |dispatcher, task| {
        dispatcher
            .serve_with_timeout(task, Duration::from_millis(100))
            .is_ok()
    });
}

fn benchmark_serve_right_away(c: &mut Criterion) {
    // Rejected tasks are dropped, which still releases their wait group
    // handle, so the iteration completes either way.
    bench_mode(c, "serve_right_away", |dispatcher, task| {
        dispatcher.serve_right_away(task).is_ok()
    });
}

criterion_group!(
    benches,
    benchmark_serve,
    benchmark_serve_with_timeout,
    benchmark_serve_right_away
);
criterion_main!(benches);
