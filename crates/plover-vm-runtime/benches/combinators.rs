use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use plover_vm_core::promise::{JsPromiseJob, JsPromiseJobKind};
use plover_vm_core::value::Value;
use plover_vm_runtime::Plover;
use plover_vm_runtime::microtask::JsJobQueue;
use std::hint::black_box;

fn sample_js_job() -> JsPromiseJob {
    JsPromiseJob {
        kind: JsPromiseJobKind::PassthroughFulfill,
        callback: Value::undefined(),
        this_arg: Value::undefined(),
        argument: Value::undefined(),
        result_capability: None,
        result_promise: None,
    }
}

fn bench_js_job_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("runtime_js_job_queue");
    let n = 20_000usize;

    group.bench_function("enqueue_dequeue", |b| {
        b.iter_batched(
            JsJobQueue::new,
            |q| {
                for _ in 0..n {
                    q.enqueue(sample_js_job());
                }
                let mut drained = 0usize;
                while q.dequeue().is_some() {
                    drained += 1;
                }
                black_box(drained);
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

/// A runtime holding `n` promises that settle on ticks `n..1`
fn staggered(n: u64) -> (Plover, Value) {
    let plover = Plover::new();
    let promises = (0..n)
        .map(|i| {
            plover
                .fulfill_at(n - i, Value::number(i as f64))
                .unwrap_or_default()
        })
        .collect();
    let input = plover.create_array(promises);
    (plover, input)
}

fn bench_combinators(c: &mut Criterion) {
    let mut group = c.benchmark_group("runtime_combinators");
    let n = 1_000u64;

    for name in ["all", "allSettled", "race", "any"] {
        group.bench_function(format!("{name}_{n}_staggered"), |b| {
            b.iter_batched(
                || staggered(n),
                |(plover, input)| {
                    let result = plover.call_static(name, &[input]);
                    let _ = plover.run_until_idle();
                    black_box(result.ok().and_then(|p| plover.promise_state(&p)));
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.bench_function(format!("all_{n}_plain_values"), |b| {
        b.iter_batched(
            || {
                let plover = Plover::new();
                let input = plover.create_array((0..n).map(|i| Value::number(i as f64)).collect());
                (plover, input)
            },
            |(plover, input)| {
                let result = plover.call_static("all", &[input]);
                let _ = plover.drain_jobs();
                black_box(result.ok().and_then(|p| plover.promise_state(&p)));
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(runtime_combinators, bench_js_job_queue, bench_combinators);
criterion_main!(runtime_combinators);
