//! Benchmarks for context switching and forking.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use requestctx::testing::{PlainData, RecordingData};
use requestctx::{fork, switch_to, RequestContext, SharedEntry};

fn populated(entries: usize) -> RequestContext {
    let ctx = RequestContext::new();
    for i in 0..entries {
        ctx.set(&format!("hooked-{i}"), RecordingData::with_callback());
        ctx.set(&format!("plain-{i}"), PlainData::new("value"));
    }
    ctx
}

fn switch_benchmark(c: &mut Criterion) {
    let parent = populated(16);
    let sibling = parent.shallow_copy();
    sibling.overwrite("hooked-0", SharedEntry::new(RecordingData::with_callback()));
    let unrelated = populated(16);

    c.bench_function("switch_related", |b| {
        b.iter(|| {
            let prev = switch_to(Some(parent.clone()));
            black_box(switch_to(Some(sibling.clone())));
            switch_to(prev);
        });
    });

    c.bench_function("switch_unrelated", |b| {
        b.iter(|| {
            let prev = switch_to(Some(parent.clone()));
            black_box(switch_to(Some(unrelated.clone())));
            switch_to(prev);
        });
    });
}

fn fork_benchmark(c: &mut Criterion) {
    let parent = populated(16);
    let prev = switch_to(Some(parent.clone()));

    c.bench_function("fork", |b| {
        b.iter(|| {
            black_box(fork());
            switch_to(Some(parent.clone()));
        });
    });

    switch_to(prev);
}

criterion_group!(benches, switch_benchmark, fork_benchmark);
criterion_main!(benches);
