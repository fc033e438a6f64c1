//! Benchmarks for spark-fiber
//!
//! Run with: cargo bench

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use spark_fiber::{
    Component, Element, MemoryHost, Props, batch, computed, h, keyed, mount, render_to_string,
    signal, tick, watch,
};

fn list() -> Component {
    Component::new("List", |cx| {
        let order = cx.props().value::<Vec<usize>>("order").unwrap_or_default();
        let items: Vec<Element> = order
            .iter()
            .map(|n| keyed(*n, h("li").attr("class", "row").child(*n)))
            .collect();
        Ok(h("ul").children(items).into())
    })
}

fn order(order: Vec<usize>) -> Props {
    Props::new().with_value("order", order)
}

// =============================================================================
// SIGNAL BENCHMARKS
// =============================================================================

fn bench_signal_set(c: &mut Criterion) {
    let s = signal(0i32);
    let mut n = 0;
    c.bench_function("signal_set", |b| {
        b.iter(|| {
            n += 1;
            s.set(black_box(n))
        })
    });
}

fn bench_computed_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("computed_chain");

    for depth in [1, 10, 100] {
        group.bench_with_input(BenchmarkId::new("depth", depth), &depth, |b, &depth| {
            let s = signal(1i32);
            let mut current = {
                let s = s.clone();
                computed(move || s.get() + 1)
            };
            for _ in 1..depth {
                let prev = current.clone();
                current = computed(move || prev.get() + 1);
            }

            let mut n = 0;
            b.iter(|| {
                n += 1;
                s.set(n);
                black_box(current.get())
            })
        });
    }

    group.finish();
}

fn bench_batched_watch(c: &mut Criterion) {
    let a = signal(0i32);
    let b_sig = signal(0i32);
    let _watch = watch({
        let (a, b_sig) = (a.clone(), b_sig.clone());
        move || {
            black_box(a.get() + b_sig.get());
        }
    });

    let mut n = 0;
    c.bench_function("batched_watch", |b| {
        b.iter(|| {
            n += 1;
            batch(|| {
                a.set(n);
                b_sig.set(n);
            });
            tick();
        })
    });
}

// =============================================================================
// RENDER BENCHMARKS
// =============================================================================

fn bench_mount_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("mount_list");
    let def = list();

    for count in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("rows", count), &count, |b, &count| {
            b.iter(|| {
                let host = MemoryHost::new();
                let container = host.create_container();
                let root = mount(&def, order((0..count).collect()), host, container);
                black_box(root)
            })
        });
    }

    group.finish();
}

fn bench_keyed_reorder(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyed_reorder");
    let def = list();

    for count in [100, 1000] {
        group.bench_with_input(BenchmarkId::new("rotate", count), &count, |b, &count| {
            let host = MemoryHost::new();
            let container = host.create_container();
            let mut current: Vec<usize> = (0..count).collect();
            let Ok(mut root) = mount(&def, order(current.clone()), host, container) else {
                return;
            };
            b.iter(|| {
                current.rotate_right(1);
                black_box(root.render(order(current.clone())))
            })
        });
    }

    group.finish();
}

fn bench_render_to_string(c: &mut Criterion) {
    let def = list();
    let element = spark_fiber::component(&def, order((0..500).collect()));
    c.bench_function("render_to_string_500", |b| {
        b.iter(|| black_box(render_to_string(element.clone())))
    });
}

criterion_group!(signal_benches, bench_signal_set, bench_computed_chain, bench_batched_watch);

criterion_group!(
    render_benches,
    bench_mount_list,
    bench_keyed_reorder,
    bench_render_to_string,
);

criterion_main!(signal_benches, render_benches);
