use spark_fiber::{
    Component, MemoryHost, Props, RenderError, Signal, batch, component, computed, h, mount,
    signal, tick, watch,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[test]
fn computed_double_settles_and_watch_runs_once() {
    let count = signal(5);
    let double = computed!(count => count.get() * 2);
    assert_eq!(double.get(), 10);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let _watch = watch!(double, seen => seen.borrow_mut().push(double.get()));
    assert_eq!(*seen.borrow(), vec![10]);

    count.set(7);
    count.set(6);
    assert_eq!(double.get(), 12);

    tick();
    assert_eq!(*seen.borrow(), vec![10, 12]);
}

#[test]
fn equal_write_notifies_nobody() {
    let name = signal("ada".to_string());
    let runs = Rc::new(Cell::new(0));
    let _watch = watch({
        let (name, runs) = (name.clone(), runs.clone());
        move || {
            let _ = name.get();
            runs.set(runs.get() + 1);
        }
    });

    assert!(!name.set("ada".to_string()));
    tick();
    assert_eq!(runs.get(), 1);
}

#[test]
fn computed_rejects_writes() {
    let a = signal(1);
    let b = computed!(a => a.get() + 1);
    assert_eq!(b.try_write(5), Err(RenderError::ReadOnlySignal));
    assert_eq!(b.get(), 2);
}

#[test]
fn batch_defers_watches_to_the_end() {
    let a = signal(1);
    let b = signal(2);
    let sums = Rc::new(RefCell::new(Vec::new()));
    let _watch = watch!(a, b, sums => sums.borrow_mut().push(a.get() + b.get()));

    batch(|| {
        a.set(10);
        b.set(20);
    });
    tick();
    assert_eq!(*sums.borrow(), vec![3, 30]);
}

/// A component that counts its renders and shows a signal.
fn reader(name: &str, value: &Signal<i32>, renders: &Rc<Cell<u32>>) -> Component {
    let (value, renders) = (value.clone(), renders.clone());
    Component::new(name, move |_| {
        renders.set(renders.get() + 1);
        Ok(h("b").child(value.get()).into())
    })
}

#[test]
fn signal_write_rerenders_only_readers() {
    let shared = signal(1);
    let other = signal(100);
    let (reads_shared, reads_other) = (Rc::new(Cell::new(0)), Rc::new(Cell::new(0)));
    let first = reader("First", &shared, &reads_shared);
    let second = reader("Second", &other, &reads_other);

    let app = Component::new("App", {
        let (first, second) = (first.clone(), second.clone());
        move |_| {
            Ok(h("div")
                .child(component(&first, Props::new()))
                .child(component(&second, Props::new()))
                .into())
        }
    });

    let host = MemoryHost::new();
    let container = host.create_container();
    let mut root = mount(&app, Props::new(), host.clone(), container).unwrap();
    assert_eq!((reads_shared.get(), reads_other.get()), (1, 1));

    shared.set(2);
    root.flush_sync().unwrap();
    assert_eq!(host.to_html(container), "<div><b>2</b><b>100</b></div>");
    assert_eq!((reads_shared.get(), reads_other.get()), (2, 1));
}

#[test]
fn unchanged_computed_skips_the_render() {
    let count = signal(1);
    let parity = computed!(count => count.get() % 2);
    let renders = Rc::new(Cell::new(0));

    let view = Component::new("Parity", {
        let (parity, renders) = (parity.clone(), renders.clone());
        move |_| {
            renders.set(renders.get() + 1);
            let label = if parity.get() == 0 { "even" } else { "odd" };
            Ok(h("span").child(label).into())
        }
    });

    let host = MemoryHost::new();
    let container = host.create_container();
    let mut root = mount(&view, Props::new(), host.clone(), container).unwrap();
    assert_eq!(renders.get(), 1);

    count.set(3);
    root.flush_sync().unwrap();
    assert_eq!(renders.get(), 1);

    count.set(4);
    root.flush_sync().unwrap();
    assert_eq!(renders.get(), 2);
    assert_eq!(host.to_html(container), "<span>even</span>");
}

#[test]
fn node_owned_signal_is_disposed_on_unmount() {
    let handle: Rc<RefCell<Option<Signal<i32>>>> = Rc::default();
    let view = Component::new("View", {
        let handle = handle.clone();
        move |cx| {
            let local = cx.use_signal(|| 0)?;
            let doubled = cx.use_computed({
                let local = local.clone();
                move || local.get() * 2
            })?;
            handle.replace(Some(local));
            Ok(h("i").child(doubled.get()).into())
        }
    });

    let host = MemoryHost::new();
    let container = host.create_container();
    let mut root = mount(&view, Props::new(), host.clone(), container).unwrap();
    let local = handle.borrow().clone().unwrap();

    local.set(21);
    root.flush_sync().unwrap();
    assert_eq!(host.to_html(container), "<i>42</i>");

    root.unmount().unwrap();
    assert!(local.is_disposed());
    assert_eq!(local.get(), 21);
}

#[test]
fn node_watch_follows_props_free_state() {
    let store_log = Rc::new(RefCell::new(Vec::new()));
    let view = Component::new("Cart", {
        let store_log = store_log.clone();
        move |cx| {
            let items = cx.use_store(Vec::<&'static str>::new)?;
            let watched = items.clone();
            let log = store_log.clone();
            cx.use_watch(move || log.borrow_mut().push(watched.get().len()))?;
            if cx.is_first_render() {
                items.update(|list| list.push("apple"));
            }
            Ok(h("p").child(items.get().len()).into())
        }
    });

    let host = MemoryHost::new();
    let container = host.create_container();
    let _root = mount(&view, Props::new(), host.clone(), container).unwrap();
    assert_eq!(host.to_html(container), "<p>1</p>");
    assert_eq!(*store_log.borrow(), vec![0, 1]);
}
