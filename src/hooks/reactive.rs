// ============================================================================
// spark-fiber - Reactive Hooks
// Signals, computeds, watches and stores owned by a node
// ============================================================================
//
// The primitive is created on the first render and disposed when the node
// is deleted. Reading it during render subscribes the component, so a write
// re-renders only the components that read it.
// ============================================================================

use super::HookKind;
use super::scope::RenderScope;
use crate::core::error::Result;
use crate::primitives::computed::{Computed, computed};
use crate::primitives::signal::Signal;
use crate::primitives::store::Store;
use crate::primitives::watch::{Watch, watch};

impl RenderScope<'_> {
    /// A signal owned by this node.
    ///
    /// # Example
    ///
    /// ```
    /// use spark_fiber::{Component, MemoryHost, Props, Signal, h, mount};
    /// use std::cell::RefCell;
    /// use std::rc::Rc;
    ///
    /// let handle: Rc<RefCell<Option<Signal<i32>>>> = Rc::default();
    /// let view = Component::new("View", {
    ///     let handle = handle.clone();
    ///     move |cx| {
    ///         let count = cx.use_signal(|| 1)?;
    ///         handle.replace(Some(count.clone()));
    ///         Ok(h("b").child(count.get()).into())
    ///     }
    /// });
    ///
    /// let host = MemoryHost::new();
    /// let container = host.create_container();
    /// let mut root = mount(&view, Props::new(), host.clone(), container).unwrap();
    ///
    /// handle.borrow().as_ref().unwrap().set(7);
    /// root.flush_sync().unwrap();
    /// assert_eq!(host.to_html(container), "<b>7</b>");
    /// ```
    pub fn use_signal<T, F>(&mut self, init: F) -> Result<Signal<T>>
    where
        T: PartialEq + 'static,
        F: FnOnce() -> T,
    {
        if let Some(signal) = self.existing_slot::<Signal<T>>(HookKind::Signal)? {
            return Ok(signal.clone());
        }
        let signal = Signal::new(init());
        let owned = signal.clone();
        self.push_slot(
            HookKind::Signal,
            signal.clone(),
            Some(Box::new(move || owned.dispose())),
        );
        Ok(signal)
    }

    /// A computed owned by this node. `f` is captured on the first render.
    pub fn use_computed<T, F>(&mut self, f: F) -> Result<Computed<T>>
    where
        T: Clone + PartialEq + 'static,
        F: Fn() -> T + 'static,
    {
        if let Some(existing) = self.existing_slot::<Computed<T>>(HookKind::Computed)? {
            return Ok(existing.clone());
        }
        let value = computed(f);
        let owned = value.clone();
        self.push_slot(
            HookKind::Computed,
            value.clone(),
            Some(Box::new(move || owned.dispose())),
        );
        Ok(value)
    }

    /// A watch owned by this node. It runs once when first rendered, then
    /// again (deferred) whenever what it read changes. Not run in static
    /// renders.
    pub fn use_watch<F>(&mut self, f: F) -> Result<()>
    where
        F: FnMut() + 'static,
    {
        if self.existing_slot::<Option<Watch>>(HookKind::Watch)?.is_some() {
            return Ok(());
        }
        if self.is_static() {
            self.push_slot::<Option<Watch>>(HookKind::Watch, None, None);
            return Ok(());
        }
        let handle = watch(f);
        let owned = handle.clone();
        self.push_slot(
            HookKind::Watch,
            Some(handle),
            Some(Box::new(move || owned.dispose())),
        );
        Ok(())
    }

    /// A store owned by this node.
    pub fn use_store<S, F>(&mut self, init: F) -> Result<Store<S>>
    where
        S: Clone + PartialEq + 'static,
        F: FnOnce() -> S,
    {
        if let Some(store) = self.existing_slot::<Store<S>>(HookKind::Store)? {
            return Ok(store.clone());
        }
        let store = Store::new(init());
        let owned = store.clone();
        self.push_slot(
            HookKind::Store,
            store.clone(),
            Some(Box::new(move || owned.signal().dispose())),
        );
        Ok(store)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::super::HookSlot;
    use super::super::scope::{ScopeMode, ScopeParts};
    use super::*;
    use crate::tree::element::Props;

    fn render<R>(hooks: &mut Vec<HookSlot>, first: bool, f: impl FnOnce(&mut RenderScope<'_>) -> R) -> R {
        let props = Props::new();
        let parts = ScopeParts {
            component: "Reactive",
            props: &props,
            children: &[],
            providers: &[],
            id_path: "0",
            captured: None,
        };
        f(&mut RenderScope::new(parts, hooks, first, ScopeMode::Static))
    }

    #[test]
    fn signal_persists_and_is_disposed_with_slot() {
        let mut hooks = Vec::new();
        let a = render(&mut hooks, true, |cx| cx.use_signal(|| 1).unwrap());
        let b = render(&mut hooks, false, |cx| cx.use_signal(|| 2).unwrap());
        assert!(a.ptr_eq(&b));
        assert_eq!(b.get(), 1);

        for slot in hooks {
            for task in slot.unmount_tasks() {
                task();
            }
        }
        assert!(a.is_disposed());
    }

    #[test]
    fn computed_follows_store() {
        let mut hooks = Vec::new();
        let (store, doubled) = render(&mut hooks, true, |cx| {
            let store = cx.use_store(|| 2).unwrap();
            let source = store.clone();
            let doubled = cx.use_computed(move || source.get() * 2).unwrap();
            (store, doubled)
        });
        assert_eq!(doubled.get(), 4);
        store.set(5);
        assert_eq!(doubled.get(), 10);
    }

    #[test]
    fn static_watch_never_runs() {
        let mut hooks = Vec::new();
        let ran = std::rc::Rc::new(std::cell::Cell::new(false));
        render(&mut hooks, true, |cx| {
            let ran = ran.clone();
            cx.use_watch(move || ran.set(true)).unwrap();
        });
        assert!(!ran.get());
        assert_eq!(hooks.len(), 1);
    }
}
