// ============================================================================
// spark-fiber - Memo Hooks
// use_memo and use_callback
// ============================================================================

use std::rc::Rc;

use super::HookKind;
use super::scope::RenderScope;
use crate::core::error::Result;

struct MemoSlot<D, T> {
    deps: D,
    value: T,
}

impl RenderScope<'_> {
    /// Cache `f()` until `deps` change.
    pub fn use_memo<D, T, F>(&mut self, deps: D, f: F) -> Result<T>
    where
        D: PartialEq + 'static,
        T: Clone + 'static,
        F: FnOnce() -> T,
    {
        if let Some(slot) = self.existing_slot::<MemoSlot<D, T>>(HookKind::Memo)? {
            if slot.deps != deps {
                slot.value = f();
                slot.deps = deps;
            }
            return Ok(slot.value.clone());
        }
        let value = f();
        self.push_slot(
            HookKind::Memo,
            MemoSlot {
                deps,
                value: value.clone(),
            },
            None,
        );
        Ok(value)
    }

    /// Keep the same `Rc` to a callback until `deps` change, so children
    /// comparing it by pointer see no change.
    pub fn use_callback<D, F>(&mut self, deps: D, f: F) -> Result<Rc<F>>
    where
        D: PartialEq + 'static,
        F: 'static,
    {
        if let Some(slot) = self.existing_slot::<MemoSlot<D, Rc<F>>>(HookKind::Callback)? {
            if slot.deps != deps {
                slot.value = Rc::new(f);
                slot.deps = deps;
            }
            return Ok(slot.value.clone());
        }
        let value = Rc::new(f);
        self.push_slot(
            HookKind::Callback,
            MemoSlot {
                deps,
                value: value.clone(),
            },
            None,
        );
        Ok(value)
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
    use std::cell::Cell;

    fn render<R>(hooks: &mut Vec<HookSlot>, first: bool, f: impl FnOnce(&mut RenderScope<'_>) -> R) -> R {
        let props = Props::new();
        let parts = ScopeParts {
            component: "Memo",
            props: &props,
            children: &[],
            providers: &[],
            id_path: "0",
            captured: None,
        };
        f(&mut RenderScope::new(parts, hooks, first, ScopeMode::Static))
    }

    #[test]
    fn memo_recomputes_on_dep_change_only() {
        let calls = Cell::new(0);
        let mut hooks = Vec::new();
        let mut run = |first: bool, dep: i32| {
            render(&mut hooks, first, |cx| {
                cx.use_memo(dep, || {
                    calls.set(calls.get() + 1);
                    dep * 10
                })
                .unwrap()
            })
        };
        assert_eq!(run(true, 1), 10);
        assert_eq!(run(false, 1), 10);
        assert_eq!(calls.get(), 1);
        assert_eq!(run(false, 2), 20);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn callback_identity_follows_deps() {
        let mut hooks = Vec::new();
        let make = |n: i32| move || n;
        let a = render(&mut hooks, true, |cx| cx.use_callback("x", make(1)).unwrap());
        let b = render(&mut hooks, false, |cx| cx.use_callback("x", make(2)).unwrap());
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(b(), 1);
        let c = render(&mut hooks, false, |cx| cx.use_callback("y", make(3)).unwrap());
        assert!(!Rc::ptr_eq(&a, &c));
        assert_eq!(c(), 3);
    }
}
