// ============================================================================
// spark-fiber - State Hooks
// use_state, use_reducer, use_ref, use_context, use_id
// ============================================================================

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::HookKind;
use super::scope::RenderScope;
use crate::core::error::{RenderError, Result};
use crate::scheduler::root::{UpdateReason, UpdateTarget};
use crate::tree::context::Context;

// =============================================================================
// STATE SETTER
// =============================================================================

/// Setter returned by [`RenderScope::use_state`].
///
/// Writing a value equal to the current one does nothing; anything else
/// stores it and schedules a re-render of the owning node.
pub struct StateSetter<T> {
    cell: Rc<RefCell<T>>,
    target: Option<UpdateTarget>,
}

impl<T> Clone for StateSetter<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            target: self.target.clone(),
        }
    }
}

impl<T: PartialEq + Clone + 'static> StateSetter<T> {
    /// Store `value`. Returns true if it differed from the current value.
    pub fn set(&self, value: T) -> bool {
        if *self.cell.borrow() == value {
            return false;
        }
        *self.cell.borrow_mut() = value;
        if let Some(target) = &self.target {
            target.request(UpdateReason::State);
        }
        true
    }

    /// Functional update from the latest value, not the one captured at
    /// render time.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> bool {
        let next = f(&self.cell.borrow());
        self.set(next)
    }

    /// The latest stored value.
    pub fn get(&self) -> T {
        self.cell.borrow().clone()
    }
}

impl<T> fmt::Debug for StateSetter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateSetter")
            .field("live", &self.target.is_some())
            .finish()
    }
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Action sink returned by [`RenderScope::use_reducer`].
pub struct Dispatch<A> {
    apply: Rc<dyn Fn(A) -> bool>,
}

impl<A> Clone for Dispatch<A> {
    fn clone(&self) -> Self {
        Self {
            apply: self.apply.clone(),
        }
    }
}

impl<A> Dispatch<A> {
    /// Reduce `action` into the state. Returns true if the state changed.
    pub fn dispatch(&self, action: A) -> bool {
        (self.apply)(action)
    }
}

impl<A> fmt::Debug for Dispatch<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Dispatch")
    }
}

type Reducer<S, A> = Rc<dyn Fn(&S, A) -> S>;

struct ReducerSlot<S, A> {
    cell: Rc<RefCell<S>>,
    /// The reducer of the latest render
    reducer: Rc<RefCell<Reducer<S, A>>>,
    dispatch: Dispatch<A>,
}

// =============================================================================
// HOOKS
// =============================================================================

impl RenderScope<'_> {
    /// Persistent state.
    ///
    /// # Example
    ///
    /// ```
    /// use spark_fiber::{Component, MemoryHost, Props, h, mount};
    ///
    /// let counter = Component::new("Counter", |cx| {
    ///     let (count, set_count) = cx.use_state(|| 0)?;
    ///     Ok(h("button")
    ///         .on("click", move |_| {
    ///             set_count.update(|n| n + 1);
    ///         })
    ///         .child(count)
    ///         .into())
    /// });
    ///
    /// let host = MemoryHost::new();
    /// let container = host.create_container();
    /// let mut root = mount(&counter, Props::new(), host.clone(), container).unwrap();
    ///
    /// let button = host.find(container, "button").unwrap();
    /// host.dispatch(button, "click");
    /// root.flush_sync().unwrap();
    /// assert_eq!(host.to_html(container), "<button>1</button>");
    /// ```
    pub fn use_state<T, F>(&mut self, init: F) -> Result<(T, StateSetter<T>)>
    where
        T: PartialEq + Clone + 'static,
        F: FnOnce() -> T,
    {
        let target = self.target();
        if let Some(cell) = self.existing_slot::<Rc<RefCell<T>>>(HookKind::State)? {
            let setter = StateSetter {
                cell: cell.clone(),
                target,
            };
            return Ok((setter.get(), setter));
        }
        let cell = Rc::new(RefCell::new(init()));
        self.push_slot(HookKind::State, cell.clone(), None);
        let setter = StateSetter { cell, target };
        Ok((setter.get(), setter))
    }

    /// State driven by a reducer. Equal results do not re-render.
    pub fn use_reducer<S, A, R, I>(&mut self, reducer: R, init: I) -> Result<(S, Dispatch<A>)>
    where
        S: PartialEq + Clone + 'static,
        A: 'static,
        R: Fn(&S, A) -> S + 'static,
        I: FnOnce() -> S,
    {
        let reducer: Reducer<S, A> = Rc::new(reducer);
        if let Some(slot) = self.existing_slot::<ReducerSlot<S, A>>(HookKind::Reducer)? {
            *slot.reducer.borrow_mut() = reducer;
            return Ok((slot.cell.borrow().clone(), slot.dispatch.clone()));
        }

        let cell = Rc::new(RefCell::new(init()));
        let current = Rc::new(RefCell::new(reducer));
        let setter = StateSetter {
            cell: cell.clone(),
            target: self.target(),
        };
        let dispatch = Dispatch {
            apply: Rc::new({
                let current = current.clone();
                move |action: A| {
                    let reducer = current.borrow().clone();
                    setter.update(|state| reducer(state, action))
                }
            }),
        };

        let value = cell.borrow().clone();
        self.push_slot(
            HookKind::Reducer,
            ReducerSlot {
                cell,
                reducer: current,
                dispatch: dispatch.clone(),
            },
            None,
        );
        Ok((value, dispatch))
    }

    /// A mutable box that lives as long as the node. Writing it never
    /// re-renders.
    pub fn use_ref<T, F>(&mut self, init: F) -> Result<Rc<RefCell<T>>>
    where
        T: 'static,
        F: FnOnce() -> T,
    {
        if let Some(cell) = self.existing_slot::<Rc<RefCell<T>>>(HookKind::Ref)? {
            return Ok(cell.clone());
        }
        let cell = Rc::new(RefCell::new(init()));
        self.push_slot(HookKind::Ref, cell.clone(), None);
        Ok(cell)
    }

    /// The value of the nearest provider of `context` above this node, else
    /// its default.
    pub fn use_context<T: 'static>(&mut self, context: &Context<T>) -> Result<Rc<T>> {
        if self.existing_slot::<()>(HookKind::Context)?.is_none() {
            self.push_slot(HookKind::Context, (), None);
        }
        context
            .lookup(self.providers())
            .ok_or(RenderError::MissingProvider {
                context: context.name(),
            })
    }

    /// An id that is stable for this node and unique within its root,
    /// derived from the node's position.
    pub fn use_id(&mut self) -> Result<String> {
        if let Some(id) = self.existing_slot::<String>(HookKind::Id)? {
            return Ok(id.clone());
        }
        let id = match self.id_counter {
            0 => format!("f{}", self.id_path()),
            n => format!("f{}-{n}", self.id_path()),
        };
        self.id_counter += 1;
        self.push_slot(HookKind::Id, id.clone(), None);
        Ok(id)
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

    fn with_scope<R>(hooks: &mut Vec<HookSlot>, first: bool, f: impl FnOnce(&mut RenderScope<'_>) -> R) -> R {
        let props = Props::new();
        let parts = ScopeParts {
            component: "Test",
            props: &props,
            children: &[],
            providers: &[],
            id_path: "2.1",
            captured: None,
        };
        let mut cx = RenderScope::new(parts, hooks, first, ScopeMode::Static);
        f(&mut cx)
    }

    #[test]
    fn state_persists_and_ignores_equal_writes() {
        let mut hooks = Vec::new();
        let setter = with_scope(&mut hooks, true, |cx| {
            let (value, setter) = cx.use_state(|| 1).unwrap();
            assert_eq!(value, 1);
            setter
        });
        assert!(!setter.set(1));
        assert!(setter.set(5));

        with_scope(&mut hooks, false, |cx| {
            let (value, _) = cx.use_state(|| 100).unwrap();
            assert_eq!(value, 5);
        });
    }

    #[test]
    fn reducer_uses_latest_state() {
        let mut hooks = Vec::new();
        let dispatch = with_scope(&mut hooks, true, |cx| {
            cx.use_reducer(|n: &i32, by: i32| n + by, || 0).unwrap().1
        });
        assert!(dispatch.dispatch(2));
        assert!(dispatch.dispatch(3));
        assert!(!dispatch.dispatch(0));
        with_scope(&mut hooks, false, |cx| {
            let (value, _) = cx.use_reducer(|n: &i32, by: i32| n + by, || 0).unwrap();
            assert_eq!(value, 5);
        });
    }

    #[test]
    fn ids_are_stable_and_distinct() {
        let mut hooks = Vec::new();
        let first = with_scope(&mut hooks, true, |cx| (cx.use_id().unwrap(), cx.use_id().unwrap()));
        assert_eq!(first, ("f2.1".to_string(), "f2.1-1".to_string()));
        let again = with_scope(&mut hooks, false, |cx| (cx.use_id().unwrap(), cx.use_id().unwrap()));
        assert_eq!(first, again);
    }

    #[test]
    fn missing_provider_without_default() {
        let ctx: Context<i32> = Context::new("user");
        let mut hooks = Vec::new();
        let err = with_scope(&mut hooks, true, |cx| cx.use_context(&ctx).unwrap_err());
        assert_eq!(err, RenderError::MissingProvider { context: "user" });
    }

    #[test]
    fn ref_is_stable() {
        let mut hooks = Vec::new();
        let a = with_scope(&mut hooks, true, |cx| cx.use_ref(|| 0).unwrap());
        *a.borrow_mut() = 9;
        let b = with_scope(&mut hooks, false, |cx| cx.use_ref(|| 0).unwrap());
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(*b.borrow(), 9);
    }
}
