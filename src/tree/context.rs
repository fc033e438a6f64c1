// ============================================================================
// spark-fiber - Context
// Values provided by an ancestor and read by any descendant
// ============================================================================

use std::any::Any;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::element::{Child, Element, provider_element};

static NEXT_CONTEXT: AtomicU64 = AtomicU64::new(1);

/// Identity of a [`Context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

/// A context object. Descendants of `ctx.provide(value, child)` read `value`
/// with `use_context(&ctx)`; outside any provider they get the default.
///
/// # Example
///
/// ```
/// use spark_fiber::{Component, Context, component, h, render_to_string, Props};
///
/// let theme = Context::with_default("theme", "light".to_string());
///
/// let label = Component::new("Label", {
///     let theme = theme.clone();
///     move |cx| {
///         let current = cx.use_context(&theme)?;
///         Ok(h("span").child(current.as_str()).into())
///     }
/// });
///
/// let tree = theme.provide("dark".to_string(), component(&label, Props::new()));
/// assert_eq!(render_to_string(tree).unwrap(), "<span>dark</span>");
/// assert_eq!(render_to_string(component(&label, Props::new())).unwrap(), "<span>light</span>");
/// ```
pub struct Context<T> {
    id: ContextId,
    name: &'static str,
    default: Option<Rc<T>>,
}

impl<T> Clone for Context<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: self.name,
            default: self.default.clone(),
        }
    }
}

impl<T: 'static> Context<T> {
    /// A context without a default. Reading it outside a provider fails with
    /// `RenderError::MissingProvider`.
    pub fn new(name: &'static str) -> Self {
        Self {
            id: ContextId(NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed)),
            name,
            default: None,
        }
    }

    pub fn with_default(name: &'static str, value: T) -> Self {
        Self {
            default: Some(Rc::new(value)),
            ..Self::new(name)
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn default_value(&self) -> Option<Rc<T>> {
        self.default.clone()
    }

    /// Provide `value` to everything under `child`.
    pub fn provide(&self, value: T, child: impl Into<Child>) -> Element {
        let value: Rc<dyn Any> = Rc::new(value);
        provider_element(self.id, value, child.into())
    }

    /// Find this context's value in a provider stack (outermost first).
    pub(crate) fn lookup(&self, providers: &[(ContextId, Rc<dyn Any>)]) -> Option<Rc<T>> {
        providers
            .iter()
            .rev()
            .find(|(id, _)| *id == self.id)
            .and_then(|(_, value)| value.clone().downcast::<T>().ok())
            .or_else(|| self.default.clone())
    }
}

/// Free-function form of [`Context::provide`].
pub fn provider<T: 'static>(context: &Context<T>, value: T, child: impl Into<Child>) -> Element {
    context.provide(value, child)
}

impl<T> std::fmt::Debug for Context<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("name", &self.name)
            .field("id", &self.id)
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
