// ============================================================================
// spark-fiber - Elements
// The declarative description a component returns: elements, props, children
// ============================================================================

use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::context::ContextId;
use crate::core::error::{RenderError, Result};
use crate::hooks::RenderScope;
use crate::host::{Event, EventHandler, HostHandle};

// =============================================================================
// KEY
// =============================================================================

/// Stable identity hint for a child among its siblings.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(Rc<str>);

impl Key {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key(Rc::from(value))
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key(Rc::from(value))
    }
}

macro_rules! key_from_int {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Key {
            fn from(value: $ty) -> Self {
                Key(Rc::from(value.to_string()))
            }
        })*
    };
}

key_from_int!(i32, i64, u32, u64, usize);

// =============================================================================
// NODE REF
// =============================================================================

/// A slot the commit phase fills with the host node of the element it is
/// attached to, and clears when that element is removed.
#[derive(Clone, Default)]
pub struct NodeRef(Rc<Cell<Option<HostHandle>>>);

impl NodeRef {
    pub fn new() -> Self {
        Self::default()
    }

    /// The host node, once committed.
    pub fn get(&self) -> Option<HostHandle> {
        self.0.get()
    }

    pub(crate) fn set(&self, handle: HostHandle) {
        self.0.set(Some(handle));
    }

    pub(crate) fn clear(&self) {
        self.0.set(None);
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeRef").field(&self.get()).finish()
    }
}

// =============================================================================
// PROPS
// =============================================================================

/// A single prop value.
///
/// Handlers and `Any` values compare by pointer, so a closure rebuilt on every
/// render counts as a change.
#[derive(Clone)]
pub enum PropValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Handler(EventHandler),
    Any(Rc<dyn Any>),
}

impl PropValue {
    /// The attribute text a host node receives, or `None` if the prop is not
    /// an attribute (`false`, handlers, opaque values).
    pub fn to_attr_string(&self) -> Option<String> {
        match self {
            PropValue::Str(s) => Some(s.clone()),
            PropValue::Int(i) => Some(i.to_string()),
            PropValue::Float(f) => Some(f.to_string()),
            PropValue::Bool(true) => Some(String::new()),
            PropValue::Bool(false) | PropValue::Handler(_) | PropValue::Any(_) => None,
        }
    }

    pub fn is_handler(&self) -> bool {
        matches!(self, PropValue::Handler(_))
    }
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropValue::Str(a), PropValue::Str(b)) => a == b,
            (PropValue::Int(a), PropValue::Int(b)) => a == b,
            (PropValue::Float(a), PropValue::Float(b)) => a.to_bits() == b.to_bits(),
            (PropValue::Bool(a), PropValue::Bool(b)) => a == b,
            (PropValue::Handler(a), PropValue::Handler(b)) => {
                Rc::as_ptr(a) as *const () == Rc::as_ptr(b) as *const ()
            }
            (PropValue::Any(a), PropValue::Any(b)) => {
                Rc::as_ptr(a) as *const () == Rc::as_ptr(b) as *const ()
            }
            _ => false,
        }
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Str(s) => write!(f, "{s:?}"),
            PropValue::Int(i) => write!(f, "{i}"),
            PropValue::Float(x) => write!(f, "{x}"),
            PropValue::Bool(b) => write!(f, "{b}"),
            PropValue::Handler(_) => f.write_str("<handler>"),
            PropValue::Any(_) => f.write_str("<any>"),
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(value.to_string())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Str(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        PropValue::Int(value.into())
    }
}

impl From<usize> for PropValue {
    fn from(value: usize) -> Self {
        PropValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

/// Ordered prop map. Insertion order is the order attributes reach the host.
#[derive(Clone, Default, PartialEq)]
pub struct Props {
    entries: IndexMap<String, PropValue>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    ///
    /// # Example
    ///
    /// ```
    /// use spark_fiber::Props;
    ///
    /// let props = Props::new().with("label", "Save").with("count", 3);
    /// assert_eq!(props.str("label"), Some("Save"));
    /// assert_eq!(props.int("count"), Some(3));
    /// ```
    pub fn with(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Attach an arbitrary value, read back with [`Props::value`].
    pub fn with_value<T: 'static>(mut self, name: impl Into<String>, value: T) -> Self {
        self.entries
            .insert(name.into(), PropValue::Any(Rc::new(value)));
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<PropValue>) {
        self.entries.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            PropValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            PropValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            PropValue::Float(f) => Some(*f),
            PropValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            PropValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn handler(&self, name: &str) -> Option<EventHandler> {
        match self.get(name)? {
            PropValue::Handler(h) => Some(h.clone()),
            _ => None,
        }
    }

    /// A value stored with [`Props::with_value`], if it has type `T`.
    pub fn value<T: 'static>(&self, name: &str) -> Option<Rc<T>> {
        match self.get(name)? {
            PropValue::Any(value) => value.clone().downcast::<T>().ok(),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

// =============================================================================
// COMPONENT
// =============================================================================

/// Signature of a component body.
pub type RenderFn = dyn Fn(&mut RenderScope<'_>) -> Result<Child>;

pub struct ComponentDef {
    name: String,
    render: Box<RenderFn>,
    boundary: bool,
}

/// A function component. Identity is the allocation, so create each
/// component once and clone the handle.
///
/// # Example
///
/// ```
/// use spark_fiber::{Component, h, render_to_string, component, Props};
///
/// let greeting = Component::new("Greeting", |cx| {
///     let name = cx.props().str("name").unwrap_or("world").to_string();
///     Ok(h("p").child(format!("Hello, {name}!")).into())
/// });
///
/// let html = render_to_string(component(&greeting, Props::new().with("name", "Ada"))).unwrap();
/// assert_eq!(html, "<p>Hello, Ada!</p>");
/// ```
#[derive(Clone)]
pub struct Component(Rc<ComponentDef>);

impl Component {
    pub fn new<F>(name: impl Into<String>, render: F) -> Self
    where
        F: Fn(&mut RenderScope<'_>) -> Result<Child> + 'static,
    {
        Component(Rc::new(ComponentDef {
            name: name.into(),
            render: Box::new(render),
            boundary: false,
        }))
    }

    fn new_boundary<F>(name: &str, render: F) -> Self
    where
        F: Fn(&mut RenderScope<'_>) -> Result<Child> + 'static,
    {
        Component(Rc::new(ComponentDef {
            name: name.to_string(),
            render: Box::new(render),
            boundary: true,
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Whether this component catches render errors from its descendants.
    pub fn is_boundary(&self) -> bool {
        self.0.boundary
    }

    pub(crate) fn call(&self, scope: &mut RenderScope<'_>) -> Result<Child> {
        (self.0.render)(scope)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({})", self.0.name)
    }
}

// =============================================================================
// ELEMENT TYPE
// =============================================================================

/// What an element is. Two elements can share a node only if their types
/// match.
#[derive(Clone, Debug)]
pub enum ElementType {
    /// A host element with the given tag
    Host(Rc<str>),
    Text,
    Component(Component),
    Fragment,
    Provider(ContextId),
    /// Children are mounted into another host container
    Portal(HostHandle),
}

impl ElementType {
    pub fn same_type(&self, other: &ElementType) -> bool {
        match (self, other) {
            (ElementType::Host(a), ElementType::Host(b)) => a == b,
            (ElementType::Text, ElementType::Text) => true,
            (ElementType::Component(a), ElementType::Component(b)) => a.ptr_eq(b),
            (ElementType::Fragment, ElementType::Fragment) => true,
            (ElementType::Provider(a), ElementType::Provider(b)) => a == b,
            (ElementType::Portal(a), ElementType::Portal(b)) => a == b,
            _ => false,
        }
    }
}

// =============================================================================
// ELEMENT
// =============================================================================

/// One node of the description a component returns.
#[derive(Clone)]
pub struct Element {
    pub(crate) ty: ElementType,
    pub(crate) key: Option<Key>,
    pub(crate) props: Props,
    pub(crate) node_ref: Option<NodeRef>,
    pub(crate) children: Vec<Child>,
    pub(crate) text: Option<String>,
    /// Provider value
    pub(crate) value: Option<Rc<dyn Any>>,
}

impl Element {
    pub(crate) fn new(ty: ElementType) -> Self {
        Self {
            ty,
            key: None,
            props: Props::new(),
            node_ref: None,
            children: Vec::new(),
            text: None,
            value: None,
        }
    }

    pub fn ty(&self) -> &ElementType {
        &self.ty
    }

    pub fn get_key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set an attribute (host elements) or prop (components).
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.props.insert(name, value);
        self
    }

    /// Replace all props.
    pub fn with_props(mut self, props: Props) -> Self {
        self.props = props;
        self
    }

    /// Attach an event listener, stored as the `on<event>` prop.
    pub fn on(mut self, event: &str, handler: impl Fn(&Event) + 'static) -> Self {
        let handler: EventHandler = Rc::new(handler);
        self.props
            .insert(format!("on{event}"), PropValue::Handler(handler));
        self
    }

    pub fn node_ref(mut self, node_ref: &NodeRef) -> Self {
        self.node_ref = Some(node_ref.clone());
        self
    }

    pub fn child(mut self, child: impl Into<Child>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Append children one level deep, as if each was passed to `child`.
    pub fn children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Child>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Element");
        s.field("ty", &self.ty);
        if let Some(key) = &self.key {
            s.field("key", key);
        }
        if !self.props.is_empty() {
            s.field("props", &self.props);
        }
        if let Some(text) = &self.text {
            s.field("text", text);
        }
        if !self.children.is_empty() {
            s.field("children", &self.children);
        }
        s.finish()
    }
}

// =============================================================================
// CHILD
// =============================================================================

/// Anything a component may return or an element may hold as a child.
#[derive(Clone, Debug, Default)]
pub enum Child {
    Element(Element),
    Text(String),
    /// Flattened into the parent list one level deep
    List(Vec<Child>),
    #[default]
    Empty,
}

impl From<Element> for Child {
    fn from(value: Element) -> Self {
        Child::Element(value)
    }
}

impl From<&str> for Child {
    fn from(value: &str) -> Self {
        Child::Text(value.to_string())
    }
}

impl From<String> for Child {
    fn from(value: String) -> Self {
        Child::Text(value)
    }
}

impl From<&String> for Child {
    fn from(value: &String) -> Self {
        Child::Text(value.clone())
    }
}

macro_rules! child_from_display {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Child {
            fn from(value: $ty) -> Self {
                Child::Text(value.to_string())
            }
        })*
    };
}

child_from_display!(i32, i64, u32, u64, usize, f64);

impl From<bool> for Child {
    fn from(_: bool) -> Self {
        Child::Empty
    }
}

impl From<()> for Child {
    fn from(_: ()) -> Self {
        Child::Empty
    }
}

impl<T: Into<Child>> From<Option<T>> for Child {
    fn from(value: Option<T>) -> Self {
        value.map_or(Child::Empty, Into::into)
    }
}

impl<T: Into<Child>> From<Vec<T>> for Child {
    fn from(value: Vec<T>) -> Self {
        Child::List(value.into_iter().map(Into::into).collect())
    }
}

// =============================================================================
// BUILDERS
// =============================================================================

/// A host element.
pub fn h(tag: &str) -> Element {
    Element::new(ElementType::Host(Rc::from(tag)))
}

/// A text node.
pub fn text(content: impl Into<String>) -> Element {
    let mut element = Element::new(ElementType::Text);
    element.text = Some(content.into());
    element
}

/// Group children without a host node of their own.
pub fn fragment<I>(children: I) -> Element
where
    I: IntoIterator,
    I::Item: Into<Child>,
{
    Element::new(ElementType::Fragment).children(children)
}

/// Attach a key to an element.
pub fn keyed(key: impl Into<Key>, element: Element) -> Element {
    element.key(key)
}

/// An instance of a component with the given props.
pub fn component(def: &Component, props: Props) -> Element {
    Element::new(ElementType::Component(def.clone())).with_props(props)
}

/// Mount `children` into another host container.
pub fn portal<I>(container: HostHandle, children: I) -> Element
where
    I: IntoIterator,
    I::Item: Into<Child>,
{
    Element::new(ElementType::Portal(container)).children(children)
}

pub(crate) fn provider_element(id: ContextId, value: Rc<dyn Any>, child: Child) -> Element {
    let mut element = Element::new(ElementType::Provider(id)).child(child);
    element.value = Some(value);
    element
}

// =============================================================================
// ERROR BOUNDARY
// =============================================================================

/// Fallback renderer stored on a boundary element.
pub(crate) struct BoundaryFallback(Box<dyn Fn(&RenderError) -> Child>);

impl BoundaryFallback {
    pub(crate) fn render(&self, error: &RenderError) -> Child {
        (self.0)(error)
    }
}

const FALLBACK_PROP: &str = "fallback";

thread_local! {
    static BOUNDARY: Component = Component::new_boundary("ErrorBoundary", |cx| {
        match cx.captured_error() {
            Some(error) => Ok(boundary_fallback(cx.props())
                .map(|fallback| fallback.render(error))
                .unwrap_or_default()),
            None => Ok(Child::List(cx.children().to_vec())),
        }
    });
}

pub(crate) fn boundary_fallback(props: &Props) -> Option<Rc<BoundaryFallback>> {
    props.value::<BoundaryFallback>(FALLBACK_PROP)
}

/// Catch render errors from `child` and everything below it, showing
/// `fallback(error)` instead.
///
/// The fallback stays until the boundary's parent renders it again.
pub fn error_boundary<F>(fallback: F, child: impl Into<Child>) -> Element
where
    F: Fn(&RenderError) -> Child + 'static,
{
    let def = BOUNDARY.with(Component::clone);
    let props = Props::new().with_value(FALLBACK_PROP, BoundaryFallback(Box::new(fallback)));
    component(&def, props).child(child)
}

// =============================================================================
// TESTS
// =============================================================================
