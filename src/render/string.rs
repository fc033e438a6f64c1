// ============================================================================
// spark-fiber - Static Rendering
// One-shot HTML serialization of an element tree
// ============================================================================
//
// Components run once with a static scope: state hooks return their initial
// values, effects and watches never run, and every slot is disposed as soon
// as the component returns. No node tree is built; the output is written
// while walking the elements.
// ============================================================================

use std::any::Any;
use std::rc::Rc;

use crate::core::error::{RenderError, Result};
use crate::hooks::HookSlot;
use crate::hooks::scope::{RenderScope, ScopeMode, ScopeParts};
use crate::reconciler::{normalize_children, normalize_output};
use crate::tree::context::ContextId;
use crate::tree::element::{Child, Component, Element, ElementType, PropValue, Props};

/// Render `root` to an HTML string.
///
/// Text and attribute values are escaped, void elements without children
/// are written self-closing, and event handlers are left out. Portals
/// render nothing. A render error inside an error boundary is replaced by
/// the boundary's fallback; any other error is returned.
///
/// # Example
///
/// ```
/// use spark_fiber::{h, render_to_string};
///
/// let page = h("div")
///     .attr("class", "note")
///     .child(h("input").attr("disabled", true))
///     .child("a < b");
/// assert_eq!(
///     render_to_string(page).unwrap(),
///     r#"<div class="note"><input disabled/>a &lt; b</div>"#
/// );
/// ```
pub fn render_to_string(root: impl Into<Child>) -> Result<String> {
    let span = tracing::debug_span!("render_to_string");
    let _enter = span.enter();

    let mut renderer = StaticRenderer::default();
    let top = normalize_children(std::slice::from_ref(&root.into()));
    renderer.write_list(&top, &mut Vec::new())?;
    Ok(renderer.out)
}

#[derive(Default)]
struct StaticRenderer {
    out: String,
    providers: Vec<(ContextId, Rc<dyn Any>)>,
}

impl StaticRenderer {
    /// Write sibling elements. Each one's index is appended to `path` while
    /// it is written, giving the same id paths as a mounted tree.
    fn write_list(&mut self, elements: &[Element], path: &mut Vec<usize>) -> Result<()> {
        for (index, element) in elements.iter().enumerate() {
            path.push(index);
            let result = self.write_element(element, path);
            path.pop();
            result?;
        }
        Ok(())
    }

    fn write_element(&mut self, element: &Element, path: &mut Vec<usize>) -> Result<()> {
        match &element.ty {
            ElementType::Text => {
                self.out
                    .push_str(&escape_html(element.text.as_deref().unwrap_or_default()));
                Ok(())
            }
            ElementType::Host(tag) => self.write_host(tag, element, path),
            ElementType::Fragment => self.write_list(&normalize_children(&element.children), path),
            ElementType::Provider(context) => {
                let pushed = match &element.value {
                    Some(value) => {
                        self.providers.push((*context, value.clone()));
                        true
                    }
                    None => false,
                };
                let result = self.write_list(&normalize_children(&element.children), path);
                if pushed {
                    self.providers.pop();
                }
                result
            }
            ElementType::Portal(_) => Ok(()),
            ElementType::Component(def) => self.write_component(def, element, path),
        }
    }

    fn write_host(&mut self, tag: &str, element: &Element, path: &mut Vec<usize>) -> Result<()> {
        self.out.push('<');
        self.out.push_str(tag);
        write_attributes(&mut self.out, &element.props);

        let children = normalize_children(&element.children);
        if is_void_element(tag) && children.is_empty() {
            self.out.push_str("/>");
            return Ok(());
        }
        self.out.push('>');
        self.write_list(&children, path)?;
        self.out.push_str("</");
        self.out.push_str(tag);
        self.out.push('>');
        Ok(())
    }

    fn write_component(
        &mut self,
        def: &Component,
        element: &Element,
        path: &mut Vec<usize>,
    ) -> Result<()> {
        let output = self.call(def, element, path, None)?;
        if !def.is_boundary() {
            return self.write_list(&normalize_output(output), path);
        }

        let mark = self.out.len();
        let depth = self.providers.len();
        match self.write_list(&normalize_output(output), path) {
            Ok(()) => Ok(()),
            Err(error) => {
                tracing::debug!(%error, "render error caught by boundary");
                self.out.truncate(mark);
                self.providers.truncate(depth);
                let fallback = self.call(def, element, path, Some(&error))?;
                self.write_list(&normalize_output(fallback), path)
            }
        }
    }

    /// Run a component once and dispose of whatever its hooks created.
    fn call(
        &self,
        def: &Component,
        element: &Element,
        path: &[usize],
        captured: Option<&RenderError>,
    ) -> Result<Child> {
        let id_path = path
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join(".");
        let mut hooks: Vec<HookSlot> = Vec::new();
        let result = {
            let parts = ScopeParts {
                component: def.name(),
                props: &element.props,
                children: &element.children,
                providers: &self.providers,
                id_path: &id_path,
                captured,
            };
            let mut scope = RenderScope::new(parts, &mut hooks, true, ScopeMode::Static);
            def.call(&mut scope).and_then(|output| {
                scope.finish()?;
                Ok(output)
            })
        };
        for slot in hooks {
            for task in slot.unmount_tasks() {
                task();
            }
        }
        result
    }
}

fn write_attributes(out: &mut String, props: &Props) {
    for (name, value) in props.iter() {
        if matches!(value, PropValue::Handler(_)) {
            continue;
        }
        let Some(text) = value.to_attr_string() else {
            continue;
        };
        out.push(' ');
        out.push_str(name);
        if !text.is_empty() {
            out.push_str("=\"");
            out.push_str(&escape_html(&text));
            out.push('"');
        }
    }
}

// =============================================================================
// HTML HELPERS
// =============================================================================

/// Escape text for use in HTML content and double-quoted attributes.
pub(crate) fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Elements that never have content and are written as `<tag/>`.
pub(crate) fn is_void_element(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "source"
            | "track"
            | "wbr"
    )
}

// =============================================================================
// TESTS
// =============================================================================
