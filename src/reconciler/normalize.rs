// ============================================================================
// spark-fiber - Child Normalization
// Turning loose children into the element list the diff works on
// ============================================================================

use crate::tree::element::{Child, Element, ElementType, fragment, text};

/// Normalize an element's children.
///
/// - `Empty` (from `None`, booleans, `()`) is dropped
/// - strings and numbers become text elements
/// - a nested list becomes an unkeyed fragment
pub fn normalize_children(children: &[Child]) -> Vec<Element> {
    let mut out = Vec::with_capacity(children.len());
    for child in children {
        match child {
            Child::Element(element) => out.push(element.clone()),
            Child::Text(content) => out.push(text(content.clone())),
            Child::List(items) => out.push(fragment(items.iter().cloned())),
            Child::Empty => {}
        }
    }
    out
}

/// Normalize what a component returned.
///
/// A top-level list is flattened and a top-level unkeyed fragment is
/// unwrapped, so both put their items directly under the component.
pub fn normalize_output(output: Child) -> Vec<Element> {
    match output {
        Child::Empty => Vec::new(),
        Child::Text(content) => vec![text(content)],
        Child::List(items) => normalize_children(&items),
        Child::Element(element) => {
            if matches!(element.ty, ElementType::Fragment) && element.key.is_none() {
                normalize_children(&element.children)
            } else {
                vec![element]
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::element::h;

    fn kinds(elements: &[Element]) -> Vec<&'static str> {
        elements
            .iter()
            .map(|e| match e.ty() {
                ElementType::Host(_) => "host",
                ElementType::Text => "text",
                ElementType::Fragment => "fragment",
                _ => "other",
            })
            .collect()
    }

    #[test]
    fn drops_empty_and_wraps_text() {
        let children = vec![
            Child::from("a"),
            Child::from(false),
            Child::from(None::<Element>),
            Child::from(h("b")),
            Child::from(3),
        ];
        assert_eq!(
            kinds(&normalize_children(&children)),
            vec!["text", "host", "text"]
        );
    }

    #[test]
    fn nested_list_becomes_fragment() {
        let children = vec![Child::from(h("a")), Child::from(vec![h("b"), h("c")])];
        let normalized = normalize_children(&children);
        assert_eq!(kinds(&normalized), vec!["host", "fragment"]);
        assert_eq!(normalized[1].children.len(), 2);
    }

    #[test]
    fn output_unwraps_unkeyed_fragment_only() {
        let unkeyed = fragment(vec![h("a"), h("b")]);
        assert_eq!(normalize_output(unkeyed.into()).len(), 2);

        let keyed = fragment(vec![h("a"), h("b")]).key("k");
        assert_eq!(kinds(&normalize_output(keyed.into())), vec!["fragment"]);

        assert!(normalize_output(Child::Empty).is_empty());
        assert_eq!(normalize_output(vec![h("a"), h("b"), h("c")].into()).len(), 3);
    }
}
