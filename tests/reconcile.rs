use spark_fiber::{
    Component, Element, HostOp, MemoryHost, NodeRef, Props, component, fragment, h, keyed, mount,
    text,
};

fn keyed_list() -> Component {
    Component::new("List", |cx| {
        let order = cx
            .props()
            .value::<Vec<&'static str>>("order")
            .unwrap_or_default();
        let items: Vec<Element> = order
            .iter()
            .map(|key| keyed(*key, h("li").child(*key)))
            .collect();
        Ok(h("ul").children(items).into())
    })
}

fn order(keys: &[&'static str]) -> Props {
    Props::new().with_value("order", keys.to_vec())
}

#[test]
fn rotate_moves_one_node() {
    let list = keyed_list();
    let host = MemoryHost::new();
    let container = host.create_container();
    let mut root = mount(&list, order(&["a", "b", "c"]), host.clone(), container).unwrap();
    assert_eq!(host.to_html(container), "<ul><li>a</li><li>b</li><li>c</li></ul>");

    let items = host.children(host.find(container, "ul").unwrap());
    host.clear_ops();
    root.render(order(&["c", "a", "b"])).unwrap();

    assert_eq!(host.to_html(container), "<ul><li>c</li><li>a</li><li>b</li></ul>");
    let ops = host.ops();
    assert_eq!(ops.iter().filter(|op| op.is_insert()).count(), 1);
    assert_eq!(ops.iter().filter(|op| op.is_create()).count(), 0);
    assert_eq!(ops.iter().filter(|op| op.is_remove()).count(), 0);

    // Same host nodes, new order
    let after = host.children(host.find(container, "ul").unwrap());
    assert_eq!(after, vec![items[2], items[0], items[1]]);
}

#[test]
fn duplicate_keys_never_strand_a_host_node() {
    let list = keyed_list();
    let host = MemoryHost::new();
    let container = host.create_container();
    let mut root = mount(&list, order(&["a", "a"]), host.clone(), container).unwrap();
    assert_eq!(host.to_html(container), "<ul><li>a</li><li>a</li></ul>");

    host.clear_ops();
    root.render(order(&["b"])).unwrap();
    assert_eq!(host.to_html(container), "<ul><li>b</li></ul>");
    assert_eq!(host.ops().iter().filter(|op| op.is_remove()).count(), 2);

    root.render(order(&[])).unwrap();
    assert_eq!(host.to_html(container), "<ul></ul>");

    // The surviving duplicate is reused by key
    root.render(order(&["a", "a"])).unwrap();
    host.clear_ops();
    root.render(order(&["a"])).unwrap();
    assert_eq!(host.to_html(container), "<ul><li>a</li></ul>");
    assert_eq!(host.ops().iter().filter(|op| op.is_create()).count(), 0);
}

#[test]
fn same_props_twice_touches_nothing() {
    let list = keyed_list();
    let host = MemoryHost::new();
    let container = host.create_container();
    let mut root = mount(&list, order(&["a", "b"]), host.clone(), container).unwrap();

    host.clear_ops();
    root.render(order(&["a", "b"])).unwrap();
    assert!(host.ops().is_empty());
}

#[test]
fn insert_and_remove_keyed_items() {
    let list = keyed_list();
    let host = MemoryHost::new();
    let container = host.create_container();
    let mut root = mount(&list, order(&["a", "b", "c"]), host.clone(), container).unwrap();

    host.clear_ops();
    root.render(order(&["a", "x", "c"])).unwrap();
    assert_eq!(host.to_html(container), "<ul><li>a</li><li>x</li><li>c</li></ul>");

    let ops = host.ops();
    assert_eq!(ops.iter().filter(|op| op.is_remove()).count(), 1);
    // li and its text node
    assert_eq!(ops.iter().filter(|op| op.is_create()).count(), 2);
}

#[test]
fn attribute_and_text_updates_in_place() {
    let label = Component::new("Label", |cx| {
        let tone = cx.props().str("tone").unwrap_or("plain").to_string();
        let count = cx.props().int("count").unwrap_or(0);
        Ok(h("span")
            .attr("class", tone)
            .child(format!("{count} new"))
            .into())
    });
    let host = MemoryHost::new();
    let container = host.create_container();
    let mut root = mount(
        &label,
        Props::new().with("tone", "plain").with("count", 1),
        host.clone(),
        container,
    )
    .unwrap();
    let span = host.find(container, "span").unwrap();

    host.clear_ops();
    root.render(Props::new().with("tone", "alert").with("count", 2))
        .unwrap();

    assert_eq!(host.outer_html(span), "<span class=\"alert\">2 new</span>");
    let ops = host.ops();
    assert_eq!(ops.len(), 2);
    assert!(matches!(&ops[0], HostOp::SetAttribute { name, value, .. } if name == "class" && value == "alert"));
    assert!(matches!(&ops[1], HostOp::SetText { text, .. } if text == "2 new"));
}

#[test]
fn changing_type_replaces_the_node() {
    let view = Component::new("View", |cx| {
        Ok(if cx.props().bool("editing") == Some(true) {
            h("input").attr("value", "draft").into()
        } else {
            h("p").child("draft").into()
        })
    });
    let host = MemoryHost::new();
    let container = host.create_container();
    let mut root = mount(&view, Props::new(), host.clone(), container).unwrap();
    assert_eq!(host.to_html(container), "<p>draft</p>");

    root.render(Props::new().with("editing", true)).unwrap();
    assert_eq!(host.to_html(container), "<input value=\"draft\"/>");
}

#[test]
fn fragments_keep_document_order() {
    let view = Component::new("View", |cx| {
        let middle = cx.props().bool("middle").unwrap_or(false);
        Ok(h("div")
            .child(text("start"))
            .child(if middle {
                Some(fragment(vec![h("b").child("1"), h("i").child("2")]))
            } else {
                None
            })
            .child(text("end"))
            .into())
    });
    let host = MemoryHost::new();
    let container = host.create_container();
    let mut root = mount(&view, Props::new(), host.clone(), container).unwrap();
    assert_eq!(host.to_html(container), "<div>startend</div>");

    root.render(Props::new().with("middle", true)).unwrap();
    assert_eq!(host.to_html(container), "<div>start<b>1</b><i>2</i>end</div>");

    root.render(Props::new()).unwrap();
    assert_eq!(host.to_html(container), "<div>startend</div>");
}

#[test]
fn moved_component_carries_its_host_nodes() {
    let card = Component::new("Card", |cx| {
        let title = cx.props().str("title").unwrap_or_default().to_string();
        Ok(fragment(vec![h("h2").child(title.clone()), h("p").child(title)]).into())
    });
    let board = Component::new("Board", {
        let card = card.clone();
        move |cx| {
            let order = cx
                .props()
                .value::<Vec<&'static str>>("order")
                .unwrap_or_default();
            let cards: Vec<Element> = order
                .iter()
                .map(|title| keyed(*title, component(&card, Props::new().with("title", *title))))
                .collect();
            Ok(h("section").children(cards).into())
        }
    });

    let host = MemoryHost::new();
    let container = host.create_container();
    let mut root = mount(&board, order(&["x", "y"]), host.clone(), container).unwrap();
    assert_eq!(
        host.to_html(container),
        "<section><h2>x</h2><p>x</p><h2>y</h2><p>y</p></section>"
    );

    host.clear_ops();
    root.render(order(&["y", "x"])).unwrap();
    assert_eq!(
        host.to_html(container),
        "<section><h2>y</h2><p>y</p><h2>x</h2><p>x</p></section>"
    );
    assert_eq!(host.ops().iter().filter(|op| op.is_create()).count(), 0);
}

#[test]
fn refs_follow_the_host_node() {
    let node_ref = NodeRef::new();
    let view = Component::new("View", {
        let node_ref = node_ref.clone();
        move |cx| {
            let show = cx.props().bool("show").unwrap_or(true);
            Ok(if show {
                h("canvas").node_ref(&node_ref).into()
            } else {
                ().into()
            })
        }
    });
    let host = MemoryHost::new();
    let container = host.create_container();
    let mut root = mount(&view, Props::new(), host.clone(), container).unwrap();

    let canvas = node_ref.get().unwrap();
    assert_eq!(host.tag(canvas).as_deref(), Some("canvas"));

    root.render(Props::new().with("show", false)).unwrap();
    assert_eq!(node_ref.get(), None);
    assert!(!host.is_attached(canvas));
}
