use proptest::prelude::*;
use spark_fiber::{Component, Element, MemoryHost, Props, h, keyed, mount};

fn numbered_list() -> Component {
    Component::new("Numbers", |cx| {
        let order = cx.props().value::<Vec<usize>>("order").unwrap_or_default();
        let items: Vec<Element> = order
            .iter()
            .map(|n| keyed(*n, h("li").attr("data-n", *n).child(*n)))
            .collect();
        Ok(h("ol").children(items).into())
    })
}

fn permutation() -> impl Strategy<Value = (usize, Vec<usize>)> {
    (1usize..16).prop_flat_map(|n| (Just(n), Just((0..n).collect::<Vec<_>>()).prop_shuffle()))
}

proptest! {
    #[test]
    fn permuting_unique_keys_only_moves(input in permutation()) {
        let (n, shuffled) = input;
        let list = numbered_list();
        let host = MemoryHost::new();
        let container = host.create_container();
        let initial: Vec<usize> = (0..n).collect();
        let mut root = mount(
            &list,
            Props::new().with_value("order", initial),
            host.clone(),
            container,
        )
        .unwrap();

        let ol = host.find(container, "ol").unwrap();
        let before = host.children(ol);
        host.clear_ops();
        root.render(Props::new().with_value("order", shuffled.clone())).unwrap();

        let ops = host.ops();
        prop_assert_eq!(ops.iter().filter(|op| op.is_create()).count(), 0);
        prop_assert_eq!(ops.iter().filter(|op| op.is_remove()).count(), 0);
        prop_assert!(ops.iter().filter(|op| op.is_insert()).count() < n);

        let expected: Vec<_> = shuffled.iter().map(|&i| before[i]).collect();
        prop_assert_eq!(host.children(ol), expected);

        // A second identical render is a no-op
        host.clear_ops();
        root.render(Props::new().with_value("order", shuffled)).unwrap();
        prop_assert!(host.ops().is_empty());
    }
}
