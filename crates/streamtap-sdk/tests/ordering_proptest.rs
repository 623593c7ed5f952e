use proptest::prelude::*;
use serde_json::json;
use streamtap_sdk::ordering::topo_order;
use streamtap_sdk::types::stream::StreamDescriptor;

/// Random DAG: each stream may depend on streams with a lower index, then
/// the declaration order is rotated so parents are not always first.
fn dag() -> impl Strategy<Value = Vec<StreamDescriptor>> {
    (1_usize..10)
        .prop_flat_map(|n| {
            let edges = proptest::collection::vec(proptest::collection::vec(any::<bool>(), n), n);
            (Just(n), edges, 0..n)
        })
        .prop_map(|(n, edges, rotate)| {
            let mut streams: Vec<StreamDescriptor> = (0..n)
                .map(|i| {
                    let mut desc = StreamDescriptor::new(format!("s{i}"), json!({"type": "object"}))
                        .primary_keys(["id"]);
                    for j in 0..i {
                        if edges[i][j] {
                            desc = desc.parent(format!("s{j}"));
                        }
                    }
                    desc
                })
                .collect();
            streams.rotate_left(rotate);
            streams
        })
}

proptest! {
    #[test]
    fn parents_always_precede_children(streams in dag()) {
        let order = topo_order(&streams).expect("generated graph is acyclic");
        prop_assert_eq!(order.len(), streams.len());

        let position = |name: &str| {
            order
                .iter()
                .position(|&i| streams[i].name == name)
                .expect("every stream is ordered")
        };
        for stream in &streams {
            for parent in &stream.parent_streams {
                prop_assert!(position(parent) < position(&stream.name));
            }
        }
    }

    #[test]
    fn roots_only_keep_declaration_order(n in 0_usize..12) {
        let streams: Vec<StreamDescriptor> = (0..n)
            .map(|i| StreamDescriptor::new(format!("s{i}"), json!({})).primary_keys(["id"]))
            .collect();
        let order = topo_order(&streams).unwrap();
        prop_assert_eq!(order, (0..n).collect::<Vec<_>>());
    }
}
