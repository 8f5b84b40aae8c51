use approx::relative_eq;
use proptest::prelude::*;

use sobreprecio::aggregate::{aggregate, HierarchyIndex};
use sobreprecio::layout::{layout, LayoutConfig};
use sobreprecio::sankey::to_sankey;
use sobreprecio::types::{CategoryRef, PurchaseRecord, TreemapHierarchy, TreemapNode, TreemapNodeType};

const COMMODITIES: [(&str, &str, &str, &str); 5] = [
    ("44121701", "44000000", "44120000", "44121700"),
    ("44121702", "44000000", "44120000", "44121700"),
    ("44122001", "44000000", "44120000", "44122000"),
    ("10101501", "10000000", "10100000", "10101500"),
    ("72101501", "72000000", "72100000", "72101500"),
];

fn index() -> HierarchyIndex {
    let mut index = HierarchyIndex::new();
    for (commodity, segment, family, class) in COMMODITIES {
        index.insert(
            commodity,
            CategoryRef::new(segment, format!("segment {segment}")),
            CategoryRef::new(family, format!("family {family}")),
            CategoryRef::new(class, format!("class {class}")),
        );
    }
    index
}

fn purchase_strategy() -> impl Strategy<Value = PurchaseRecord> {
    (
        0..COMMODITIES.len(),
        0u32..50,
        0u32..2_000_000,
        prop::option::of(any::<bool>()),
    )
        .prop_map(|(c, quantity, price, overpriced)| PurchaseRecord {
            institution: "MUNICIPALIDAD DE TALCA".to_string(),
            region_code: 7,
            supplier: "Proveedor".to_string(),
            commodity_id: COMMODITIES[c].0.to_string(),
            quantity: f64::from(quantity),
            unit_price: f64::from(price),
            overpriced,
        })
}

fn close(a: f64, b: f64) -> bool {
    relative_eq!(a, b, epsilon = 1e-6, max_relative = 1e-9)
}

fn check_node(node: &TreemapNode) -> std::result::Result<(), TestCaseError> {
    prop_assert!((0.0..=1.0).contains(&node.overpricing_rate), "rate out of bounds: {}", node.overpricing_rate);
    if node.children.is_empty() {
        return Ok(());
    }
    let sum: f64 = node.children.iter().map(|c| c.value).sum();
    prop_assert!(close(node.value, sum), "{} != {}", node.value, sum);

    let min = node.children.iter().map(|c| c.overpricing_rate).fold(f64::INFINITY, f64::min);
    let max = node.children.iter().map(|c| c.overpricing_rate).fold(f64::NEG_INFINITY, f64::max);
    prop_assert!(node.overpricing_rate >= min - 1e-9 && node.overpricing_rate <= max + 1e-9);
    for child in &node.children {
        check_node(child)?;
    }
    Ok(())
}

fn leaves(node: &TreemapNode) -> Vec<&TreemapNode> {
    if node.children.is_empty() {
        vec![node]
    } else {
        node.children.iter().flat_map(leaves).collect()
    }
}

proptest! {
    #[test]
    fn aggregation_conserves_value(purchases in prop::collection::vec(purchase_strategy(), 0..60)) {
        let index = index();
        let (tree, report) = aggregate("Chile", &purchases, &index, TreemapNodeType::Segment);
        prop_assert_eq!(report.aggregated, purchases.len());

        let expected: f64 = purchases.iter().map(|p| p.value()).sum();
        prop_assert!(close(tree.total_value(), expected));

        for class in tree.children.iter().flat_map(leaves) {
            let assigned: f64 = purchases
                .iter()
                .filter(|p| COMMODITIES.iter().any(|(c, _, _, cls)| *c == p.commodity_id && *cls == class.id))
                .map(|p| p.value())
                .sum();
            prop_assert!(close(class.value, assigned));
            prop_assert_eq!(class.node_type, TreemapNodeType::Class);
        }
    }

    #[test]
    fn aggregated_rates_are_weighted_means(purchases in prop::collection::vec(purchase_strategy(), 0..60)) {
        let (tree, _) = aggregate("Chile", &purchases, &index(), TreemapNodeType::Segment);
        for node in &tree.children {
            check_node(node)?;
        }
    }

    #[test]
    fn sankey_conserves_flow(
        children in prop::collection::vec((0.0f64..1e9, 0.0f64..=1.0), 0..30),
        width in 1.0f64..2000.0,
        height in 0.0f64..2000.0,
    ) {
        let nodes = children
            .iter()
            .enumerate()
            .map(|(i, &(value, rate))| TreemapNode {
                id: format!("n{i}"),
                name: format!("node {i}"),
                value,
                overpricing_rate: rate,
                node_type: TreemapNodeType::Family,
                children: vec![],
            })
            .collect();
        let data = to_sankey(&TreemapHierarchy::new("root", nodes));

        prop_assert_eq!(data.nodes.iter().filter(|n| n.is_source()).count(), 1);
        let source = data.total_value();
        let targets: f64 = data.targets().map(|n| n.value).sum();
        let links: f64 = data.links.iter().map(|l| l.value).sum();
        prop_assert!(close(source, targets));
        prop_assert!(close(source, links));

        let out = layout(&data, width, height, &LayoutConfig::default()).unwrap();
        let source_height = out.source().map(|n| n.height()).unwrap_or(0.0);
        let widths: f64 = out.links.iter().map(|l| l.width).sum();
        prop_assert!(relative_eq!(source_height, widths, epsilon = 1e-6, max_relative = 1e-9));
        for node in &out.nodes {
            prop_assert!(node.y0.is_finite() && node.y1 >= node.y0);
        }
    }
}
