use crate::types::{
    CategoryRef, CommodityAncestry, PurchaseRecord, TreemapHierarchy, TreemapNode, TreemapNodeType,
};
use once_cell::sync::Lazy;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// The ten purchase categories that group UNSPSC segments.
pub static CATEGORIES: [(&str, &str); 10] = [
    ("1", "Raw Materials, Chemicals, Paper, Fuel"),
    ("2", "Industrial Equipment & Tools"),
    ("3", "Components & Supplies"),
    ("4", "Construction, Transportation & Facility Equipment & Supplies"),
    ("5", "Medical, Laboratory & Test Equipment & Supplies & Pharmaceuticals"),
    ("6", "Food, Cleaning & Service Industry Equipment & Supplies"),
    ("7", "Business, Communication & Technology Equipment & Supplies"),
    ("8", "Defense, Security & Safety Equipment & Supplies"),
    ("9", "Personal, Domestic & Consumer Equipment & Supplies"),
    ("10", "Services"),
];

static SEGMENT_CATEGORY: Lazy<HashMap<&'static str, usize>> = Lazy::new(|| {
    let groups: [(usize, &[&str]); 10] = [
        (1, &["10000000", "11000000", "12000000", "13000000", "14000000", "15000000"]),
        (
            2,
            &[
                "20000000", "21000000", "22000000", "23000000", "24000000", "25000000", "26000000",
                "27000000",
            ],
        ),
        (3, &["30000000", "31000000", "32000000", "39000000"]),
        (4, &["40000000"]),
        (5, &["41000000", "42000000", "51000000"]),
        (6, &["47000000", "48000000", "50000000"]),
        (7, &["43000000", "44000000", "45000000", "55000000"]),
        (8, &["46000000"]),
        (9, &["49000000", "52000000", "53000000", "54000000", "56000000", "60000000"]),
        (
            10,
            &[
                "64000000", "70000000", "71000000", "72000000", "73000000", "76000000", "77000000",
                "78000000", "80000000", "81000000", "82000000", "83000000", "84000000", "85000000",
                "86000000", "90000000", "91000000", "92000000", "93000000", "94000000", "95000000",
            ],
        ),
    ];
    let mut map = HashMap::new();
    for (category, segments) in groups {
        for segment in segments {
            map.insert(*segment, category - 1);
        }
    }
    map
});

/// Category grouping a segment code, if the segment is known.
pub fn category_for_segment(segment_id: &str) -> Option<CategoryRef> {
    let idx = *SEGMENT_CATEGORY.get(segment_id)?;
    let (id, name) = CATEGORIES[idx];
    Some(CategoryRef::new(id, name))
}

/// Keyed lookup from commodity id to its ancestors.
pub trait HierarchyLookup {
    fn ancestry(&self, commodity_id: &str) -> Option<&CommodityAncestry>;
}

impl HierarchyLookup for HashMap<String, CommodityAncestry> {
    fn ancestry(&self, commodity_id: &str) -> Option<&CommodityAncestry> {
        self.get(commodity_id)
    }
}

/// In-memory commodity index built from the flattened hierarchy export.
#[derive(Debug, Clone, Default)]
pub struct HierarchyIndex {
    by_commodity: HashMap<String, CommodityAncestry>,
}

impl HierarchyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a commodity. Returns `false` when its segment has no category.
    pub fn insert(
        &mut self,
        commodity_id: impl Into<String>,
        segment: CategoryRef,
        family: CategoryRef,
        class: CategoryRef,
    ) -> bool {
        let category = category_for_segment(&segment.id);
        let has_category = category.is_some();
        self.by_commodity.insert(
            commodity_id.into(),
            CommodityAncestry {
                category,
                segment,
                family,
                class,
            },
        );
        has_category
    }

    pub fn len(&self) -> usize {
        self.by_commodity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_commodity.is_empty()
    }
}

impl HierarchyLookup for HierarchyIndex {
    fn ancestry(&self, commodity_id: &str) -> Option<&CommodityAncestry> {
        self.by_commodity.get(commodity_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationReport {
    pub records: usize,
    pub aggregated: usize,
    pub missing_ancestry: usize,
    pub invalid_value: usize,
}

/// Aggregate purchases into a category tree from `top` down to the class level.
///
/// Leaves accumulate purchase values; every parent is derived from its
/// children, so a parent's value is exactly the sum of its children and its
/// overpricing rate is their value-weighted mean. Purchases without an
/// overpricing flag count as not overpriced. Records whose commodity cannot
/// be resolved down from `top` are skipped.
pub fn aggregate<'a, I, L>(
    name: impl Into<String>,
    purchases: I,
    lookup: &L,
    top: TreemapNodeType,
) -> (TreemapHierarchy, AggregationReport)
where
    I: IntoIterator<Item = &'a PurchaseRecord>,
    L: HierarchyLookup + ?Sized,
{
    let mut report = AggregationReport::default();
    let mut root = Bucket::default();

    for purchase in purchases {
        report.records += 1;
        let Some(ancestry) = lookup.ancestry(&purchase.commodity_id) else {
            report.missing_ancestry += 1;
            continue;
        };
        let path: Option<Vec<&CategoryRef>> = TreemapNodeType::ALL[top.depth()..]
            .iter()
            .map(|level| ancestry.ancestor(*level))
            .collect();
        let Some(path) = path else {
            report.missing_ancestry += 1;
            continue;
        };
        let value = purchase.value();
        if !value.is_finite() || value < 0.0 {
            report.invalid_value += 1;
            continue;
        }
        let overpriced_value = if purchase.overpriced == Some(true) { value } else { 0.0 };
        root.add(&path, value, overpriced_value);
        report.aggregated += 1;
    }

    if report.missing_ancestry > 0 {
        warn!(
            count = report.missing_ancestry,
            "purchases without resolvable ancestry skipped"
        );
    }
    debug!(
        records = report.records,
        aggregated = report.aggregated,
        level = %top,
        "purchases aggregated"
    );

    let hierarchy = TreemapHierarchy::new(name, root.into_nodes(top));
    (hierarchy, report)
}

#[derive(Default)]
struct Bucket {
    name: String,
    value: f64,
    overpriced_value: f64,
    children: BTreeMap<String, Bucket>,
}

impl Bucket {
    fn add(&mut self, path: &[&CategoryRef], value: f64, overpriced_value: f64) {
        let Some((head, rest)) = path.split_first() else {
            self.value += value;
            self.overpriced_value += overpriced_value;
            return;
        };
        let child = self.children.entry(head.id.clone()).or_insert_with(|| Bucket {
            name: head.name.clone(),
            ..Bucket::default()
        });
        child.add(rest, value, overpriced_value);
    }

    fn into_nodes(self, level: TreemapNodeType) -> Vec<TreemapNode> {
        let mut nodes: Vec<TreemapNode> = self
            .children
            .into_iter()
            .map(|(id, bucket)| bucket.into_node(id, level))
            .collect();
        nodes.sort_by(|a, b| {
            b.value
                .partial_cmp(&a.value)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        nodes
    }

    fn into_node(self, id: String, level: TreemapNodeType) -> TreemapNode {
        match level.child() {
            Some(next) => {
                let name = self.name.clone();
                TreemapNode::from_children(id, name, level, self.into_nodes(next))
            }
            None => {
                let overpricing_rate = if self.value > 0.0 {
                    (self.overpriced_value / self.value).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                TreemapNode {
                    id,
                    name: self.name,
                    value: self.value,
                    overpricing_rate,
                    node_type: level,
                    children: Vec::new(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> HierarchyIndex {
        let mut index = HierarchyIndex::new();
        index.insert(
            "44121701",
            CategoryRef::new("44000000", "Office"),
            CategoryRef::new("44120000", "Supplies"),
            CategoryRef::new("44121700", "Writing"),
        );
        index.insert(
            "44121801",
            CategoryRef::new("44000000", "Office"),
            CategoryRef::new("44120000", "Supplies"),
            CategoryRef::new("44121800", "Correction"),
        );
        index.insert(
            "10101501",
            CategoryRef::new("10000000", "Live"),
            CategoryRef::new("10100000", "Animals"),
            CategoryRef::new("10101500", "Livestock"),
        );
        index.insert(
            "99101501",
            CategoryRef::new("99000000", "Unknown"),
            CategoryRef::new("99100000", "Unknown"),
            CategoryRef::new("99101500", "Unknown"),
        );
        index
    }

    fn purchase(commodity: &str, quantity: f64, price: f64, overpriced: Option<bool>) -> PurchaseRecord {
        PurchaseRecord {
            institution: "MUNICIPALIDAD DE TALCA".to_string(),
            region_code: 7,
            supplier: "Proveedor".to_string(),
            commodity_id: commodity.to_string(),
            quantity,
            unit_price: price,
            overpriced,
        }
    }

    #[test]
    fn segments_sum_their_classes() {
        let purchases = vec![
            purchase("44121701", 2.0, 100.0, Some(true)),
            purchase("44121801", 1.0, 300.0, Some(false)),
            purchase("10101501", 1.0, 50.0, None),
            purchase("00000000", 1.0, 999.0, Some(true)),
        ];
        let (tree, report) = aggregate("Chile", &purchases, &index(), TreemapNodeType::Segment);

        assert_eq!(report.records, 4);
        assert_eq!(report.aggregated, 3);
        assert_eq!(report.missing_ancestry, 1);

        assert_eq!(tree.name, "Chile");
        assert_eq!(tree.children.len(), 2);
        let office = &tree.children[0];
        assert_eq!(office.id, "44000000");
        assert_eq!(office.node_type, TreemapNodeType::Segment);
        assert_eq!(office.value, 500.0);
        assert!((office.overpricing_rate - 0.4).abs() < 1e-12);

        let supplies = &office.children[0];
        assert_eq!(supplies.node_type, TreemapNodeType::Family);
        assert_eq!(supplies.children.len(), 2);
        assert_eq!(supplies.children[0].id, "44121800");
        assert_eq!(supplies.children[0].node_type, TreemapNodeType::Class);
        assert_eq!(supplies.children[1].overpricing_rate, 1.0);

        assert_eq!(tree.children[1].overpricing_rate, 0.0);
    }

    #[test]
    fn category_root_skips_uncategorised_segments() {
        let purchases = vec![
            purchase("44121701", 1.0, 10.0, None),
            purchase("99101501", 1.0, 10.0, None),
        ];
        let (tree, report) = aggregate("Chile", &purchases, &index(), TreemapNodeType::Category);
        assert_eq!(report.missing_ancestry, 1);
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.children[0].id, "7");
        assert_eq!(tree.children[0].node_type, TreemapNodeType::Category);
        assert_eq!(tree.children[0].children[0].node_type, TreemapNodeType::Segment);
    }

    #[test]
    fn negative_values_are_dropped() {
        let purchases = vec![purchase("44121701", -1.0, 10.0, None)];
        let (tree, report) = aggregate("Chile", &purchases, &index(), TreemapNodeType::Segment);
        assert_eq!(report.invalid_value, 1);
        assert!(tree.is_empty());
        assert_eq!(tree.total_value(), 0.0);
    }

    #[test]
    fn empty_input_yields_valid_empty_tree() {
        let (tree, report) = aggregate("Chile", std::iter::empty(), &index(), TreemapNodeType::Segment);
        assert_eq!(report, AggregationReport::default());
        assert!(tree.is_empty());
        assert_eq!(tree.weighted_overpricing_rate(), 0.0);
    }

    #[test]
    fn class_root_yields_flat_leaves() {
        let purchases = vec![purchase("44121701", 1.0, 10.0, Some(true))];
        let (tree, _) = aggregate("Talca", &purchases, &index(), TreemapNodeType::Class);
        assert_eq!(tree.children.len(), 1);
        assert!(tree.children[0].is_terminal());
        assert_eq!(tree.children[0].overpricing_rate, 1.0);
    }

    #[test]
    fn category_table_covers_segments() {
        assert_eq!(category_for_segment("44000000").map(|c| c.id), Some("7".to_string()));
        assert_eq!(category_for_segment("95000000").map(|c| c.name), Some("Services".to_string()));
        assert!(category_for_segment("99000000").is_none());
    }
}
