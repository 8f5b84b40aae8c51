//! One hierarchy level as a bipartite flow: a synthetic source and one
//! target per child.

use crate::navigation::Breadcrumb;
use crate::types::{
    NodeLegendItem, SankeyData, SankeyLink, SankeyNode, SankeyNodeType, TreemapHierarchy, TreemapNode,
    TreemapNodeType,
};
use crate::util::weighted_mean;

pub const SOURCE_ID: &str = "source";
const TARGET_PREFIX: &str = "target-";

/// Flow-graph id of the target standing for tree node `id`.
pub fn target_id(id: &str) -> String {
    format!("{TARGET_PREFIX}{id}")
}

/// Flatten the immediate children of `hierarchy`.
///
/// The source carries the total value and the value-weighted overpricing
/// rate of the children. An empty hierarchy yields only the source, with
/// value 0.
pub fn to_sankey(hierarchy: &TreemapHierarchy) -> SankeyData {
    let total: f64 = hierarchy.children.iter().map(|c| c.value).sum();
    let rate = weighted_mean(hierarchy.children.iter().map(|c| (c.value, c.overpricing_rate)));

    let mut nodes = Vec::with_capacity(hierarchy.children.len() + 1);
    nodes.push(SankeyNode {
        id: SOURCE_ID.to_string(),
        name: hierarchy.name.clone(),
        value: total,
        node_type: SankeyNodeType::Source,
        original_id: None,
        is_clickable: false,
        overpricing_rate: Some(rate),
    });
    nodes.extend(hierarchy.children.iter().map(target_node));

    let links = hierarchy
        .children
        .iter()
        .map(|child| SankeyLink {
            source: SOURCE_ID.to_string(),
            target: target_id(&child.id),
            value: child.value,
        })
        .collect();

    SankeyData { nodes, links }
}

fn target_node(child: &TreemapNode) -> SankeyNode {
    SankeyNode {
        id: target_id(&child.id),
        name: child.name.clone(),
        value: child.value,
        node_type: child.node_type.into(),
        original_id: Some(child.id.clone()),
        is_clickable: !child.is_terminal(),
        overpricing_rate: Some(child.overpricing_rate),
    }
}

/// Share of `value` in `total`, in percent. Zero when `total` is zero.
pub fn percentage_of(value: f64, total: f64) -> f64 {
    if total == 0.0 {
        return 0.0;
    }
    let pct = value / total * 100.0;
    if pct.is_finite() {
        pct
    } else {
        0.0
    }
}

/// Spreadsheet-style letters: 0 → A, 25 → Z, 26 → AA.
pub fn legend_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// One legend entry per target, in diagram order.
pub fn legend_items(data: &SankeyData) -> Vec<NodeLegendItem> {
    let total = data.total_value();
    data.targets()
        .enumerate()
        .map(|(i, node)| NodeLegendItem {
            letter: legend_letter(i),
            name: node.name.clone(),
            value: node.value,
            percentage: percentage_of(node.value, total),
        })
        .collect()
}

/// Hint under the legend for a level whose children are of type `shown`.
pub fn legend_helper_text(shown: Option<TreemapNodeType>) -> &'static str {
    match shown {
        Some(TreemapNodeType::Category) => "Haz clic en una categoría para ver segmentos",
        Some(TreemapNodeType::Segment) => "Haz clic en un segmento para ver familias",
        Some(TreemapNodeType::Family) => "Haz clic en una familia para ver clases",
        Some(TreemapNodeType::Class) | None => "Nivel final - usa las migas de pan para navegar",
    }
}

/// Breadcrumb trail as a single line, e.g. `Chile > Equipos > Suministros`.
pub fn breadcrumb_trail(breadcrumbs: &[Breadcrumb]) -> String {
    breadcrumbs.iter().map(|b| b.name.as_str()).collect::<Vec<_>>().join(" > ")
}
