use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::util::weighted_mean;

/// One row of the procurement export, as read from CSV.
#[derive(Debug, Deserialize)]
pub struct RawPurchaseRow {
    #[serde(rename = "Institucion")]
    pub institution: Option<String>,
    #[serde(rename = "RegionUnidadCompra")]
    pub region: Option<String>,
    #[serde(rename = "Proveedor")]
    pub supplier: Option<String>,
    #[serde(rename = "CodigoProductoONU")]
    pub commodity_id: Option<String>,
    #[serde(rename = "CantidadItem")]
    pub quantity: Option<String>,
    #[serde(rename = "Precio_Unitario_TOTAL")]
    pub unit_price: Option<String>,
    #[serde(rename = "is_expensive", default)]
    pub is_expensive: Option<String>,
}

/// A cleaned purchase, scoped to a municipality inside a region.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseRecord {
    pub institution: String,
    pub region_code: u32,
    pub supplier: String,
    pub commodity_id: String,
    pub quantity: f64,
    pub unit_price: f64,
    /// `None` when the export carries no overpricing flag for this row.
    pub overpriced: Option<bool>,
}

impl PurchaseRecord {
    pub fn value(&self) -> f64 {
        self.quantity * self.unit_price
    }
}

/// One row of the flattened segment/family/class/commodity join.
#[derive(Debug, Deserialize)]
pub struct RawAncestryRow {
    pub segment_id: Option<String>,
    pub segment_name: Option<String>,
    pub family_id: Option<String>,
    pub family_name: Option<String>,
    pub class_id: Option<String>,
    pub class_name: Option<String>,
    pub commodity_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: String,
    pub name: String,
}

impl CategoryRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Resolved ancestors of a commodity. `category` is absent when the segment
/// has no entry in the category table.
#[derive(Debug, Clone, PartialEq)]
pub struct CommodityAncestry {
    pub category: Option<CategoryRef>,
    pub segment: CategoryRef,
    pub family: CategoryRef,
    pub class: CategoryRef,
}

impl CommodityAncestry {
    pub fn ancestor(&self, level: TreemapNodeType) -> Option<&CategoryRef> {
        match level {
            TreemapNodeType::Category => self.category.as_ref(),
            TreemapNodeType::Segment => Some(&self.segment),
            TreemapNodeType::Family => Some(&self.family),
            TreemapNodeType::Class => Some(&self.class),
        }
    }
}

/// Level of a node in the category tree. The depth of each variant is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreemapNodeType {
    Category,
    Segment,
    Family,
    Class,
}

impl TreemapNodeType {
    pub const ALL: [TreemapNodeType; 4] = [
        TreemapNodeType::Category,
        TreemapNodeType::Segment,
        TreemapNodeType::Family,
        TreemapNodeType::Class,
    ];

    pub fn depth(self) -> usize {
        match self {
            Self::Category => 0,
            Self::Segment => 1,
            Self::Family => 2,
            Self::Class => 3,
        }
    }

    pub fn from_depth(depth: usize) -> Option<Self> {
        Self::ALL.get(depth).copied()
    }

    /// The level directly below, `None` at the terminal class level.
    pub fn child(self) -> Option<Self> {
        Self::from_depth(self.depth() + 1)
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Class
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Segment => "segment",
            Self::Family => "family",
            Self::Class => "class",
        }
    }
}

impl std::fmt::Display for TreemapNodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TreemapNodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "category" => Ok(Self::Category),
            "segment" => Ok(Self::Segment),
            "family" => Ok(Self::Family),
            "class" => Ok(Self::Class),
            other => Err(format!("unknown level {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreemapNode {
    pub id: String,
    pub name: String,
    pub value: f64,
    pub overpricing_rate: f64,
    #[serde(rename = "type")]
    pub node_type: TreemapNodeType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreemapNode>,
}

impl TreemapNode {
    /// Build a parent whose value and rate are derived from `children`.
    pub fn from_children(
        id: impl Into<String>,
        name: impl Into<String>,
        node_type: TreemapNodeType,
        children: Vec<TreemapNode>,
    ) -> Self {
        let value = children.iter().map(|c| c.value).sum();
        let overpricing_rate = weighted_mean(children.iter().map(|c| (c.value, c.overpricing_rate)));
        Self {
            id: id.into(),
            name: name.into(),
            value,
            overpricing_rate,
            node_type,
            children,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.node_type.is_terminal()
    }

    /// View this node as the root of its own sub-hierarchy.
    pub fn as_hierarchy(&self) -> TreemapHierarchy {
        TreemapHierarchy {
            name: self.name.clone(),
            children: self.children.clone(),
        }
    }

    /// Copy of this node without its children.
    pub fn shallow(&self) -> TreemapNode {
        TreemapNode {
            children: Vec::new(),
            ..self.clone()
        }
    }

    fn truncated(&self, depth: usize) -> TreemapNode {
        let children = if depth == 0 {
            Vec::new()
        } else {
            self.children.iter().map(|c| c.truncated(depth - 1)).collect()
        };
        TreemapNode {
            children,
            ..self.shallow()
        }
    }
}

/// Root wrapper of a category tree, labelled with the geographic scope.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TreemapHierarchy {
    pub name: String,
    pub children: Vec<TreemapNode>,
}

impl TreemapHierarchy {
    pub fn new(name: impl Into<String>, children: Vec<TreemapNode>) -> Self {
        Self {
            name: name.into(),
            children,
        }
    }

    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn total_value(&self) -> f64 {
        self.children.iter().map(|c| c.value).sum()
    }

    pub fn weighted_overpricing_rate(&self) -> f64 {
        weighted_mean(self.children.iter().map(|c| (c.value, c.overpricing_rate)))
    }

    pub fn child(&self, id: &str) -> Option<&TreemapNode> {
        self.children.iter().find(|c| c.id == id)
    }

    /// Follow a path of node ids from the root.
    pub fn find_path(&self, path: &[String]) -> Option<&TreemapNode> {
        let (first, rest) = path.split_first()?;
        let mut node = self.child(first)?;
        for id in rest {
            node = node.children.iter().find(|c| &c.id == id)?;
        }
        Some(node)
    }

    /// Keep `depth` levels below the root; `truncated(1)` keeps only the
    /// direct children, without grandchildren.
    pub fn truncated(&self, depth: usize) -> TreemapHierarchy {
        if depth == 0 {
            return TreemapHierarchy::empty(self.name.clone());
        }
        TreemapHierarchy {
            name: self.name.clone(),
            children: self.children.iter().map(|c| c.truncated(depth - 1)).collect(),
        }
    }
}

/// Kind of a flow-diagram node: the synthetic source or one tree level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SankeyNodeType {
    Source,
    Category,
    Segment,
    Family,
    Class,
}

impl From<TreemapNodeType> for SankeyNodeType {
    fn from(t: TreemapNodeType) -> Self {
        match t {
            TreemapNodeType::Category => Self::Category,
            TreemapNodeType::Segment => Self::Segment,
            TreemapNodeType::Family => Self::Family,
            TreemapNodeType::Class => Self::Class,
        }
    }
}

impl SankeyNodeType {
    pub fn treemap_type(self) -> Option<TreemapNodeType> {
        match self {
            Self::Source => None,
            Self::Category => Some(TreemapNodeType::Category),
            Self::Segment => Some(TreemapNodeType::Segment),
            Self::Family => Some(TreemapNodeType::Family),
            Self::Class => Some(TreemapNodeType::Class),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SankeyNode {
    pub id: String,
    pub name: String,
    pub value: f64,
    #[serde(rename = "type")]
    pub node_type: SankeyNodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_id: Option<String>,
    pub is_clickable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overpricing_rate: Option<f64>,
}

impl SankeyNode {
    pub fn is_source(&self) -> bool {
        self.node_type == SankeyNodeType::Source
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SankeyLink {
    pub source: String,
    pub target: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SankeyData {
    pub nodes: Vec<SankeyNode>,
    pub links: Vec<SankeyLink>,
}

impl SankeyData {
    pub fn source(&self) -> Option<&SankeyNode> {
        self.nodes.iter().find(|n| n.is_source())
    }

    pub fn targets(&self) -> impl Iterator<Item = &SankeyNode> {
        self.nodes.iter().filter(|n| !n.is_source())
    }

    pub fn total_value(&self) -> f64 {
        self.source().map(|n| n.value).unwrap_or(0.0)
    }
}

/// A flow node with computed geometry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SankeyLayoutNode {
    #[serde(flatten)]
    pub node: SankeyNode,
    pub index: usize,
    /// Column, 0 for the source and 1 for targets.
    pub depth: usize,
    pub x0: f64,
    pub x1: f64,
    pub y0: f64,
    pub y1: f64,
}

impl SankeyLayoutNode {
    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }
}

/// A flow link with computed geometry. `y0`/`y1` are the centre lines at the
/// source and target ends.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SankeyLayoutLink {
    pub index: usize,
    pub source: usize,
    pub target: usize,
    pub value: f64,
    pub width: f64,
    pub y0: f64,
    pub y1: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SankeyLayout {
    pub width: f64,
    pub height: f64,
    pub nodes: Vec<SankeyLayoutNode>,
    pub links: Vec<SankeyLayoutLink>,
}

impl SankeyLayout {
    pub fn source(&self) -> Option<&SankeyLayoutNode> {
        self.nodes.iter().find(|n| n.node.is_source())
    }

    pub fn total_value(&self) -> f64 {
        self.source().map(|n| n.node.value).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TooltipKind {
    Node,
    Link,
}

/// Tooltip payload for a hovered or focused node or link.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TooltipData {
    #[serde(rename = "type")]
    pub kind: TooltipKind,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,
    pub value: f64,
    pub percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overpricing_rate: Option<f64>,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeLegendItem {
    pub letter: String,
    pub name: String,
    pub value: f64,
    pub percentage: f64,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct LegendRow {
    #[serde(rename = "Letter")]
    #[tabled(rename = "")]
    pub letter: String,
    #[serde(rename = "Name")]
    #[tabled(rename = "Nombre")]
    pub name: String,
    #[serde(rename = "Amount")]
    #[tabled(rename = "Monto")]
    pub amount: String,
    #[serde(rename = "Share")]
    #[tabled(rename = "%")]
    pub share: String,
    #[serde(rename = "Overpricing")]
    #[tabled(rename = "Sobreprecio")]
    pub overpricing: String,
}
