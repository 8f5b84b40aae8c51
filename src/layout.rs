//! Geometry for the two-column flow diagram.
//!
//! The source sits flush left and the targets flush right. Node heights and
//! link widths share one vertical scale, so the links leaving the source
//! exactly tile its height.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{SankeyData, SankeyLayout, SankeyLayoutLink, SankeyLayoutNode};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Horizontal thickness of every node, independent of value.
    pub node_width: f64,
    /// Vertical gap between siblings in one column.
    pub node_padding: f64,
    pub margin_x: f64,
    pub margin_y: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: 18.0,
            node_padding: 12.0,
            margin_x: 1.0,
            margin_y: 10.0,
        }
    }
}

/// Lay out `data` in a `width` × `height` box.
///
/// Returns `None` while `width` is not positive; the caller retries once the
/// surface has been measured. Links whose endpoints are not in `data` are
/// skipped.
pub fn layout(data: &SankeyData, width: f64, height: f64, config: &LayoutConfig) -> Option<SankeyLayout> {
    if width <= 0.0 || !width.is_finite() {
        debug!(width, "layout deferred until the surface has a width");
        return None;
    }

    let left = config.margin_x;
    let right = (width - config.margin_x).max(left + config.node_width);
    let top = config.margin_y;
    let bottom = (height - config.margin_y).max(top);
    let extent = bottom - top;

    let (sources, targets): (Vec<usize>, Vec<usize>) =
        (0..data.nodes.len()).partition(|&i| data.nodes[i].is_source());
    let columns = [sources, targets];

    let max_column = columns.iter().map(Vec::len).max().unwrap_or(0);
    let padding = if max_column > 1 {
        config.node_padding.min(extent / (max_column - 1) as f64)
    } else {
        config.node_padding
    };

    let ky = columns
        .iter()
        .filter(|column| !column.is_empty())
        .map(|column| {
            let total: f64 = column.iter().map(|&i| data.nodes[i].value.max(0.0)).sum();
            if total > 0.0 {
                (extent - (column.len() - 1) as f64 * padding) / total
            } else {
                0.0
            }
        })
        .fold(f64::INFINITY, f64::min);
    let ky = if ky.is_finite() { ky.max(0.0) } else { 0.0 };

    let mut nodes: Vec<SankeyLayoutNode> = data
        .nodes
        .iter()
        .enumerate()
        .map(|(index, node)| {
            let depth = usize::from(!node.is_source());
            let (x0, x1) = if depth == 0 {
                (left, left + config.node_width)
            } else {
                (right - config.node_width, right)
            };
            SankeyLayoutNode {
                node: node.clone(),
                index,
                depth,
                x0,
                x1,
                y0: 0.0,
                y1: 0.0,
            }
        })
        .collect();

    for column in &columns {
        let mut y = top;
        for &i in column {
            let n = &mut nodes[i];
            n.y0 = y;
            n.y1 = y + n.node.value.max(0.0) * ky;
            y = n.y1 + padding;
        }
        // Spread the leftover space evenly around the column's nodes.
        let gap = (bottom - y + padding) / (column.len() + 1) as f64;
        for (k, &i) in column.iter().enumerate() {
            let shift = gap * (k + 1) as f64;
            nodes[i].y0 += shift;
            nodes[i].y1 += shift;
        }
    }

    let links = layout_links(data, &nodes, ky);
    Some(SankeyLayout {
        width,
        height,
        nodes,
        links,
    })
}

fn layout_links(data: &SankeyData, nodes: &[SankeyLayoutNode], ky: f64) -> Vec<SankeyLayoutLink> {
    let by_id: HashMap<&str, usize> = data.nodes.iter().enumerate().map(|(i, n)| (n.id.as_str(), i)).collect();

    let mut links: Vec<SankeyLayoutLink> = data
        .links
        .iter()
        .filter_map(|link| {
            let source = *by_id.get(link.source.as_str())?;
            let target = *by_id.get(link.target.as_str())?;
            Some(SankeyLayoutLink {
                index: 0,
                source,
                target,
                value: link.value,
                width: link.value.max(0.0) * ky,
                y0: 0.0,
                y1: 0.0,
            })
        })
        .collect();
    for (index, link) in links.iter_mut().enumerate() {
        link.index = index;
    }

    // Stack at both ends in the vertical order of the opposite end so links
    // never cross; equal positions fall back to value, then id.
    let mut order: Vec<usize> = (0..links.len()).collect();
    order.sort_by(|&a, &b| {
        let (la, lb) = (&links[a], &links[b]);
        nodes[la.target]
            .y0
            .partial_cmp(&nodes[lb.target].y0)
            .unwrap_or(Ordering::Equal)
            .then(la.value.partial_cmp(&lb.value).unwrap_or(Ordering::Equal))
            .then_with(|| nodes[la.target].node.id.cmp(&nodes[lb.target].node.id))
    });
    let mut out_offset: HashMap<usize, f64> = HashMap::new();
    for &i in &order {
        let link = &mut links[i];
        let y = out_offset.entry(link.source).or_insert(nodes[link.source].y0);
        link.y0 = *y + link.width / 2.0;
        *y += link.width;
    }

    order.sort_by(|&a, &b| {
        let (la, lb) = (&links[a], &links[b]);
        nodes[la.source]
            .y0
            .partial_cmp(&nodes[lb.source].y0)
            .unwrap_or(Ordering::Equal)
            .then(la.value.partial_cmp(&lb.value).unwrap_or(Ordering::Equal))
            .then(la.index.cmp(&lb.index))
    });
    let mut in_offset: HashMap<usize, f64> = HashMap::new();
    for &i in &order {
        let link = &mut links[i];
        let y = in_offset.entry(link.target).or_insert(nodes[link.target].y0);
        link.y1 = *y + link.width / 2.0;
        *y += link.width;
    }

    links
}

/// Horizontal cubic path for `link`, as an SVG path string.
pub fn link_path(layout: &SankeyLayout, link: &SankeyLayoutLink) -> Option<String> {
    let (sx, tx) = link_span(layout, link)?;
    let mx = (sx + tx) / 2.0;
    Some(format!(
        "M{sx},{y0}C{mx},{y0},{mx},{y1},{tx},{y1}",
        y0 = link.y0,
        y1 = link.y1
    ))
}

/// Horizontal extent of `link`: the source's right edge and the target's
/// left edge.
pub fn link_span(layout: &SankeyLayout, link: &SankeyLayoutLink) -> Option<(f64, f64)> {
    let source = layout.nodes.get(link.source)?;
    let target = layout.nodes.get(link.target)?;
    Some((source.x1, target.x0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sankey::to_sankey;
    use crate::types::{TreemapHierarchy, TreemapNode, TreemapNodeType};
    use approx::assert_relative_eq;

    fn hierarchy(values: &[f64]) -> TreemapHierarchy {
        let children = values
            .iter()
            .enumerate()
            .map(|(i, &value)| TreemapNode {
                id: format!("s{i}"),
                name: format!("segment {i}"),
                value,
                overpricing_rate: 0.0,
                node_type: TreemapNodeType::Segment,
                children: vec![],
            })
            .collect();
        TreemapHierarchy::new("Chile", children)
    }

    #[test]
    fn links_tile_the_source() {
        let data = to_sankey(&hierarchy(&[300.0, 700.0, 100.0]));
        let out = layout(&data, 960.0, 540.0, &LayoutConfig::default()).unwrap();
        let source = out.source().unwrap();
        let widths: f64 = out.links.iter().map(|l| l.width).sum();
        assert_relative_eq!(widths, source.height(), epsilon = 1e-9);

        for link in &out.links {
            let target = &out.nodes[link.target];
            assert_relative_eq!(link.width, target.height(), epsilon = 1e-9);
            assert_relative_eq!(link.y1, (target.y0 + target.y1) / 2.0, epsilon = 1e-9);
            assert!(link.y0 - link.width / 2.0 >= source.y0 - 1e-9);
            assert!(link.y0 + link.width / 2.0 <= source.y1 + 1e-9);
        }
    }

    #[test]
    fn columns_are_justified() {
        let data = to_sankey(&hierarchy(&[1.0, 2.0]));
        let cfg = LayoutConfig::default();
        let out = layout(&data, 400.0, 300.0, &cfg).unwrap();
        let source = out.source().unwrap();
        assert_eq!(source.depth, 0);
        assert_eq!(source.x0, 1.0);
        assert_eq!(source.width(), 18.0);
        for target in out.nodes.iter().filter(|n| n.depth == 1) {
            assert_eq!(target.x1, 399.0);
            assert_eq!(target.width(), 18.0);
        }
    }

    #[test]
    fn targets_fill_height_with_padding() {
        let data = to_sankey(&hierarchy(&[1.0, 1.0, 2.0]));
        let out = layout(&data, 400.0, 300.0, &LayoutConfig::default()).unwrap();
        let targets: Vec<_> = out.nodes.iter().filter(|n| n.depth == 1).collect();
        assert_relative_eq!(targets[0].y0, 10.0, epsilon = 1e-9);
        assert_relative_eq!(targets[2].y1, 290.0, epsilon = 1e-9);
        assert_relative_eq!(targets[1].y0 - targets[0].y1, 12.0, epsilon = 1e-9);
        assert_relative_eq!(targets[2].height(), 2.0 * targets[0].height(), epsilon = 1e-9);

        let source = out.source().unwrap();
        assert_relative_eq!((source.y0 + source.y1) / 2.0, 150.0, epsilon = 1e-9);
    }

    #[test]
    fn links_stack_in_target_order() {
        let data = to_sankey(&hierarchy(&[5.0, 1.0, 3.0]));
        let out = layout(&data, 500.0, 400.0, &LayoutConfig::default()).unwrap();
        let y0s: Vec<f64> = out.links.iter().map(|l| l.y0).collect();
        assert!(y0s[0] < y0s[1] && y0s[1] < y0s[2]);
    }

    #[test]
    fn lone_source_does_not_panic() {
        let data = to_sankey(&TreemapHierarchy::empty("Talca"));
        let out = layout(&data, 300.0, 200.0, &LayoutConfig::default()).unwrap();
        assert_eq!(out.nodes.len(), 1);
        assert!(out.links.is_empty());
        let source = out.source().unwrap();
        assert_eq!(source.height(), 0.0);
        assert!(source.y0.is_finite());
    }

    #[test]
    fn all_zero_values_collapse_to_zero_height() {
        let data = to_sankey(&hierarchy(&[0.0, 0.0]));
        let out = layout(&data, 300.0, 200.0, &LayoutConfig::default()).unwrap();
        assert!(out.nodes.iter().all(|n| n.height() == 0.0 && n.y0.is_finite()));
        assert!(out.links.iter().all(|l| l.width == 0.0));
    }

    #[test]
    fn zero_width_defers() {
        let data = to_sankey(&hierarchy(&[1.0]));
        assert!(layout(&data, 0.0, 200.0, &LayoutConfig::default()).is_none());
        assert!(layout(&data, -5.0, 200.0, &LayoutConfig::default()).is_none());
    }

    #[test]
    fn path_is_horizontal_bezier() {
        let data = to_sankey(&hierarchy(&[1.0]));
        let out = layout(&data, 220.0, 120.0, &LayoutConfig::default()).unwrap();
        let path = link_path(&out, &out.links[0]).unwrap();
        assert!(path.starts_with("M19,"));
        assert!(path.contains("C110,"));
        assert!(path.contains(",201,"));
    }
}
