//! Pointer and keyboard contract over a computed layout.
//!
//! Everything here is synchronous and renderer-agnostic: a surface reports a
//! pointer position, gets back what is under it, and asks for the tooltip or
//! the node to drill into.

use crate::layout::link_span;
use crate::sankey::percentage_of;
use crate::types::{SankeyLayout, SankeyLayoutNode, TooltipData, TooltipKind, TreemapHierarchy, TreemapNode};
use crate::util::format_clp;

/// Tooltips sit this far above the hovered node.
const TOOLTIP_OFFSET: f64 = 10.0;
/// Links are never drawn thinner than this.
const MIN_LINK_STROKE: f64 = 1.0;
/// Nodes shorter than this get no text label.
pub const MIN_LABEL_HEIGHT: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTarget {
    /// Index into `SankeyLayout::nodes`.
    Node(usize),
    /// Index into `SankeyLayout::links`.
    Link(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelSide {
    Left,
    Right,
}

/// What lies under `(x, y)`. Nodes win over links; among links the one drawn
/// last wins.
pub fn hit_test(layout: &SankeyLayout, x: f64, y: f64) -> Option<HitTarget> {
    if let Some(node) = layout.nodes.iter().rev().find(|n| n.contains(x, y)) {
        return Some(HitTarget::Node(node.index));
    }
    layout
        .links
        .iter()
        .rev()
        .find(|link| {
            let Some((sx, tx)) = link_span(layout, link) else {
                return false;
            };
            if tx <= sx || x < sx || x > tx {
                return false;
            }
            let t = solve_t((x - sx) / (tx - sx));
            let s = t * t * (3.0 - 2.0 * t);
            let centre = link.y0 + (link.y1 - link.y0) * s;
            (y - centre).abs() <= link.width.max(MIN_LINK_STROKE) / 2.0
        })
        .map(|link| HitTarget::Link(link.index))
}

/// Parameter `t` at which the horizontal link curve reaches fraction `u` of
/// its span. The curve's x progress `1.5t - 1.5t² + t³` is monotonic.
fn solve_t(u: f64) -> f64 {
    let (mut lo, mut hi) = (0.0_f64, 1.0_f64);
    for _ in 0..40 {
        let mid = (lo + hi) / 2.0;
        let progress = mid * (1.5 - 1.5 * mid + mid * mid);
        if progress < u {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    (lo + hi) / 2.0
}

pub fn tooltip_for(layout: &SankeyLayout, target: HitTarget) -> Option<TooltipData> {
    let total = layout.total_value();
    match target {
        HitTarget::Node(i) => {
            let n = layout.nodes.get(i)?;
            Some(TooltipData {
                kind: TooltipKind::Node,
                name: n.node.name.clone(),
                source_name: None,
                target_name: None,
                value: n.node.value,
                percentage: percentage_of(n.node.value, total),
                overpricing_rate: n.node.overpricing_rate,
                x: (n.x0 + n.x1) / 2.0,
                y: n.y0 - TOOLTIP_OFFSET,
            })
        }
        HitTarget::Link(i) => {
            let link = layout.links.get(i)?;
            let source = layout.nodes.get(link.source)?;
            let target = layout.nodes.get(link.target)?;
            Some(TooltipData {
                kind: TooltipKind::Link,
                name: format!("{} → {}", source.node.name, target.node.name),
                source_name: Some(source.node.name.clone()),
                target_name: Some(target.node.name.clone()),
                value: link.value,
                percentage: percentage_of(link.value, total),
                overpricing_rate: target.node.overpricing_rate,
                x: (source.x1 + target.x0) / 2.0,
                y: (link.y0 + link.y1) / 2.0,
            })
        }
    }
}

/// Screen-reader label for a node, e.g.
/// `Equipos, $1.234, 30.0% del total, sobreprecio 12.5%.`
pub fn node_aria_label(node: &SankeyLayoutNode, total: f64) -> String {
    let n = &node.node;
    let mut label = format!(
        "{}, {}, {:.1}% del total",
        n.name,
        format_clp(n.value),
        percentage_of(n.value, total)
    );
    if let Some(rate) = n.overpricing_rate {
        label.push_str(&format!(", sobreprecio {:.1}%", rate * 100.0));
    }
    label.push('.');
    if n.is_clickable {
        label.push_str(" Presiona Enter para ver más detalles.");
    }
    label
}

/// Live-region text read out when a tooltip opens.
pub fn tooltip_announcement(tip: &TooltipData) -> String {
    let subject = match (tip.kind, &tip.source_name, &tip.target_name) {
        (TooltipKind::Link, Some(source), Some(target)) => format!("{source} a {target}"),
        _ => tip.name.clone(),
    };
    let mut text = format!(
        "{}: {}, {:.1}% del total",
        subject,
        format_clp(tip.value),
        tip.percentage
    );
    if let Some(rate) = tip.overpricing_rate {
        text.push_str(&format!(", sobreprecio {:.1}%", rate * 100.0));
    }
    text
}

/// Side of `node` its label goes on, or `None` when the node is too short.
pub fn label_side(node: &SankeyLayoutNode, width: f64) -> Option<LabelSide> {
    if node.height() < MIN_LABEL_HEIGHT {
        return None;
    }
    Some(if node.x0 < width / 2.0 {
        LabelSide::Right
    } else {
        LabelSide::Left
    })
}

/// Tree node to drill into when `target` is activated, if it is a clickable
/// node of `data`'s current level.
pub fn drill_target<'a>(
    data: &'a TreemapHierarchy,
    layout: &SankeyLayout,
    target: HitTarget,
) -> Option<&'a TreemapNode> {
    let HitTarget::Node(i) = target else {
        return None;
    };
    let node = &layout.nodes.get(i)?.node;
    if !node.is_clickable {
        return None;
    }
    data.child(node.original_id.as_deref()?)
        .filter(|child| node.node_type.treemap_type() == Some(child.node_type))
}
