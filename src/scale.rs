//! Value-to-color mapping for flow nodes and links.

use std::fmt;
use std::str::FromStr;

use crate::error::ExplorerError;
use crate::types::{SankeyData, SankeyNode};

/// A color in the OKLCH space, optionally translucent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Oklch {
    pub l: f64,
    pub c: f64,
    pub h: f64,
    pub alpha: Option<f64>,
}

impl Oklch {
    pub const fn new(l: f64, c: f64, h: f64) -> Self {
        Self { l, c, h, alpha: None }
    }

    pub fn with_alpha(self, alpha: f64) -> Self {
        Self {
            alpha: Some(alpha.clamp(0.0, 1.0)),
            ..self
        }
    }

    /// Component-wise linear blend; `t` is clamped to `[0, 1]`.
    pub fn lerp(self, other: Self, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: f64, b: f64| a + (b - a) * t;
        let alpha = match (self.alpha, other.alpha) {
            (None, None) => None,
            (a, b) => Some(mix(a.unwrap_or(1.0), b.unwrap_or(1.0))),
        };
        Self {
            l: mix(self.l, other.l),
            c: mix(self.c, other.c),
            h: mix(self.h, other.h),
            alpha,
        }
    }
}

fn component(v: f64) -> String {
    let s = format!("{v:.4}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

impl fmt::Display for Oklch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "oklch({} {} {}", component(self.l), component(self.c), component(self.h))?;
        if let Some(alpha) = self.alpha {
            write!(f, " / {}", component(alpha))?;
        }
        f.write_str(")")
    }
}

impl FromStr for Oklch {
    type Err = ExplorerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ExplorerError::InvalidColor(s.to_string());
        let body = s
            .trim()
            .strip_prefix("oklch(")
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(invalid)?;
        let (channels, alpha) = match body.split_once('/') {
            Some((channels, alpha)) => (channels, Some(alpha.trim())),
            None => (body, None),
        };
        let parts: Vec<f64> = channels
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<_, _>>()
            .map_err(|_| invalid())?;
        let [l, c, h] = parts[..] else {
            return Err(invalid());
        };
        let alpha = alpha.map(str::parse::<f64>).transpose().map_err(|_| invalid())?;
        if ![l, c, h].iter().chain(alpha.iter()).all(|v| v.is_finite()) {
            return Err(invalid());
        }
        Ok(Self { l, c, h, alpha })
    }
}

pub const LOW: Oklch = Oklch::new(0.652, 0.236, 320.67);
pub const HIGH: Oklch = Oklch::new(0.652, 0.236, 150.67);
pub const NEUTRAL: Oklch = Oklch::new(0.5869, 0.0025, 345.21);

/// Link strokes are drawn at this opacity over the target's color.
pub const LINK_ALPHA: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub low: Oklch,
    pub high: Oklch,
    /// Fill for the synthetic source.
    pub neutral: Oklch,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            low: LOW,
            high: HIGH,
            neutral: NEUTRAL,
        }
    }
}

/// Continuous scale from a value domain onto the palette's two endpoints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorScale {
    pub domain: (f64, f64),
    pub palette: Palette,
}

impl ColorScale {
    pub fn new(domain: (f64, f64), palette: Palette) -> Self {
        Self { domain, palette }
    }

    /// Scale over `[0, max target value]`, or `[0, 1]` when every target is 0.
    pub fn for_data(data: &SankeyData, palette: Palette) -> Self {
        Self::new(value_domain(data), palette)
    }

    /// Interpolated color for `value`, clamped to the domain. A domain of zero
    /// width maps everything to the low endpoint.
    pub fn color_for(&self, value: f64) -> Oklch {
        let (min, max) = self.domain;
        let span = max - min;
        if !(span > 0.0) || !value.is_finite() {
            return self.palette.low;
        }
        let t = ((value - min) / span).clamp(0.0, 1.0);
        self.palette.low.lerp(self.palette.high, t)
    }

    pub fn node_fill(&self, node: &SankeyNode) -> Oklch {
        if node.is_source() {
            self.palette.neutral
        } else {
            self.color_for(node.value)
        }
    }

    /// Stroke for a link into `target`.
    pub fn link_stroke(&self, target: &SankeyNode) -> Oklch {
        self.node_fill(target).with_alpha(LINK_ALPHA)
    }
}

pub fn value_domain(data: &SankeyData) -> (f64, f64) {
    let max = data.targets().map(|n| n.value).fold(0.0_f64, f64::max);
    if max > 0.0 {
        (0.0, max)
    } else {
        (0.0, 1.0)
    }
}
