//! Explorer configuration loaded from TOML.
//!
//! Every field has a default, so a missing file or section still yields a
//! usable configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::layout::LayoutConfig;
use crate::scale::{Oklch, Palette, HIGH, LOW, NEUTRAL};
use crate::types::TreemapNodeType;

pub const DEFAULT_CONFIG_FILE: &str = "sobreprecio.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    pub data: DataSettings,
    pub layout: LayoutSettings,
    pub colors: ColorSettings,
}

/// Input files and labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub purchases: PathBuf,
    pub hierarchy: PathBuf,
    pub output_dir: PathBuf,
    /// Root label at country level.
    pub country: String,
    /// Top tree level, `category` or `segment`.
    pub top_level: TreemapNodeType,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            purchases: PathBuf::from("data/purchases.csv"),
            hierarchy: PathBuf::from("data/hierarchy.csv"),
            output_dir: PathBuf::from("output"),
            country: "Chile".to_string(),
            top_level: TreemapNodeType::Segment,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSettings {
    #[serde(flatten)]
    pub geometry: LayoutConfig,
    pub width: f64,
    pub height: f64,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            geometry: LayoutConfig::default(),
            width: 960.0,
            height: 540.0,
        }
    }
}

/// Scale endpoints as `oklch(l c h)` strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorSettings {
    pub low: String,
    pub high: String,
    pub neutral: String,
}

impl Default for ColorSettings {
    fn default() -> Self {
        Self {
            low: LOW.to_string(),
            high: HIGH.to_string(),
            neutral: NEUTRAL.to_string(),
        }
    }
}

impl ColorSettings {
    pub fn palette(&self) -> Result<Palette> {
        Ok(Palette {
            low: self.low.parse::<Oklch>()?,
            high: self.high.parse::<Oklch>()?,
            neutral: self.neutral.parse::<Oklch>()?,
        })
    }
}

impl ExplorerConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: ExplorerConfig = toml::from_str(content)?;
        config.colors.palette()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Load `path` if given, else `sobreprecio.toml` when it exists, else
    /// defaults. An explicit path that cannot be read is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            info!(path = %path.display(), "loading configuration");
            return Self::from_file(path);
        }
        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            info!(path = DEFAULT_CONFIG_FILE, "loading configuration");
            return Self::from_file(default_path);
        }
        Ok(Self::default())
    }
}
