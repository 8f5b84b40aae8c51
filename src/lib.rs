//! Drill-down exploration of municipal procurement spend and overpricing.
//!
//! Purchases are aggregated into a category tree (`aggregate`), navigated
//! level by level (`navigation`, `controller`), and each level is flattened
//! into a two-column flow diagram (`sankey`) with geometry (`layout`), colors
//! (`scale`) and pointer handling (`interaction`).

pub mod aggregate;
pub mod config;
pub mod controller;
pub mod error;
pub mod geo;
pub mod interaction;
pub mod layout;
pub mod loader;
pub mod navigation;
pub mod output;
pub mod sankey;
pub mod scale;
pub mod source;
pub mod types;
pub mod util;

pub use aggregate::{aggregate, HierarchyIndex, HierarchyLookup};
pub use controller::{DrillStart, FetchResponse, NavigationController, PendingFetch};
pub use error::{ExplorerError, FetchError, Result};
pub use geo::{GeoScope, MapViewState, MunicipalityRef, RegionRef};
pub use interaction::{hit_test, tooltip_for, HitTarget};
pub use layout::{layout, LayoutConfig};
pub use navigation::{reduce, DrillOutcome, NavAction, NavigationState, RequestToken};
pub use sankey::{percentage_of, to_sankey};
pub use scale::{ColorScale, Oklch, Palette};
pub use source::{HierarchySource, PurchaseSource};
pub use types::{
    SankeyData, SankeyLayout, TooltipData, TreemapHierarchy, TreemapNode, TreemapNodeType,
};
