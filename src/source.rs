//! Data sources that feed the navigation with hierarchies.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::aggregate::{aggregate, HierarchyIndex};
use crate::error::FetchError;
use crate::geo::{municipality_key, region_name, GeoScope, MunicipalityRef, RegionRef};
use crate::types::{PurchaseRecord, TreemapHierarchy, TreemapNodeType};

/// External collaborator that produces hierarchies for a geographic scope.
///
/// Implementations may hit the network or storage; their failures are the
/// only errors the navigation surfaces to its caller.
#[async_trait]
pub trait HierarchySource: Send + Sync {
    /// Top level of the tree for `scope`.
    async fn root(&self, scope: &GeoScope) -> Result<TreemapHierarchy, FetchError>;

    /// Children of the node reached by following `path` (node ids from the
    /// root) in the tree for `scope`, as a hierarchy rooted at that node.
    async fn children(&self, scope: &GeoScope, path: &[String]) -> Result<TreemapHierarchy, FetchError>;
}

/// Source backed by loaded purchases and the commodity index.
///
/// Each scope is aggregated once, on first request, and handed out one level
/// at a time, so deeper levels always go through `children`. Clones share the
/// aggregated trees.
#[derive(Debug, Clone)]
pub struct PurchaseSource {
    purchases: Arc<Vec<PurchaseRecord>>,
    index: Arc<HierarchyIndex>,
    country: String,
    top: TreemapNodeType,
    trees: Arc<Mutex<HashMap<String, Arc<TreemapHierarchy>>>>,
}

impl PurchaseSource {
    pub fn new(
        purchases: Vec<PurchaseRecord>,
        index: HierarchyIndex,
        country: impl Into<String>,
        top: TreemapNodeType,
    ) -> Self {
        Self {
            purchases: Arc::new(purchases),
            index: Arc::new(index),
            country: country.into(),
            top,
            trees: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn purchases(&self) -> &[PurchaseRecord] {
        &self.purchases
    }

    /// Regions with at least one purchase, by code.
    pub fn regions(&self) -> Vec<RegionRef> {
        let codes: BTreeSet<u32> = self.purchases.iter().map(|p| p.region_code).collect();
        codes
            .into_iter()
            .filter_map(|code| {
                region_name(code).map(|name| RegionRef {
                    code,
                    name: name.to_string(),
                })
            })
            .collect()
    }

    /// Buying municipalities of a region, by name. Codes are
    /// `region * 1000 + rank` within that order.
    pub fn municipalities(&self, region_code: u32) -> Vec<MunicipalityRef> {
        let mut by_key: BTreeMap<String, &str> = BTreeMap::new();
        for p in self.purchases.iter().filter(|p| p.region_code == region_code) {
            by_key.entry(municipality_key(&p.institution)).or_insert(&p.institution);
        }
        by_key
            .into_values()
            .enumerate()
            .map(|(rank, name)| MunicipalityRef {
                code: region_code * 1000 + rank as u32 + 1,
                region_code,
                name: name.to_string(),
            })
            .collect()
    }

    /// Full aggregated tree for `scope`, aggregated on first use.
    pub fn tree(&self, scope: &GeoScope) -> Arc<TreemapHierarchy> {
        let key = scope.key();
        let mut trees = self.trees.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(tree) = trees.get(&key) {
            return Arc::clone(tree);
        }
        let scoped = self.purchases.iter().filter(|p| scope.contains(p));
        let (tree, report) = aggregate(scope.label(&self.country), scoped, self.index.as_ref(), self.top);
        debug!(scope = %key, aggregated = report.aggregated, "scope aggregated");
        let tree = Arc::new(tree);
        trees.insert(key, Arc::clone(&tree));
        tree
    }

    /// Number of scopes aggregated so far.
    pub fn aggregated_scopes(&self) -> usize {
        self.trees.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }
}

#[async_trait]
impl HierarchySource for PurchaseSource {
    async fn root(&self, scope: &GeoScope) -> Result<TreemapHierarchy, FetchError> {
        Ok(self.tree(scope).truncated(1))
    }

    async fn children(&self, scope: &GeoScope, path: &[String]) -> Result<TreemapHierarchy, FetchError> {
        let tree = self.tree(scope);
        tree.find_path(path)
            .map(|node| node.as_hierarchy().truncated(1))
            .ok_or_else(|| FetchError::NotFound {
                scope: scope.key(),
                path: path.to_vec(),
            })
    }
}
