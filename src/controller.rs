//! Navigation controller: drives a [`NavigationState`] and a [`MapViewState`]
//! against a [`HierarchySource`].
//!
//! Every fetch is handed back to the caller as a [`PendingFetch`] future so the
//! caller owns scheduling (UI event loop, tokio, a blocking executor). When a
//! fetch completes, its [`FetchResponse`] goes back through
//! [`NavigationController::deliver`], which applies it only if it is still the
//! latest request of its kind. Superseded responses never touch the state or
//! the cache.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::geo::{GeoScope, MapViewState, MunicipalityRef, RegionRef};
use crate::navigation::{DrillOutcome, NavigationState, RequestToken};
use crate::source::HierarchySource;
use crate::types::{TreemapHierarchy, TreemapNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// Children of a node, for a drill-down.
    Drill,
    /// Root of a new geographic scope.
    Root,
}

/// A fetch in flight. Await [`PendingFetch::wait`] and hand the response to
/// [`NavigationController::deliver`].
pub struct PendingFetch {
    token: RequestToken,
    kind: FetchKind,
    future: BoxFuture<'static, Result<TreemapHierarchy, FetchError>>,
}

impl PendingFetch {
    pub fn token(&self) -> RequestToken {
        self.token
    }

    pub fn kind(&self) -> FetchKind {
        self.kind
    }

    pub async fn wait(self) -> FetchResponse {
        FetchResponse {
            token: self.token,
            kind: self.kind,
            result: self.future.await,
        }
    }
}

impl std::fmt::Debug for PendingFetch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingFetch")
            .field("token", &self.token)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub token: RequestToken,
    pub kind: FetchKind,
    pub result: Result<TreemapHierarchy, FetchError>,
}

/// Result of asking for a drill-down.
#[derive(Debug)]
pub enum DrillStart {
    /// Resolved synchronously from loaded children or the cache.
    Ready(DrillOutcome),
    /// Needs the source; deliver the response when it arrives.
    Pending(PendingFetch),
}

struct PendingRoot {
    token: RequestToken,
    view: MapViewState,
}

pub struct NavigationController<S> {
    source: Arc<S>,
    view: MapViewState,
    state: NavigationState,
    cache: HashMap<(String, Vec<String>), TreemapHierarchy>,
    root_seq: u64,
    pending_root: Option<PendingRoot>,
}

impl<S: HierarchySource + 'static> NavigationController<S> {
    /// Controller at country level over an already loaded root.
    pub fn new(source: Arc<S>, root: TreemapHierarchy) -> Self {
        Self {
            source,
            view: MapViewState::new(),
            state: NavigationState::new(root),
            cache: HashMap::new(),
            root_seq: 0,
            pending_root: None,
        }
    }

    /// Fetch the country root and build a controller over it.
    pub async fn open(source: Arc<S>) -> Result<Self, FetchError> {
        let root = source.root(&GeoScope::Country).await?;
        Ok(Self::new(source, root))
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    pub fn view(&self) -> &MapViewState {
        &self.view
    }

    pub fn scope(&self) -> GeoScope {
        self.view.scope()
    }

    /// A scope change or drill-down is waiting on the source.
    pub fn is_loading(&self) -> bool {
        self.pending_root.is_some() || self.state.is_loading()
    }

    pub fn cached_levels(&self) -> usize {
        self.cache.len()
    }

    /// Start drilling into `node`.
    ///
    /// Nodes with loaded children and previously fetched levels resolve at
    /// once; everything else returns a fetch to drive. Drilling is refused
    /// while a scope change is loading.
    pub fn request_drill_down(&mut self, node: &TreemapNode) -> DrillStart {
        if self.pending_root.is_some() || self.state.is_closed() {
            return DrillStart::Ready(DrillOutcome::Rejected);
        }
        if !node.children.is_empty() {
            return DrillStart::Ready(self.state.drill_down_local(node));
        }
        let Some(token) = self.state.begin_drill_down(node) else {
            return DrillStart::Ready(DrillOutcome::Rejected);
        };
        let scope = self.scope();
        let path = match self.state.pending() {
            Some(p) => p.path.clone(),
            None => return DrillStart::Ready(DrillOutcome::Rejected),
        };
        if let Some(cached) = self.cache.get(&(scope.key(), path.clone())) {
            debug!(node = %node.id, "drill-down served from cache");
            let cached = cached.clone();
            return DrillStart::Ready(self.state.resolve(token, Ok(cached)));
        }

        let source = Arc::clone(&self.source);
        let future: BoxFuture<'static, _> =
            Box::pin(async move { source.children(&scope, &path).await });
        DrillStart::Pending(PendingFetch {
            token,
            kind: FetchKind::Drill,
            future,
        })
    }

    /// Apply a completed fetch. Responses that are no longer the latest of
    /// their kind are discarded without side effects.
    pub fn deliver(&mut self, response: FetchResponse) -> DrillOutcome {
        if self.state.is_closed() {
            return DrillOutcome::Closed;
        }
        match response.kind {
            FetchKind::Drill => self.deliver_drill(response.token, response.result),
            FetchKind::Root => self.deliver_root(response.token, response.result),
        }
    }

    fn deliver_drill(
        &mut self,
        token: RequestToken,
        result: Result<TreemapHierarchy, FetchError>,
    ) -> DrillOutcome {
        let key = self
            .state
            .pending()
            .filter(|p| p.token == token)
            .map(|p| (self.view.scope().key(), p.path.clone()));
        let outcome = self.state.resolve(token, result);
        match (&outcome, key) {
            (DrillOutcome::Applied, Some(key)) => {
                self.cache.insert(key, self.state.data().clone());
            }
            (DrillOutcome::Failed(err), _) => warn!(%err, "drill-down fetch failed"),
            _ => {}
        }
        outcome
    }

    fn deliver_root(
        &mut self,
        token: RequestToken,
        result: Result<TreemapHierarchy, FetchError>,
    ) -> DrillOutcome {
        let is_current = self.pending_root.as_ref().is_some_and(|p| p.token == token);
        if !is_current {
            debug!(token = token.value(), "stale scope response discarded");
            return DrillOutcome::Stale;
        }
        let Some(pending) = self.pending_root.take() else {
            return DrillOutcome::Stale;
        };
        match result {
            Ok(root) => {
                self.view = pending.view;
                self.state.reset(root);
                DrillOutcome::Applied
            }
            Err(err) => {
                warn!(%err, "scope fetch failed");
                DrillOutcome::Failed(err)
            }
        }
    }

    /// Drill into `node`, awaiting the source if needed.
    pub async fn drill_down(&mut self, node: &TreemapNode) -> DrillOutcome {
        match self.request_drill_down(node) {
            DrillStart::Ready(outcome) => outcome,
            DrillStart::Pending(fetch) => {
                let response = fetch.wait().await;
                self.deliver(response)
            }
        }
    }

    pub fn breadcrumb_click(&mut self, index: usize) -> bool {
        self.state.breadcrumb_click(index)
    }

    /// Replace the root directly (the caller already has the new hierarchy).
    pub fn reset(&mut self, root: TreemapHierarchy) {
        self.pending_root = None;
        self.state.reset(root);
    }

    /// View the next scope change starts from: the one loading, else the
    /// one displayed.
    fn target_view(&self) -> MapViewState {
        match &self.pending_root {
            Some(pending) => pending.view.clone(),
            None => self.view.clone(),
        }
    }

    pub fn select_region(&mut self, region: RegionRef) -> Option<PendingFetch> {
        let mut view = self.target_view();
        view.select_region(region);
        self.request_root(view)
    }

    /// `None` when the municipality is not in the selected region.
    pub fn select_municipality(&mut self, municipality: MunicipalityRef) -> Option<PendingFetch> {
        let mut view = self.target_view();
        if !view.select_municipality(municipality) {
            return None;
        }
        self.request_root(view)
    }

    pub fn back(&mut self) -> Option<PendingFetch> {
        let mut view = self.target_view();
        view.back();
        self.request_root(view)
    }

    pub fn back_to_country(&mut self) -> Option<PendingFetch> {
        self.request_root(MapViewState::new())
    }

    /// Request the root for `view`, superseding any scope change or
    /// drill-down in flight. `None` after teardown.
    fn request_root(&mut self, view: MapViewState) -> Option<PendingFetch> {
        if self.state.is_closed() {
            return None;
        }
        self.state.cancel_pending();
        self.root_seq += 1;
        let token = RequestToken::new(self.root_seq);
        let scope = view.scope();
        self.pending_root = Some(PendingRoot { token, view });

        let source = Arc::clone(&self.source);
        let future: BoxFuture<'static, _> = Box::pin(async move { source.root(&scope).await });
        Some(PendingFetch {
            token,
            kind: FetchKind::Root,
            future,
        })
    }

    /// The owning view is gone; late responses become no-ops.
    pub fn teardown(&mut self) {
        self.pending_root = None;
        self.state.teardown();
    }
}
