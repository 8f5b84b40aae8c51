//! Drill-down navigation over a category tree.
//!
//! The trail of breadcrumbs is the single source of truth: the displayed
//! hierarchy is always the data of the last breadcrumb, so the trail and the
//! data cannot diverge. Drill-downs are two-phase. `begin_drill_down` issues a
//! [`RequestToken`] and `resolve` applies a response only if its token is the
//! latest one still pending.

use crate::error::FetchError;
use crate::types::{TreemapHierarchy, TreemapNode, TreemapNodeType};
use tracing::debug;

/// Identity of one drill-down request. Tokens increase monotonically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestToken(u64);

impl RequestToken {
    pub(crate) fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

/// One step of the drill-down trail.
#[derive(Debug, Clone, PartialEq)]
pub struct Breadcrumb {
    pub name: String,
    /// Id of the node this step drilled into; `None` for the root.
    pub node_id: Option<String>,
    /// Level of that node; `None` for the root.
    pub level: Option<TreemapNodeType>,
    pub data: TreemapHierarchy,
}

impl Breadcrumb {
    fn root(data: TreemapHierarchy) -> Self {
        Self {
            name: data.name.clone(),
            node_id: None,
            level: None,
            data,
        }
    }

    pub fn level_label(&self) -> &'static str {
        self.level.map(TreemapNodeType::as_str).unwrap_or("root")
    }
}

/// The drill-down currently in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingDrill {
    pub token: RequestToken,
    /// The node being drilled into, without children.
    pub node: TreemapNode,
    /// Ids from the root down to and including `node`.
    pub path: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrillOutcome {
    /// The response became the displayed level.
    Applied,
    /// The request was refused up front: terminal node or closed view.
    Rejected,
    /// The node has nothing to drill into; the state is unchanged.
    NoChildren,
    /// A newer request or a jump-back superseded this response.
    Stale,
    /// The view was torn down before the response arrived.
    Closed,
    /// The data source failed; the state is unchanged.
    Failed(FetchError),
}

/// Transition inputs for [`reduce`].
#[derive(Debug, Clone)]
pub enum NavAction {
    DrillDown(TreemapNode),
    Resolve {
        token: RequestToken,
        result: Result<TreemapHierarchy, FetchError>,
    },
    BreadcrumbClick(usize),
    Reset(TreemapHierarchy),
    Teardown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NavigationState {
    breadcrumbs: Vec<Breadcrumb>,
    next_token: u64,
    pending: Option<PendingDrill>,
    last_error: Option<FetchError>,
    closed: bool,
}

impl NavigationState {
    pub fn new(root: TreemapHierarchy) -> Self {
        Self {
            breadcrumbs: vec![Breadcrumb::root(root)],
            next_token: 0,
            pending: None,
            last_error: None,
            closed: false,
        }
    }

    /// The hierarchy currently displayed.
    pub fn data(&self) -> &TreemapHierarchy {
        &self.current().data
    }

    pub fn breadcrumbs(&self) -> &[Breadcrumb] {
        &self.breadcrumbs
    }

    pub fn current(&self) -> &Breadcrumb {
        // The trail always holds at least the root.
        &self.breadcrumbs[self.breadcrumbs.len() - 1]
    }

    pub fn current_index(&self) -> usize {
        self.breadcrumbs.len() - 1
    }

    /// Level of the nodes currently displayed as children, if any.
    pub fn child_level(&self) -> Option<TreemapNodeType> {
        self.data().children.first().map(|c| c.node_type)
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&PendingDrill> {
        self.pending.as_ref()
    }

    pub fn last_error(&self) -> Option<&FetchError> {
        self.last_error.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Ids of the nodes drilled into, from the root down.
    pub fn path(&self) -> Vec<String> {
        self.breadcrumbs.iter().filter_map(|b| b.node_id.clone()).collect()
    }

    /// Start drilling into `node`, superseding any request still in flight.
    ///
    /// Returns `None` for terminal (class) nodes and after teardown.
    pub fn begin_drill_down(&mut self, node: &TreemapNode) -> Option<RequestToken> {
        if self.closed || node.is_terminal() {
            debug!(node = %node.id, "drill-down refused");
            return None;
        }
        self.next_token += 1;
        let token = RequestToken(self.next_token);
        let mut path = self.path();
        path.push(node.id.clone());
        if let Some(previous) = self.pending.replace(PendingDrill {
            token,
            node: node.shallow(),
            path,
        }) {
            debug!(superseded = previous.token.value(), by = token.value(), "drill-down superseded");
        }
        Some(token)
    }

    /// Apply the response to request `token`.
    pub fn resolve(
        &mut self,
        token: RequestToken,
        result: Result<TreemapHierarchy, FetchError>,
    ) -> DrillOutcome {
        if self.closed {
            return DrillOutcome::Closed;
        }
        let is_current = self.pending.as_ref().is_some_and(|p| p.token == token);
        if !is_current {
            debug!(token = token.value(), "stale drill-down response discarded");
            return DrillOutcome::Stale;
        }
        let Some(pending) = self.pending.take() else {
            return DrillOutcome::Stale;
        };
        match result {
            Err(err) => {
                self.last_error = Some(err.clone());
                DrillOutcome::Failed(err)
            }
            Ok(data) if data.is_empty() => {
                debug!(node = %pending.node.id, "drill-down target has no children");
                DrillOutcome::NoChildren
            }
            Ok(mut data) => {
                if data.name.is_empty() {
                    data.name = pending.node.name.clone();
                }
                self.breadcrumbs.push(Breadcrumb {
                    name: pending.node.name,
                    node_id: Some(pending.node.id),
                    level: Some(pending.node.node_type),
                    data,
                });
                self.last_error = None;
                DrillOutcome::Applied
            }
        }
    }

    /// Drill into a node whose children are already loaded.
    pub fn drill_down_local(&mut self, node: &TreemapNode) -> DrillOutcome {
        match self.begin_drill_down(node) {
            Some(token) => self.resolve(token, Ok(node.as_hierarchy())),
            None => DrillOutcome::Rejected,
        }
    }

    /// Jump back to breadcrumb `index`, discarding deeper levels and any
    /// drill-down in flight. Clicking the current breadcrumb or an index out
    /// of range does nothing. Returns whether the state changed.
    pub fn breadcrumb_click(&mut self, index: usize) -> bool {
        if self.closed || index >= self.current_index() {
            return false;
        }
        self.breadcrumbs.truncate(index + 1);
        self.pending = None;
        self.last_error = None;
        debug!(index, "jumped back to breadcrumb");
        true
    }

    /// Replace the root (new geographic context) and clear the trail.
    pub fn reset(&mut self, root: TreemapHierarchy) {
        if self.closed {
            return;
        }
        self.breadcrumbs = vec![Breadcrumb::root(root)];
        self.pending = None;
        self.last_error = None;
    }

    /// Drop any drill-down in flight without changing the trail.
    pub fn cancel_pending(&mut self) {
        self.pending = None;
    }

    /// The owning view is gone; every later response is a no-op.
    pub fn teardown(&mut self) {
        self.closed = true;
        self.pending = None;
    }
}

/// Pure transition function over [`NavigationState`].
pub fn reduce(mut state: NavigationState, action: NavAction) -> NavigationState {
    match action {
        NavAction::DrillDown(node) => {
            state.begin_drill_down(&node);
        }
        NavAction::Resolve { token, result } => {
            state.resolve(token, result);
        }
        NavAction::BreadcrumbClick(index) => {
            state.breadcrumb_click(index);
        }
        NavAction::Reset(root) => state.reset(root),
        NavAction::Teardown => state.teardown(),
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, node_type: TreemapNodeType, children: Vec<TreemapNode>) -> TreemapNode {
        if children.is_empty() {
            TreemapNode {
                id: id.to_string(),
                name: format!("node {id}"),
                value: 10.0,
                overpricing_rate: 0.0,
                node_type,
                children,
            }
        } else {
            TreemapNode::from_children(id, format!("node {id}"), node_type, children)
        }
    }

    fn tree() -> TreemapHierarchy {
        let class = node("c1", TreemapNodeType::Class, vec![]);
        let family = node("f1", TreemapNodeType::Family, vec![class]);
        let segment = node("s1", TreemapNodeType::Segment, vec![family]);
        let other = node("s2", TreemapNodeType::Segment, vec![]);
        TreemapHierarchy::new("Chile", vec![segment, other])
    }

    #[test]
    fn starts_at_root() {
        let state = NavigationState::new(tree());
        assert_eq!(state.breadcrumbs().len(), 1);
        assert_eq!(state.data().name, "Chile");
        assert_eq!(state.current().level_label(), "root");
        assert!(!state.is_loading());
    }

    #[test]
    fn local_drill_down_pushes_breadcrumb() {
        let mut state = NavigationState::new(tree());
        let segment = state.data().children[0].clone();
        assert_eq!(state.drill_down_local(&segment), DrillOutcome::Applied);
        assert_eq!(state.breadcrumbs().len(), 2);
        assert_eq!(state.data().name, "node s1");
        assert_eq!(state.current().level, Some(TreemapNodeType::Segment));
        assert_eq!(state.path(), vec!["s1".to_string()]);
        assert_eq!(state.child_level(), Some(TreemapNodeType::Family));
    }

    #[test]
    fn terminal_nodes_are_refused() {
        let mut state = NavigationState::new(tree());
        let class = node("c9", TreemapNodeType::Class, vec![]);
        assert_eq!(state.drill_down_local(&class), DrillOutcome::Rejected);
        assert_eq!(state.breadcrumbs().len(), 1);
    }

    #[test]
    fn empty_response_is_a_no_op() {
        let mut state = NavigationState::new(tree());
        let leafless = state.data().children[1].clone();
        assert_eq!(state.drill_down_local(&leafless), DrillOutcome::NoChildren);
        assert_eq!(state.breadcrumbs().len(), 1);
        assert!(!state.is_loading());
    }

    #[test]
    fn later_request_supersedes_earlier_one() {
        let mut state = NavigationState::new(tree());
        let a = state.data().children[0].clone();
        let b = state.data().children[1].clone();
        let token_a = state.begin_drill_down(&a).unwrap();
        let token_b = state.begin_drill_down(&b).unwrap();
        assert!(token_b > token_a);

        let b_children = TreemapHierarchy::new("node s2", vec![node("f9", TreemapNodeType::Family, vec![])]);
        assert_eq!(state.resolve(token_b, Ok(b_children.clone())), DrillOutcome::Applied);
        assert_eq!(state.resolve(token_a, Ok(a.as_hierarchy())), DrillOutcome::Stale);
        assert_eq!(state.data(), &b_children);
        assert_eq!(state.current().node_id.as_deref(), Some("s2"));
    }

    #[test]
    fn failure_keeps_state_and_records_error() {
        let mut state = NavigationState::new(tree());
        let a = state.data().children[0].clone();
        let token = state.begin_drill_down(&a).unwrap();
        let err = FetchError::unavailable("Chile", "offline");
        assert_eq!(state.resolve(token, Err(err.clone())), DrillOutcome::Failed(err.clone()));
        assert_eq!(state.breadcrumbs().len(), 1);
        assert_eq!(state.last_error(), Some(&err));
        assert!(!state.is_loading());
    }

    #[test]
    fn breadcrumb_click_truncates_and_cancels() {
        let mut state = NavigationState::new(tree());
        let segment = state.data().children[0].clone();
        state.drill_down_local(&segment);
        let family = state.data().children[0].clone();
        state.drill_down_local(&family);
        assert_eq!(state.breadcrumbs().len(), 3);

        let class = state.data().children[0].clone();
        assert!(state.begin_drill_down(&class).is_none());
        let pending = state.begin_drill_down(&family).unwrap();

        assert!(state.breadcrumb_click(0));
        assert_eq!(state.breadcrumbs().len(), 1);
        assert_eq!(state.data(), &tree());
        assert_eq!(state.resolve(pending, Ok(family.as_hierarchy())), DrillOutcome::Stale);
    }

    #[test]
    fn breadcrumb_click_on_current_or_out_of_range_is_a_no_op() {
        let mut state = NavigationState::new(tree());
        let segment = state.data().children[0].clone();
        state.drill_down_local(&segment);
        let before = state.clone();
        assert!(!state.breadcrumb_click(state.current_index()));
        assert!(!state.breadcrumb_click(7));
        assert_eq!(state, before);
    }

    #[test]
    fn reset_replaces_root() {
        let mut state = NavigationState::new(tree());
        let segment = state.data().children[0].clone();
        state.drill_down_local(&segment);
        let token = state.begin_drill_down(&segment.children[0]).unwrap();

        let maule = TreemapHierarchy::new("Región del Maule", vec![]);
        state.reset(maule.clone());
        assert_eq!(state.breadcrumbs().len(), 1);
        assert_eq!(state.data(), &maule);
        assert_eq!(state.resolve(token, Ok(tree())), DrillOutcome::Stale);
    }

    #[test]
    fn teardown_makes_late_responses_no_ops() {
        let mut state = NavigationState::new(tree());
        let segment = state.data().children[0].clone();
        let token = state.begin_drill_down(&segment).unwrap();
        state.teardown();
        assert_eq!(state.resolve(token, Ok(segment.as_hierarchy())), DrillOutcome::Closed);
        assert_eq!(state.breadcrumbs().len(), 1);
        assert!(state.begin_drill_down(&segment).is_none());
    }

    #[test]
    fn reducer_replays_actions() {
        let root = tree();
        let segment = root.children[0].clone();
        let state = reduce(NavigationState::new(root), NavAction::DrillDown(segment.clone()));
        let token = state.pending().map(|p| p.token).unwrap();
        assert_eq!(state.pending().unwrap().path, vec!["s1".to_string()]);

        let state = reduce(
            state,
            NavAction::Resolve {
                token,
                result: Ok(segment.as_hierarchy()),
            },
        );
        assert_eq!(state.breadcrumbs().len(), 2);

        let state = reduce(state, NavAction::BreadcrumbClick(0));
        assert_eq!(state.breadcrumbs().len(), 1);

        let state = reduce(state, NavAction::Reset(TreemapHierarchy::empty("Talca")));
        assert_eq!(state.data().name, "Talca");

        let state = reduce(state, NavAction::Teardown);
        assert!(state.is_closed());
    }
}
