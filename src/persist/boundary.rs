//! Persistence-boundary states, lifecycle verbs and notification hooks.

use serde::{Deserialize, Serialize};

use crate::models::NodeId;

/// Activation state of a persistence boundary.
///
/// - `NotActivated`: in-memory only, or stored but not loaded
/// - `Activated`: in-memory state reflects the stored state
/// - `Deleted`: stored state erased; terminal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryState {
    NotActivated,
    Activated,
    Deleted,
}

impl BoundaryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotActivated => "not_activated",
            Self::Activated => "activated",
            Self::Deleted => "deleted",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "not_activated" => Some(Self::NotActivated),
            "activated" => Some(Self::Activated),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleVerb {
    Activate,
    Deactivate,
    Add,
    Update,
    Delete,
    Refresh,
}

impl LifecycleVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Activate => "activate",
            Self::Deactivate => "deactivate",
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Refresh => "refresh",
        }
    }
}

/// Paired before/after hooks fired for every object a lifecycle verb visits,
/// not just the boundary it was invoked on.
///
/// Hooks are side-effect only. All methods default to doing nothing.
pub trait PersistenceNotification {
    fn before_activate(&mut self, _node: NodeId) {}
    fn after_activate(&mut self, _node: NodeId) {}
    fn before_deactivate(&mut self, _node: NodeId) {}
    fn after_deactivate(&mut self, _node: NodeId) {}
    fn before_add(&mut self, _node: NodeId) {}
    fn after_add(&mut self, _node: NodeId) {}
    fn before_update(&mut self, _node: NodeId) {}
    fn after_update(&mut self, _node: NodeId) {}
    fn before_delete(&mut self, _node: NodeId) {}
    fn after_delete(&mut self, _node: NodeId) {}
    fn before_refresh(&mut self, _node: NodeId) {}
    fn after_refresh(&mut self, _node: NodeId) {}
}

pub(crate) fn notify_before(hooks: &mut dyn PersistenceNotification, verb: LifecycleVerb, node: NodeId) {
    match verb {
        LifecycleVerb::Activate => hooks.before_activate(node),
        LifecycleVerb::Deactivate => hooks.before_deactivate(node),
        LifecycleVerb::Add => hooks.before_add(node),
        LifecycleVerb::Update => hooks.before_update(node),
        LifecycleVerb::Delete => hooks.before_delete(node),
        LifecycleVerb::Refresh => hooks.before_refresh(node),
    }
}

pub(crate) fn notify_after(hooks: &mut dyn PersistenceNotification, verb: LifecycleVerb, node: NodeId) {
    match verb {
        LifecycleVerb::Activate => hooks.after_activate(node),
        LifecycleVerb::Deactivate => hooks.after_deactivate(node),
        LifecycleVerb::Add => hooks.after_add(node),
        LifecycleVerb::Update => hooks.after_update(node),
        LifecycleVerb::Delete => hooks.after_delete(node),
        LifecycleVerb::Refresh => hooks.after_refresh(node),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Log(Vec<String>);

    impl PersistenceNotification for Log {
        fn before_update(&mut self, _node: NodeId) {
            self.0.push("before_update".to_string());
        }
        fn after_update(&mut self, _node: NodeId) {
            self.0.push("after_update".to_string());
        }
    }

    #[test]
    fn test_dispatch_routes_by_verb() {
        let mut log = Log::default();
        let id = NodeId::new();
        notify_before(&mut log, LifecycleVerb::Update, id);
        notify_before(&mut log, LifecycleVerb::Add, id);
        notify_after(&mut log, LifecycleVerb::Update, id);
        assert_eq!(log.0, vec!["before_update", "after_update"]);
    }

    #[test]
    fn test_state_strings() {
        for state in [
            BoundaryState::NotActivated,
            BoundaryState::Activated,
            BoundaryState::Deleted,
        ] {
            assert_eq!(BoundaryState::from_str(state.as_str()), Some(state));
        }
        assert_eq!(BoundaryState::from_str("loaded"), None);
    }
}
