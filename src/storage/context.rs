//! Managed context
//!
//! One serialised store state per graph. Every read and write of managed
//! records goes through `ManagedContext`, which behaves like a single logical
//! queue: work runs one unit at a time and the caller blocks until its unit
//! has finished.
//!
//! The context also remembers the last committed snapshot so that a save can
//! derive its change set by comparing committed and current state.

use parking_lot::ReentrantMutex;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{GraphError, Result};
use crate::models::action::Action;
use crate::models::entity::Entity;
use crate::models::managed::{ActionRole, ManagedAction, ManagedEntity, ManagedNode, NodeId, NodeKind};

/// Full contents of a graph, as persisted by a `GraphStore`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub entities: BTreeMap<NodeId, ManagedEntity>,
    pub actions: BTreeMap<NodeId, ManagedAction>,
}

impl GraphSnapshot {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.actions.is_empty()
    }
}

/// State guarded by the context
#[derive(Debug, Default)]
pub struct StoreState {
    pub(crate) current: GraphSnapshot,
    pub(crate) committed: GraphSnapshot,
}

impl StoreState {
    fn from_snapshot(snapshot: GraphSnapshot) -> Self {
        Self {
            current: snapshot.clone(),
            committed: snapshot,
        }
    }

    pub(crate) fn insert_entity(&mut self, entity: ManagedEntity) -> NodeId {
        let id = entity.id();
        self.current.entities.insert(id, entity);
        id
    }

    pub(crate) fn insert_action(&mut self, action: ManagedAction) -> NodeId {
        let id = action.id();
        self.current.actions.insert(id, action);
        id
    }

    pub(crate) fn entity_mut(&mut self, id: NodeId) -> Result<&mut ManagedEntity> {
        self.current
            .entities
            .get_mut(&id)
            .ok_or_else(|| GraphError::NotFound(format!("entity {}", id)))
    }

    pub(crate) fn action_mut(&mut self, id: NodeId) -> Result<&mut ManagedAction> {
        self.current
            .actions
            .get_mut(&id)
            .ok_or_else(|| GraphError::NotFound(format!("action {}", id)))
    }

    pub(crate) fn node_mut(&mut self, kind: NodeKind, id: NodeId) -> Result<&mut ManagedNode> {
        match kind {
            NodeKind::Entity => self.entity_mut(id).map(|e| &mut e.node),
            NodeKind::Action => self.action_mut(id).map(|a| &mut a.node),
        }
    }

    /// Connect an entity to an action in the given role, on both sides.
    /// Returns false if the link already existed.
    pub(crate) fn link(&mut self, action_id: NodeId, entity_id: NodeId, role: ActionRole) -> Result<bool> {
        if !self.current.entities.contains_key(&entity_id) {
            return Err(GraphError::NotFound(format!("entity {}", entity_id)));
        }
        let action = self.action_mut(action_id)?;
        let inserted = match role {
            ActionRole::Subject => action.subject_set.insert(entity_id),
            ActionRole::Object => action.object_set.insert(entity_id),
        };
        let entity = self.entity_mut(entity_id)?;
        match role {
            ActionRole::Subject => entity.action_subject_set.insert(action_id),
            ActionRole::Object => entity.action_object_set.insert(action_id),
        };
        Ok(inserted)
    }

    /// Inverse of `link`. Returns false if there was nothing to remove.
    pub(crate) fn unlink(&mut self, action_id: NodeId, entity_id: NodeId, role: ActionRole) -> Result<bool> {
        let action = self.action_mut(action_id)?;
        let removed = match role {
            ActionRole::Subject => action.subject_set.remove(&entity_id),
            ActionRole::Object => action.object_set.remove(&entity_id),
        };
        if let Some(entity) = self.current.entities.get_mut(&entity_id) {
            match role {
                ActionRole::Subject => entity.action_subject_set.remove(&action_id),
                ActionRole::Object => entity.action_object_set.remove(&action_id),
            };
        }
        Ok(removed)
    }

    /// Remove an entity and every action reference to it
    pub(crate) fn delete_entity(&mut self, id: NodeId) -> Result<ManagedEntity> {
        let entity = self
            .current
            .entities
            .remove(&id)
            .ok_or_else(|| GraphError::NotFound(format!("entity {}", id)))?;
        for action_id in &entity.action_subject_set {
            if let Some(action) = self.current.actions.get_mut(action_id) {
                action.subject_set.remove(&id);
            }
        }
        for action_id in &entity.action_object_set {
            if let Some(action) = self.current.actions.get_mut(action_id) {
                action.object_set.remove(&id);
            }
        }
        Ok(entity)
    }

    /// Remove an action and every entity reference to it
    pub(crate) fn delete_action(&mut self, id: NodeId) -> Result<ManagedAction> {
        let action = self
            .current
            .actions
            .remove(&id)
            .ok_or_else(|| GraphError::NotFound(format!("action {}", id)))?;
        for entity_id in &action.subject_set {
            if let Some(entity) = self.current.entities.get_mut(entity_id) {
                entity.action_subject_set.remove(&id);
            }
        }
        for entity_id in &action.object_set {
            if let Some(entity) = self.current.entities.get_mut(entity_id) {
                entity.action_object_set.remove(&id);
            }
        }
        Ok(action)
    }

    pub(crate) fn clear(&mut self) {
        self.current = GraphSnapshot::default();
    }
}

struct ContextInner {
    name: String,
    state: ReentrantMutex<RefCell<StoreState>>,
}

/// Serialised access to one graph's managed records
#[derive(Clone)]
pub struct ManagedContext {
    inner: Arc<ContextInner>,
}

impl std::fmt::Debug for ManagedContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedContext")
            .field("name", &self.inner.name)
            .finish()
    }
}

impl ManagedContext {
    /// Empty context
    pub fn new(name: &str) -> Self {
        Self::with_snapshot(name, GraphSnapshot::default())
    }

    /// Context whose committed and current state both start at `snapshot`
    pub fn with_snapshot(name: &str, snapshot: GraphSnapshot) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                name: name.to_string(),
                state: ReentrantMutex::new(RefCell::new(StoreState::from_snapshot(snapshot))),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// True when both handles point at the same context
    pub fn same_context(&self, other: &ManagedContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Run a mutating unit of work and wait for it.
    ///
    /// Closures passed here must not call back into the context. A call made
    /// from inside an open read snapshot on the same thread fails with
    /// `ContextBusy`.
    pub(crate) fn perform_and_wait<R>(&self, work: impl FnOnce(&mut StoreState) -> R) -> Result<R> {
        let guard = self.inner.state.lock();
        let mut state = guard.try_borrow_mut().map_err(|_| {
            GraphError::ContextBusy(format!(
                "context '{}' cannot be mutated inside a read snapshot",
                self.inner.name
            ))
        })?;
        Ok(work(&mut state))
    }

    /// Run `read` against a consistent view of the context.
    ///
    /// Blocks until no other thread is using the context. Nested read
    /// snapshots on the same thread are allowed.
    pub fn with_read_snapshot<R>(&self, read: impl FnOnce(&ReadSnapshot<'_>) -> R) -> R {
        let guard = self.inner.state.lock();
        let state = guard.borrow();
        let snapshot = ReadSnapshot {
            state: &state,
            context: self,
        };
        read(&snapshot)
    }
}

/// Read-only view of the context, valid for the duration of
/// `ManagedContext::with_read_snapshot`
pub struct ReadSnapshot<'a> {
    state: &'a StoreState,
    context: &'a ManagedContext,
}

impl<'a> ReadSnapshot<'a> {
    pub fn entity(&self, id: NodeId) -> Option<&'a ManagedEntity> {
        self.state.current.entities.get(&id)
    }

    pub fn action(&self, id: NodeId) -> Option<&'a ManagedAction> {
        self.state.current.actions.get(&id)
    }

    pub fn node(&self, kind: NodeKind, id: NodeId) -> Option<&'a ManagedNode> {
        match kind {
            NodeKind::Entity => self.entity(id).map(|e| &e.node),
            NodeKind::Action => self.action(id).map(|a| &a.node),
        }
    }

    pub fn entities(&self) -> impl Iterator<Item = &'a ManagedEntity> + 'a {
        self.state.current.entities.values()
    }

    pub fn actions(&self) -> impl Iterator<Item = &'a ManagedAction> + 'a {
        self.state.current.actions.values()
    }

    pub fn entity_count(&self) -> usize {
        self.state.current.entities.len()
    }

    pub fn action_count(&self) -> usize {
        self.state.current.actions.len()
    }

    /// Action handles for an entity in one role. Empty if the entity is gone.
    pub fn entity_actions(&self, entity_id: NodeId, role: ActionRole) -> Vec<Action> {
        let Some(entity) = self.entity(entity_id) else {
            return Vec::new();
        };
        let set = match role {
            ActionRole::Subject => &entity.action_subject_set,
            ActionRole::Object => &entity.action_object_set,
        };
        set.iter()
            .map(|id| Action::from_managed(self.context.clone(), *id))
            .collect()
    }

    /// Entity handles for an action in one role. Empty if the action is gone.
    pub fn action_entities(&self, action_id: NodeId, role: ActionRole) -> Vec<Entity> {
        let Some(action) = self.action(action_id) else {
            return Vec::new();
        };
        let set = match role {
            ActionRole::Subject => &action.subject_set,
            ActionRole::Object => &action.object_set,
        };
        set.iter()
            .map(|id| Entity::from_managed(self.context.clone(), *id))
            .collect()
    }

    /// Uncommitted changes exist
    pub fn has_changes(&self) -> bool {
        self.state.current != self.state.committed
    }

    /// Context this view was taken from
    pub fn context(&self) -> &'a ManagedContext {
        self.context
    }

    pub fn current(&self) -> &'a GraphSnapshot {
        &self.state.current
    }

    pub fn committed(&self) -> &'a GraphSnapshot {
        &self.state.committed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::value::Value;

    fn seeded() -> (ManagedContext, NodeId, NodeId) {
        let context = ManagedContext::new("test");
        let (entity_id, action_id) = context
            .perform_and_wait(|state| {
                let e = state.insert_entity(ManagedEntity::new("User"));
                let a = state.insert_action(ManagedAction::new("Read"));
                (e, a)
            })
            .unwrap();
        (context, entity_id, action_id)
    }

    #[test]
    fn test_link_updates_both_sides() {
        let (context, e, a) = seeded();

        let linked = context
            .perform_and_wait(|state| state.link(a, e, ActionRole::Subject))
            .unwrap()
            .unwrap();
        assert!(linked);

        context.with_read_snapshot(|snap| {
            assert!(snap.entity(e).unwrap().action_subject_set.contains(&a));
            assert!(snap.action(a).unwrap().subject_set.contains(&e));
            assert!(snap.entity(e).unwrap().action_object_set.is_empty());
        });

        let again = context
            .perform_and_wait(|state| state.link(a, e, ActionRole::Subject))
            .unwrap()
            .unwrap();
        assert!(!again);
    }

    #[test]
    fn test_link_missing_entity_fails() {
        let (context, _e, a) = seeded();
        let result = context
            .perform_and_wait(|state| state.link(a, NodeId::new(), ActionRole::Object))
            .unwrap();
        assert!(matches!(result, Err(GraphError::NotFound(_))));
    }

    #[test]
    fn test_delete_entity_detaches_actions() {
        let (context, e, a) = seeded();
        context
            .perform_and_wait(|state| {
                state.link(a, e, ActionRole::Subject)?;
                state.link(a, e, ActionRole::Object)?;
                state.delete_entity(e)
            })
            .unwrap()
            .unwrap();

        context.with_read_snapshot(|snap| {
            assert!(snap.entity(e).is_none());
            let action = snap.action(a).unwrap();
            assert!(action.subject_set.is_empty());
            assert!(action.object_set.is_empty());
            assert!(snap.entity_actions(e, ActionRole::Subject).is_empty());
        });
    }

    #[test]
    fn test_delete_action_detaches_entities() {
        let (context, e, a) = seeded();
        context
            .perform_and_wait(|state| {
                state.link(a, e, ActionRole::Object)?;
                state.delete_action(a)
            })
            .unwrap()
            .unwrap();

        context.with_read_snapshot(|snap| {
            assert!(snap.entity(e).unwrap().action_object_set.is_empty());
        });
    }

    #[test]
    fn test_mutation_inside_read_snapshot_is_busy() {
        let (context, e, _a) = seeded();
        let result = context.with_read_snapshot(|_snap| {
            context.perform_and_wait(|state| {
                state
                    .entity_mut(e)
                    .map(|entity| entity.node.set_property("p", Value::from("v")))
            })
        });
        assert!(matches!(result, Err(GraphError::ContextBusy(_))));
    }

    #[test]
    fn test_nested_read_snapshots() {
        let (context, _e, _a) = seeded();
        let count = context.with_read_snapshot(|outer| {
            let inner = context.with_read_snapshot(|inner| inner.entity_count());
            outer.entity_count() + inner
        });
        assert_eq!(count, 2);
    }

    #[test]
    fn test_has_changes_tracks_committed_state() {
        let context = ManagedContext::new("test");
        assert!(!context.with_read_snapshot(|snap| snap.has_changes()));

        context
            .perform_and_wait(|state| state.insert_entity(ManagedEntity::new("T")))
            .unwrap();
        assert!(context.with_read_snapshot(|snap| snap.has_changes()));

        context
            .perform_and_wait(|state| state.committed = state.current.clone())
            .unwrap();
        assert!(!context.with_read_snapshot(|snap| snap.has_changes()));
    }

    #[test]
    fn test_serialised_access_across_threads() {
        let context = ManagedContext::new("threads");
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let context = context.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        context
                            .perform_and_wait(|state| state.insert_entity(ManagedEntity::new("T")))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(context.with_read_snapshot(|snap| snap.entity_count()), 200);
    }
}
