//! Action nodes
//!
//! Actions are the verbs of the graph: typed records relating subject
//! entities to object entities.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::error::{GraphError, Result};
use crate::models::entity::Entity;
use crate::models::managed::{ActionRole, ManagedAction, NodeId, NodeKind};
use crate::models::node::NodeRef;
use crate::models::value::{Value, validate_type};
use crate::services::graph::Graph;
use crate::storage::context::ManagedContext;

/// Action handle
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Action {
    node: NodeRef,
}

impl Action {
    /// Create a new action of `node_type` in `graph`
    pub fn new(graph: &Graph, node_type: &str) -> Result<Self> {
        validate_type(node_type)?;
        let context = graph.context().clone();
        let id = context.perform_and_wait(|state| state.insert_action(ManagedAction::new(node_type)))?;
        tracing::debug!("Created action {} (type: {})", id, node_type);
        Ok(Self::from_managed(context, id))
    }

    pub(crate) fn from_managed(context: ManagedContext, id: NodeId) -> Self {
        Self {
            node: NodeRef::new(context, NodeKind::Action, id),
        }
    }

    pub fn id(&self) -> NodeId {
        self.node.id
    }

    pub fn node_type(&self) -> Option<String> {
        self.node.node_type()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.node.created_at()
    }

    pub fn is_deleted(&self) -> bool {
        !self.node.exists()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.node.get(key)
    }

    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        self.node.set(key, value.into())
    }

    pub fn remove(&self, key: &str) -> Result<Option<Value>> {
        self.node.remove(key)
    }

    pub fn properties(&self) -> BTreeMap<String, Value> {
        self.node.properties()
    }

    pub fn add_to_group(&self, name: &str) -> Result<bool> {
        self.node.add_to_group(name)
    }

    pub fn remove_from_group(&self, name: &str) -> Result<bool> {
        self.node.remove_from_group(name)
    }

    pub fn member_of_group(&self, name: &str) -> bool {
        self.node.member_of_group(name)
    }

    pub fn groups(&self) -> Vec<String> {
        self.node.groups()
    }

    /// Add `entity` as a subject. Returns false if it already was one.
    pub fn add_subject(&self, entity: &Entity) -> Result<bool> {
        self.link(entity, ActionRole::Subject)
    }

    pub fn remove_subject(&self, entity: &Entity) -> Result<bool> {
        self.unlink(entity, ActionRole::Subject)
    }

    /// Add `entity` as an object. Returns false if it already was one.
    pub fn add_object(&self, entity: &Entity) -> Result<bool> {
        self.link(entity, ActionRole::Object)
    }

    pub fn remove_object(&self, entity: &Entity) -> Result<bool> {
        self.unlink(entity, ActionRole::Object)
    }

    pub fn subjects(&self) -> Vec<Entity> {
        self.node
            .context
            .with_read_snapshot(|snap| snap.action_entities(self.node.id, ActionRole::Subject))
    }

    pub fn objects(&self) -> Vec<Entity> {
        self.node
            .context
            .with_read_snapshot(|snap| snap.action_entities(self.node.id, ActionRole::Object))
    }

    /// Delete the action and detach it from every entity
    pub fn delete(&self) -> Result<()> {
        tracing::debug!("Deleting action {}", self.node.id);
        self.node
            .context
            .perform_and_wait(|state| state.delete_action(self.node.id).map(|_| ()))?
    }

    fn link(&self, entity: &Entity, role: ActionRole) -> Result<bool> {
        self.check_same_graph(entity)?;
        tracing::debug!("Linking entity {} to action {} as {:?}", entity.id(), self.node.id, role);
        self.node
            .context
            .perform_and_wait(|state| state.link(self.node.id, entity.id(), role))?
    }

    fn unlink(&self, entity: &Entity, role: ActionRole) -> Result<bool> {
        self.check_same_graph(entity)?;
        self.node
            .context
            .perform_and_wait(|state| state.unlink(self.node.id, entity.id(), role))?
    }

    fn check_same_graph(&self, entity: &Entity) -> Result<()> {
        if !self.node.context.same_context(entity.context()) {
            return Err(GraphError::Validation(format!(
                "entity {} belongs to graph '{}', action {} to graph '{}'",
                entity.id(),
                entity.context().name(),
                self.node.id,
                self.node.context.name()
            )));
        }
        Ok(())
    }
}

impl std::hash::Hash for Action {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.node.id.hash(state);
    }
}
