//! Entity nodes
//!
//! Entities are persons, places or things: the nouns of the graph. An
//! `Entity` is a lightweight handle; its data lives in the managed context of
//! the graph that created it.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::models::action::Action;
use crate::models::managed::{ActionRole, ManagedEntity, NodeId, NodeKind};
use crate::models::node::NodeRef;
use crate::models::value::{Value, validate_type};
use crate::services::graph::Graph;
use crate::storage::context::ManagedContext;

/// Entity handle
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entity {
    node: NodeRef,
}

impl Entity {
    /// Create a new entity of `node_type` in `graph`.
    ///
    /// The entity is pending until the graph is saved.
    pub fn new(graph: &Graph, node_type: &str) -> Result<Self> {
        validate_type(node_type)?;
        let context = graph.context().clone();
        let id = context.perform_and_wait(|state| state.insert_entity(ManagedEntity::new(node_type)))?;
        tracing::debug!("Created entity {} (type: {})", id, node_type);
        Ok(Self::from_managed(context, id))
    }

    /// Wrap an existing managed entity without inserting anything
    pub(crate) fn from_managed(context: ManagedContext, id: NodeId) -> Self {
        Self {
            node: NodeRef::new(context, NodeKind::Entity, id),
        }
    }

    pub fn id(&self) -> NodeId {
        self.node.id
    }

    /// Type label, `None` once deleted
    pub fn node_type(&self) -> Option<String> {
        self.node.node_type()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.node.created_at()
    }

    pub fn is_deleted(&self) -> bool {
        !self.node.exists()
    }

    /// Read a property
    pub fn get(&self, key: &str) -> Option<Value> {
        self.node.get(key)
    }

    /// Write a property, replacing any previous value
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        self.node.set(key, value.into())
    }

    /// Remove a property, returning its last value
    pub fn remove(&self, key: &str) -> Result<Option<Value>> {
        self.node.remove(key)
    }

    pub fn properties(&self) -> BTreeMap<String, Value> {
        self.node.properties()
    }

    /// Returns false if the entity was already in the group
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

    /// Every action this entity takes part in, as subject or object.
    ///
    /// Derived and read-only: there is no way to assign it.
    ///
    /// ```compile_fail
    /// # use graphkit::{Entity, Graph};
    /// let graph = Graph::in_memory("doc");
    /// let entity = Entity::new(&graph, "T").unwrap();
    /// entity.actions() = Vec::new();
    /// ```
    ///
    /// Both role sets are read inside one snapshot, so the result is
    /// consistent. The call blocks until the context is free.
    pub fn actions(&self) -> Vec<Action> {
        self.node.context.with_read_snapshot(|snap| {
            let mut actions = snap.entity_actions(self.node.id, ActionRole::Subject);
            actions.extend(snap.entity_actions(self.node.id, ActionRole::Object));
            actions
        })
    }

    /// Actions naming this entity as a subject. Blocks until the context is free.
    pub fn actions_as_subject(&self) -> Vec<Action> {
        self.node
            .context
            .with_read_snapshot(|snap| snap.entity_actions(self.node.id, ActionRole::Subject))
    }

    /// Actions naming this entity as an object. Blocks until the context is free.
    pub fn actions_as_object(&self) -> Vec<Action> {
        self.node
            .context
            .with_read_snapshot(|snap| snap.entity_actions(self.node.id, ActionRole::Object))
    }

    /// Delete the entity and detach it from every action
    pub fn delete(&self) -> Result<()> {
        tracing::debug!("Deleting entity {}", self.node.id);
        self.node
            .context
            .perform_and_wait(|state| state.delete_entity(self.node.id).map(|_| ()))?
    }

    pub(crate) fn context(&self) -> &ManagedContext {
        &self.node.context
    }
}

impl std::hash::Hash for Entity {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.node.id.hash(state);
    }
}
