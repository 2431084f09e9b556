//! Managed records
//!
//! The persisted representation behind every `Entity` and `Action` handle.
//! These are plain data; the handles in `entity.rs` and `action.rs` reach
//! them through the managed context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::models::value::Value;

/// Unique node identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(NodeId)
    }
}

/// Node kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    #[serde(rename = "entity")]
    Entity,

    #[serde(rename = "action")]
    Action,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Entity => write!(f, "entity"),
            NodeKind::Action => write!(f, "action"),
        }
    }
}

/// Fields shared by every managed record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedNode {
    /// Node identity
    pub id: NodeId,

    /// Type label
    pub node_type: String,

    /// Property bag
    pub properties: BTreeMap<String, Value>,

    /// Group membership
    pub groups: BTreeSet<String>,

    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl ManagedNode {
    pub fn new(node_type: &str) -> Self {
        Self {
            id: NodeId::new(),
            node_type: node_type.to_string(),
            properties: BTreeMap::new(),
            groups: BTreeSet::new(),
            created_at: Utc::now(),
        }
    }

    /// Set a property, returning the previous value
    pub fn set_property(&mut self, key: &str, value: Value) -> Option<Value> {
        self.properties.insert(key.to_string(), value)
    }

    pub fn remove_property(&mut self, key: &str) -> Option<Value> {
        self.properties.remove(key)
    }

    /// Returns false if the node was already in the group
    pub fn add_group(&mut self, name: &str) -> bool {
        self.groups.insert(name.to_string())
    }

    pub fn remove_group(&mut self, name: &str) -> bool {
        self.groups.remove(name)
    }

    pub fn has_group(&self, name: &str) -> bool {
        self.groups.contains(name)
    }
}

/// Managed entity record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedEntity {
    #[serde(flatten)]
    pub node: ManagedNode,

    /// Actions naming this entity as a subject
    pub action_subject_set: BTreeSet<NodeId>,

    /// Actions naming this entity as an object
    pub action_object_set: BTreeSet<NodeId>,
}

impl ManagedEntity {
    pub fn new(node_type: &str) -> Self {
        Self {
            node: ManagedNode::new(node_type),
            action_subject_set: BTreeSet::new(),
            action_object_set: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.node.id
    }
}

/// Managed action record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedAction {
    #[serde(flatten)]
    pub node: ManagedNode,

    /// Subject entities
    pub subject_set: BTreeSet<NodeId>,

    /// Object entities
    pub object_set: BTreeSet<NodeId>,
}

impl ManagedAction {
    pub fn new(node_type: &str) -> Self {
        Self {
            node: ManagedNode::new(node_type),
            subject_set: BTreeSet::new(),
            object_set: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.node.id
    }
}

/// Role an entity plays in an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionRole {
    Subject,
    Object,
}
