//! Node handle
//!
//! Property bag and group operations shared by `Entity` and `Action`.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::models::managed::{NodeId, NodeKind};
use crate::models::value::{Value, validate_group, validate_key};
use crate::storage::context::ManagedContext;

/// A managed node as seen through its context
#[derive(Clone, Debug)]
pub(crate) struct NodeRef {
    pub(crate) context: ManagedContext,
    pub(crate) kind: NodeKind,
    pub(crate) id: NodeId,
}

impl NodeRef {
    pub(crate) fn new(context: ManagedContext, kind: NodeKind, id: NodeId) -> Self {
        Self { context, kind, id }
    }

    pub(crate) fn node_type(&self) -> Option<String> {
        self.context
            .with_read_snapshot(|snap| snap.node(self.kind, self.id).map(|n| n.node_type.clone()))
    }

    pub(crate) fn created_at(&self) -> Option<DateTime<Utc>> {
        self.context
            .with_read_snapshot(|snap| snap.node(self.kind, self.id).map(|n| n.created_at))
    }

    pub(crate) fn exists(&self) -> bool {
        self.context
            .with_read_snapshot(|snap| snap.node(self.kind, self.id).is_some())
    }

    pub(crate) fn get(&self, key: &str) -> Option<Value> {
        self.context.with_read_snapshot(|snap| {
            snap.node(self.kind, self.id)
                .and_then(|n| n.properties.get(key).cloned())
        })
    }

    pub(crate) fn set(&self, key: &str, value: Value) -> Result<()> {
        validate_key(key)?;
        value.validate()?;
        tracing::debug!(
            "Setting {} {} property {} ({})",
            self.kind,
            self.id,
            key,
            value.kind()
        );
        self.context.perform_and_wait(|state| {
            state
                .node_mut(self.kind, self.id)
                .map(|node| {
                    node.set_property(key, value);
                })
        })?
    }

    pub(crate) fn remove(&self, key: &str) -> Result<Option<Value>> {
        self.context
            .perform_and_wait(|state| state.node_mut(self.kind, self.id).map(|node| node.remove_property(key)))?
    }

    pub(crate) fn properties(&self) -> BTreeMap<String, Value> {
        self.context.with_read_snapshot(|snap| {
            snap.node(self.kind, self.id)
                .map(|n| n.properties.clone())
                .unwrap_or_default()
        })
    }

    pub(crate) fn add_to_group(&self, name: &str) -> Result<bool> {
        validate_group(name)?;
        tracing::debug!("Adding {} {} to group {}", self.kind, self.id, name);
        self.context
            .perform_and_wait(|state| state.node_mut(self.kind, self.id).map(|node| node.add_group(name)))?
    }

    pub(crate) fn remove_from_group(&self, name: &str) -> Result<bool> {
        self.context
            .perform_and_wait(|state| state.node_mut(self.kind, self.id).map(|node| node.remove_group(name)))?
    }

    pub(crate) fn member_of_group(&self, name: &str) -> bool {
        self.context.with_read_snapshot(|snap| {
            snap.node(self.kind, self.id)
                .map(|n| n.has_group(name))
                .unwrap_or(false)
        })
    }

    pub(crate) fn groups(&self) -> Vec<String> {
        self.context.with_read_snapshot(|snap| {
            snap.node(self.kind, self.id)
                .map(|n| n.groups.iter().cloned().collect())
                .unwrap_or_default()
        })
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.id == other.id && self.context.same_context(&other.context)
    }
}

impl Eq for NodeRef {}
