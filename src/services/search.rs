//! Node lookup
//!
//! Queries over a read snapshot, and the per-type/per-group summary used by
//! the binary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::action::Action;
use crate::models::entity::Entity;
use crate::models::managed::{ManagedNode, NodeId};
use crate::models::value::Value;
use crate::storage::context::ReadSnapshot;
use crate::watch::WatchPattern;

/// Node query.
///
/// A node matches when ANY criterion matches: one of the types, one of the
/// groups, or one of the property criteria. Types and groups accept watch
/// patterns (`*`, `prefix:*`). A property criterion matches on key alone, or
/// on key and value when a value is given. An empty query matches nothing.
#[derive(Debug, Clone, Default)]
pub struct NodeQuery {
    pub types: Vec<String>,
    pub groups: Vec<String>,
    pub properties: Vec<(String, Option<Value>)>,
}

impl NodeQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types.extend(types.into_iter().map(Into::into));
        self
    }

    pub fn groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }

    /// Match nodes that have `key`, whatever its value
    pub fn has_property(mut self, key: &str) -> Self {
        self.properties.push((key.to_string(), None));
        self
    }

    /// Match nodes whose `key` equals `value`
    pub fn property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.push((key.to_string(), Some(value.into())));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.groups.is_empty() && self.properties.is_empty()
    }

    pub fn matches(&self, node: &ManagedNode) -> bool {
        let type_match = self
            .types
            .iter()
            .any(|t| WatchPattern::new(t).matches(&node.node_type));
        if type_match {
            return true;
        }

        let group_match = self.groups.iter().any(|g| {
            let pattern = WatchPattern::new(g);
            node.groups.iter().any(|group| pattern.matches(group))
        });
        if group_match {
            return true;
        }

        self.properties.iter().any(|(key, expected)| {
            match (node.properties.get(key), expected) {
                (Some(_), None) => true,
                (Some(actual), Some(expected)) => actual == expected,
                (None, _) => false,
            }
        })
    }
}

fn ordered<'a>(nodes: impl Iterator<Item = &'a ManagedNode>, query: &NodeQuery) -> Vec<NodeId> {
    let mut matched: Vec<&ManagedNode> = nodes.filter(|n| query.matches(n)).collect();
    matched.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    matched.into_iter().map(|n| n.id).collect()
}

pub(crate) fn search_entities(snap: &ReadSnapshot<'_>, query: &NodeQuery) -> Vec<Entity> {
    ordered(snap.entities().map(|e| &e.node), query)
        .into_iter()
        .map(|id| Entity::from_managed(snap.context().clone(), id))
        .collect()
}

pub(crate) fn search_actions(snap: &ReadSnapshot<'_>, query: &NodeQuery) -> Vec<Action> {
    ordered(snap.actions().map(|a| &a.node), query)
        .into_iter()
        .map(|id| Action::from_managed(snap.context().clone(), id))
        .collect()
}

/// Counts by type and group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub graph: String,
    pub entities: usize,
    pub actions: usize,
    pub entity_types: BTreeMap<String, usize>,
    pub action_types: BTreeMap<String, usize>,
    pub groups: BTreeMap<String, usize>,
    pub has_changes: bool,
}

pub(crate) fn summarize(graph: &str, snap: &ReadSnapshot<'_>) -> GraphSummary {
    let mut summary = GraphSummary {
        graph: graph.to_string(),
        entities: snap.entity_count(),
        actions: snap.action_count(),
        has_changes: snap.has_changes(),
        ..Default::default()
    };

    for entity in snap.entities() {
        *summary
            .entity_types
            .entry(entity.node.node_type.clone())
            .or_insert(0) += 1;
        for group in &entity.node.groups {
            *summary.groups.entry(group.clone()).or_insert(0) += 1;
        }
    }
    for action in snap.actions() {
        *summary
            .action_types
            .entry(action.node.node_type.clone())
            .or_insert(0) += 1;
        for group in &action.node.groups {
            *summary.groups.entry(group.clone()).or_insert(0) += 1;
        }
    }

    summary
}
