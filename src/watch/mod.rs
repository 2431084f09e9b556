//! Watchers and change notification
//!
//! A save turns the difference between committed and current state into
//! `GraphEvent`s. Events reach observers two ways:
//! - the graph's `GraphDelegate`, filtered by the graph-level watch filters
//! - channel subscriptions, each with its own `EventFilter`

use serde::{Deserialize, Serialize};

use crate::models::action::Action;
use crate::models::entity::Entity;
use crate::models::managed::{NodeId, NodeKind};
use crate::models::value::Value;
use crate::services::graph::Graph;

pub mod changes;
pub mod subscription;

pub use subscription::{
    EventFilter, Subscription, SubscriptionId, SubscriptionRegistry, WatchFilter, WatchPattern,
};

/// What happened to a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Change {
    Inserted,
    Deleted,
    GroupInserted { group: String },
    GroupDeleted { group: String },
    PropertyInserted { key: String, value: Value },
    PropertyUpdated { key: String, old: Value, new: Value },
    PropertyDeleted { key: String, old: Value },
}

/// A committed change to one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEvent {
    /// Name of the graph that saved the change
    pub graph: String,
    pub node: NodeKind,
    pub id: NodeId,
    pub node_type: String,
    pub change: Change,
}

impl std::fmt::Display for GraphEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let change = match &self.change {
            Change::Inserted => "inserted".to_string(),
            Change::Deleted => "deleted".to_string(),
            Change::GroupInserted { group } => format!("group+ {}", group),
            Change::GroupDeleted { group } => format!("group- {}", group),
            Change::PropertyInserted { key, .. } => format!("property+ {}", key),
            Change::PropertyUpdated { key, .. } => format!("property~ {}", key),
            Change::PropertyDeleted { key, .. } => format!("property- {}", key),
        };
        write!(f, "{}:{} {} ({}) {}", self.graph, self.node, self.id, self.node_type, change)
    }
}

/// Observer for committed graph changes.
///
/// Called synchronously on the task that saved, after the store write
/// succeeded and outside the context lock, so implementations may read the
/// nodes they are handed. Deleted nodes are handed over as handles that no
/// longer resolve.
#[allow(unused_variables)]
pub trait GraphDelegate: Send + Sync {
    fn graph_did_insert_entity(&self, graph: &Graph, entity: &Entity) {}

    fn graph_did_delete_entity(&self, graph: &Graph, entity: &Entity) {}

    fn graph_did_insert_entity_group(&self, graph: &Graph, entity: &Entity, group: &str) {}

    fn graph_did_delete_entity_group(&self, graph: &Graph, entity: &Entity, group: &str) {}

    fn graph_did_insert_entity_property(&self, graph: &Graph, entity: &Entity, key: &str, value: &Value) {}

    fn graph_did_update_entity_property(&self, graph: &Graph, entity: &Entity, key: &str, value: &Value) {}

    fn graph_did_delete_entity_property(&self, graph: &Graph, entity: &Entity, key: &str, value: &Value) {}

    fn graph_did_insert_action(&self, graph: &Graph, action: &Action) {}

    fn graph_did_delete_action(&self, graph: &Graph, action: &Action) {}

    fn graph_did_insert_action_group(&self, graph: &Graph, action: &Action, group: &str) {}

    fn graph_did_delete_action_group(&self, graph: &Graph, action: &Action, group: &str) {}

    fn graph_did_insert_action_property(&self, graph: &Graph, action: &Action, key: &str, value: &Value) {}

    fn graph_did_update_action_property(&self, graph: &Graph, action: &Action, key: &str, value: &Value) {}

    fn graph_did_delete_action_property(&self, graph: &Graph, action: &Action, key: &str, value: &Value) {}
}

/// Route one event to the matching delegate method
pub(crate) fn notify_delegate(delegate: &dyn GraphDelegate, graph: &Graph, event: &GraphEvent) {
    match event.node {
        NodeKind::Entity => {
            let entity = Entity::from_managed(graph.context().clone(), event.id);
            match &event.change {
                Change::Inserted => delegate.graph_did_insert_entity(graph, &entity),
                Change::Deleted => delegate.graph_did_delete_entity(graph, &entity),
                Change::GroupInserted { group } => {
                    delegate.graph_did_insert_entity_group(graph, &entity, group)
                }
                Change::GroupDeleted { group } => {
                    delegate.graph_did_delete_entity_group(graph, &entity, group)
                }
                Change::PropertyInserted { key, value } => {
                    delegate.graph_did_insert_entity_property(graph, &entity, key, value)
                }
                Change::PropertyUpdated { key, new, .. } => {
                    delegate.graph_did_update_entity_property(graph, &entity, key, new)
                }
                Change::PropertyDeleted { key, old } => {
                    delegate.graph_did_delete_entity_property(graph, &entity, key, old)
                }
            }
        }
        NodeKind::Action => {
            let action = Action::from_managed(graph.context().clone(), event.id);
            match &event.change {
                Change::Inserted => delegate.graph_did_insert_action(graph, &action),
                Change::Deleted => delegate.graph_did_delete_action(graph, &action),
                Change::GroupInserted { group } => {
                    delegate.graph_did_insert_action_group(graph, &action, group)
                }
                Change::GroupDeleted { group } => {
                    delegate.graph_did_delete_action_group(graph, &action, group)
                }
                Change::PropertyInserted { key, value } => {
                    delegate.graph_did_insert_action_property(graph, &action, key, value)
                }
                Change::PropertyUpdated { key, new, .. } => {
                    delegate.graph_did_update_action_property(graph, &action, key, new)
                }
                Change::PropertyDeleted { key, old } => {
                    delegate.graph_did_delete_action_property(graph, &action, key, old)
                }
            }
        }
    }
}
