//! Change derivation
//!
//! Computes the events of a save from the committed and current snapshots.

use std::collections::BTreeMap;

use crate::models::managed::{ManagedNode, NodeId, NodeKind};
use crate::storage::context::GraphSnapshot;
use crate::watch::{Change, GraphEvent};

/// Events that turn `committed` into `current`.
///
/// Entities come before actions; within a kind, nodes are visited in id
/// order. An inserted node yields `Inserted` followed by one event per group
/// and property; a deleted node yields `Deleted` followed by the symmetric
/// removals.
pub fn derive_events(graph: &str, committed: &GraphSnapshot, current: &GraphSnapshot) -> Vec<GraphEvent> {
    let mut events = Vec::new();

    let old_entities: BTreeMap<_, _> = committed.entities.iter().map(|(id, e)| (*id, &e.node)).collect();
    let new_entities: BTreeMap<_, _> = current.entities.iter().map(|(id, e)| (*id, &e.node)).collect();
    diff_kind(graph, NodeKind::Entity, &old_entities, &new_entities, &mut events);

    let old_actions: BTreeMap<_, _> = committed.actions.iter().map(|(id, a)| (*id, &a.node)).collect();
    let new_actions: BTreeMap<_, _> = current.actions.iter().map(|(id, a)| (*id, &a.node)).collect();
    diff_kind(graph, NodeKind::Action, &old_actions, &new_actions, &mut events);

    events
}

fn diff_kind(
    graph: &str,
    kind: NodeKind,
    old: &BTreeMap<NodeId, &ManagedNode>,
    new: &BTreeMap<NodeId, &ManagedNode>,
    events: &mut Vec<GraphEvent>,
) {
    let mut ids: Vec<NodeId> = old.keys().chain(new.keys()).copied().collect();
    ids.sort();
    ids.dedup();

    for id in ids {
        match (old.get(&id), new.get(&id)) {
            (None, Some(node)) => {
                let event = |change| event_for(graph, kind, node, change);
                events.push(event(Change::Inserted));
                for group in &node.groups {
                    events.push(event(Change::GroupInserted { group: group.clone() }));
                }
                for (key, value) in &node.properties {
                    events.push(event(Change::PropertyInserted {
                        key: key.clone(),
                        value: value.clone(),
                    }));
                }
            }
            (Some(node), None) => {
                let event = |change| event_for(graph, kind, node, change);
                events.push(event(Change::Deleted));
                for group in &node.groups {
                    events.push(event(Change::GroupDeleted { group: group.clone() }));
                }
                for (key, value) in &node.properties {
                    events.push(event(Change::PropertyDeleted {
                        key: key.clone(),
                        old: value.clone(),
                    }));
                }
            }
            (Some(before), Some(after)) => diff_node(graph, kind, before, after, events),
            (None, None) => {}
        }
    }
}

fn diff_node(graph: &str, kind: NodeKind, before: &ManagedNode, after: &ManagedNode, events: &mut Vec<GraphEvent>) {
    let event = |change| event_for(graph, kind, after, change);

    for group in after.groups.difference(&before.groups) {
        events.push(event(Change::GroupInserted { group: group.clone() }));
    }
    for group in before.groups.difference(&after.groups) {
        events.push(event(Change::GroupDeleted { group: group.clone() }));
    }

    for (key, value) in &after.properties {
        match before.properties.get(key) {
            None => events.push(event(Change::PropertyInserted {
                key: key.clone(),
                value: value.clone(),
            })),
            Some(old) if old != value => events.push(event(Change::PropertyUpdated {
                key: key.clone(),
                old: old.clone(),
                new: value.clone(),
            })),
            Some(_) => {}
        }
    }
    for (key, old) in &before.properties {
        if !after.properties.contains_key(key) {
            events.push(event(Change::PropertyDeleted {
                key: key.clone(),
                old: old.clone(),
            }));
        }
    }
}

fn event_for(graph: &str, kind: NodeKind, node: &ManagedNode, change: Change) -> GraphEvent {
    GraphEvent {
        graph: graph.to_string(),
        node: kind,
        id: node.id,
        node_type: node.node_type.clone(),
        change,
    }
}
