//! Watch filters and channel subscriptions
//!
//! Provides label-based filtering of graph events. Patterns support
//! wildcards: `*` matches every label and `user:*` matches `user:admin`.

use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::models::managed::NodeKind;
use crate::watch::{Change, GraphEvent};

/// Label pattern with wildcard support
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct WatchPattern {
    pattern: String,
    is_wildcard: bool,
    prefix: String,
}

impl WatchPattern {
    /// Create a new pattern
    pub fn new(pattern: &str) -> Self {
        let (is_wildcard, prefix) = if pattern == "*" {
            (true, String::new())
        } else if let Some(prefix) = pattern.strip_suffix(":*") {
            (true, prefix.to_string())
        } else {
            (false, pattern.to_string())
        };

        Self {
            pattern: pattern.to_string(),
            is_wildcard,
            prefix,
        }
    }

    /// Get the original pattern string
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn is_wildcard(&self) -> bool {
        self.is_wildcard
    }

    /// Check if this pattern matches a label
    pub fn matches(&self, label: &str) -> bool {
        if !self.is_wildcard {
            return self.pattern == label;
        }
        if self.prefix.is_empty() {
            return true;
        }
        label.starts_with(&self.prefix)
            && label.len() > self.prefix.len()
            && label.as_bytes()[self.prefix.len()] == b':'
    }
}

/// Filter for one node kind: which types, groups and property keys to watch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchFilter {
    types: HashSet<WatchPattern>,
    groups: HashSet<WatchPattern>,
    properties: HashSet<WatchPattern>,
}

impl WatchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Watch every type, group and property
    pub fn everything() -> Self {
        Self::new().types(["*"]).groups(["*"]).properties(["*"])
    }

    pub fn types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.add_types(types);
        self
    }

    pub fn groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.add_groups(groups);
        self
    }

    pub fn properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.add_properties(properties);
        self
    }

    pub fn add_types<I, S>(&mut self, types: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.types
            .extend(types.into_iter().map(|t| WatchPattern::new(t.as_ref())));
    }

    pub fn add_groups<I, S>(&mut self, groups: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.groups
            .extend(groups.into_iter().map(|g| WatchPattern::new(g.as_ref())));
    }

    pub fn add_properties<I, S>(&mut self, properties: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.properties
            .extend(properties.into_iter().map(|p| WatchPattern::new(p.as_ref())));
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.groups.is_empty() && self.properties.is_empty()
    }

    /// Add every pattern of `other` to this filter
    pub fn merge(&mut self, other: WatchFilter) {
        self.types.extend(other.types);
        self.groups.extend(other.groups);
        self.properties.extend(other.properties);
    }

    /// Node insertions and deletions match on type, group events on the
    /// group name and property events on the key.
    pub fn matches(&self, event: &GraphEvent) -> bool {
        let (patterns, label) = match &event.change {
            Change::Inserted | Change::Deleted => (&self.types, event.node_type.as_str()),
            Change::GroupInserted { group } | Change::GroupDeleted { group } => {
                (&self.groups, group.as_str())
            }
            Change::PropertyInserted { key, .. }
            | Change::PropertyUpdated { key, .. }
            | Change::PropertyDeleted { key, .. } => (&self.properties, key.as_str()),
        };
        patterns.iter().any(|p| p.matches(label))
    }
}

/// Filters for both node kinds
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub entity: WatchFilter,
    pub action: WatchFilter,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event in the graph
    pub fn all() -> Self {
        Self {
            entity: WatchFilter::everything(),
            action: WatchFilter::everything(),
        }
    }

    pub fn entity(mut self, filter: WatchFilter) -> Self {
        self.entity = filter;
        self
    }

    pub fn action(mut self, filter: WatchFilter) -> Self {
        self.action = filter;
        self
    }

    pub fn matches(&self, event: &GraphEvent) -> bool {
        match event.node {
            NodeKind::Entity => self.entity.matches(event),
            NodeKind::Action => self.action.matches(event),
        }
    }
}

/// Subscription identifier
pub type SubscriptionId = u64;

/// Receiving end of a channel subscription
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    receiver: mpsc::UnboundedReceiver<GraphEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next event. `None` once the graph is gone or the
    /// subscription was removed.
    pub async fn recv(&mut self) -> Option<GraphEvent> {
        self.receiver.recv().await
    }

    /// Next event if one is already queued
    pub fn try_recv(&mut self) -> Option<GraphEvent> {
        self.receiver.try_recv().ok()
    }

    /// Drain every queued event
    pub fn drain(&mut self) -> Vec<GraphEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn into_stream(self) -> UnboundedReceiverStream<GraphEvent> {
        UnboundedReceiverStream::new(self.receiver)
    }
}

#[derive(Debug)]
struct Subscriber {
    filter: EventFilter,
    sender: mpsc::UnboundedSender<GraphEvent>,
}

/// Registry of channel subscribers for one graph
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    next_id: SubscriptionId,
    subscribers: HashMap<SubscriptionId, Subscriber>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber and hand back its receiving end
    pub fn subscribe(&mut self, filter: EventFilter) -> Subscription {
        self.next_id += 1;
        let id = self.next_id;
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers.insert(id, Subscriber { filter, sender });
        Subscription { id, receiver }
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.remove(&id).is_some()
    }

    /// Deliver `event` to every matching subscriber. Subscribers whose
    /// receiver was dropped are removed, matching or not. Returns the number of deliveries.
    pub fn publish(&mut self, event: &GraphEvent) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();
        for (id, subscriber) in &self.subscribers {
            if subscriber.sender.is_closed() {
                closed.push(*id);
                continue;
            }
            if !subscriber.filter.matches(event) {
                continue;
            }
            if subscriber.sender.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                closed.push(*id);
            }
        }
        for id in closed {
            tracing::warn!("Pruning closed subscription {}", id);
            self.subscribers.remove(&id);
        }
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::managed::NodeId;
    use crate::models::value::Value;
    use rstest::rstest;

    fn event(node: NodeKind, node_type: &str, change: Change) -> GraphEvent {
        GraphEvent {
            graph: "test".to_string(),
            node,
            id: NodeId::new(),
            node_type: node_type.to_string(),
            change,
        }
    }

    #[rstest]
    #[case("T", "T", true)]
    #[case("T", "U", false)]
    #[case("*", "anything", true)]
    #[case("user:*", "user:admin", true)]
    #[case("user:*", "user", false)]
    #[case("user:*", "username", false)]
    fn test_pattern_matching(#[case] pattern: &str, #[case] label: &str, #[case] expected: bool) {
        assert_eq!(WatchPattern::new(pattern).matches(label), expected);
    }

    #[test]
    fn test_filter_routes_by_change() {
        let filter = WatchFilter::new().types(["T"]).groups(["g"]).properties(["p"]);

        assert!(filter.matches(&event(NodeKind::Entity, "T", Change::Inserted)));
        assert!(!filter.matches(&event(NodeKind::Entity, "U", Change::Deleted)));
        assert!(filter.matches(&event(
            NodeKind::Entity,
            "U",
            Change::GroupInserted { group: "g".into() }
        )));
        assert!(!filter.matches(&event(
            NodeKind::Entity,
            "T",
            Change::GroupDeleted { group: "h".into() }
        )));
        assert!(filter.matches(&event(
            NodeKind::Entity,
            "U",
            Change::PropertyInserted { key: "p".into(), value: Value::from("v") }
        )));
        assert!(!filter.matches(&event(
            NodeKind::Entity,
            "T",
            Change::PropertyDeleted { key: "q".into(), old: Value::from("v") }
        )));
    }

    #[test]
    fn test_event_filter_separates_kinds() {
        let filter = EventFilter::new().entity(WatchFilter::new().types(["T"]));

        assert!(filter.matches(&event(NodeKind::Entity, "T", Change::Inserted)));
        assert!(!filter.matches(&event(NodeKind::Action, "T", Change::Inserted)));
        assert!(EventFilter::all().matches(&event(NodeKind::Action, "T", Change::Inserted)));
        assert!(WatchFilter::new().is_empty());
    }

    #[test]
    fn test_registry_publish_and_prune() {
        let mut registry = SubscriptionRegistry::new();
        let mut watching = registry.subscribe(EventFilter::new().entity(WatchFilter::new().types(["T"])));
        let dropped = registry.subscribe(EventFilter::all());
        assert_eq!(registry.subscriber_count(), 2);
        drop(dropped);

        let delivered = registry.publish(&event(NodeKind::Entity, "T", Change::Inserted));
        assert_eq!(delivered, 1);
        assert_eq!(registry.subscriber_count(), 1);

        let received = watching.try_recv().unwrap();
        assert_eq!(received.node_type, "T");
        assert!(watching.try_recv().is_none());

        assert!(registry.unsubscribe(watching.id()));
        assert!(!registry.unsubscribe(watching.id()));
    }

    #[test]
    fn test_registry_prunes_dropped_non_matching_subscribers() {
        let mut registry = SubscriptionRegistry::new();
        for _ in 0..100 {
            let subscription =
                registry.subscribe(EventFilter::new().entity(WatchFilter::new().types(["X"])));
            drop(subscription);
        }
        let _live = registry.subscribe(EventFilter::new().entity(WatchFilter::new().types(["X"])));
        assert_eq!(registry.subscriber_count(), 101);

        let delivered = registry.publish(&event(NodeKind::Entity, "T", Change::Inserted));
        assert_eq!(delivered, 0);
        assert_eq!(registry.subscriber_count(), 1);
    }
}
