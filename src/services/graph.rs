//! Graph
//!
//! A named graph: its managed context, the durable store it saves to, and
//! the observers that hear about committed changes.
//!
//! Nodes created through `Entity::new` / `Action::new` stay pending until
//! `save` succeeds. A save diffs committed against current state, persists
//! the current snapshot, and then hands the resulting events to the delegate
//! (through the graph's watch filters) and to channel subscriptions.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::config::config::{AppConfig, NotificationConfig};
use crate::error::{ErrorReport, GraphError, Result};
use crate::models::action::Action;
use crate::models::entity::Entity;
use crate::models::managed::NodeId;
use crate::observability::GraphMetrics;
use crate::services::search::{self, GraphSummary, NodeQuery};
use crate::storage::context::{ManagedContext, ReadSnapshot};
use crate::storage::factory::StoreFactory;
use crate::storage::repository::{GraphStore, MemoryStore, validate_graph_name};
use crate::watch::changes::derive_events;
use crate::watch::{
    EventFilter, GraphDelegate, GraphEvent, Subscription, SubscriptionId, SubscriptionRegistry,
    WatchFilter, notify_delegate,
};

/// Outcome of a successful save
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveReport {
    /// False when there was nothing to write
    pub persisted: bool,
    /// Events derived from the change set
    pub events: usize,
    /// Delegate calls plus subscription sends
    pub deliveries: usize,
    /// Entities in the persisted snapshot
    pub entities: usize,
    /// Actions in the persisted snapshot
    pub actions: usize,
}

struct GraphInner {
    name: String,
    context: ManagedContext,
    store: Arc<dyn GraphStore>,
    watchers: RwLock<EventFilter>,
    delegate: RwLock<Option<Arc<dyn GraphDelegate>>>,
    subscriptions: Mutex<SubscriptionRegistry>,
    save_lock: tokio::sync::Mutex<()>,
    metrics: GraphMetrics,
    notifications: NotificationConfig,
}

/// Graph handle. Clones share the same graph.
#[derive(Clone)]
pub struct Graph {
    inner: Arc<GraphInner>,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("name", &self.inner.name)
            .field("backend", &self.inner.store.backend())
            .finish()
    }
}

impl Graph {
    fn build(
        name: &str,
        context: ManagedContext,
        store: Arc<dyn GraphStore>,
        notifications: NotificationConfig,
    ) -> Self {
        Self {
            inner: Arc::new(GraphInner {
                name: name.to_string(),
                context,
                store,
                watchers: RwLock::new(EventFilter::default()),
                delegate: RwLock::new(None),
                subscriptions: Mutex::new(SubscriptionRegistry::new()),
                save_lock: tokio::sync::Mutex::new(()),
                metrics: GraphMetrics::default(),
                notifications,
            }),
        }
    }

    /// Empty graph backed by its own process-local store
    pub fn in_memory(name: &str) -> Self {
        Self::build(
            name,
            ManagedContext::new(name),
            Arc::new(MemoryStore::new()),
            NotificationConfig::default(),
        )
    }

    /// Open the graph named by `config`, loading its last persisted state
    pub async fn open(config: &AppConfig) -> Result<Self> {
        let store = StoreFactory::create(&config.storage)?;
        Self::open_with_store(&config.graph_name, store, config.notifications.clone()).await
    }

    /// Open `name` on an existing store. Stores can be shared between graphs
    /// with different names.
    pub async fn open_with_store(
        name: &str,
        store: Arc<dyn GraphStore>,
        notifications: NotificationConfig,
    ) -> Result<Self> {
        validate_graph_name(name)?;
        let context = match store.load(name).await? {
            Some(snapshot) => {
                tracing::info!(
                    "Loaded graph '{}' from {} store ({} entities, {} actions)",
                    name,
                    store.backend(),
                    snapshot.entities.len(),
                    snapshot.actions.len()
                );
                ManagedContext::with_snapshot(name, snapshot)
            }
            None => {
                tracing::info!("Created graph '{}' on {} store", name, store.backend());
                ManagedContext::new(name)
            }
        };
        Ok(Self::build(name, context, store, notifications))
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub(crate) fn context(&self) -> &ManagedContext {
        &self.inner.context
    }

    pub fn metrics(&self) -> &GraphMetrics {
        &self.inner.metrics
    }

    /// Run `read` against one consistent view of the graph
    pub fn with_read_snapshot<R>(&self, read: impl FnOnce(&ReadSnapshot<'_>) -> R) -> R {
        self.inner.context.with_read_snapshot(read)
    }

    /// Unsaved changes exist
    pub fn has_changes(&self) -> bool {
        self.with_read_snapshot(|snap| snap.has_changes())
    }

    // ===== Saving =====

    /// Persist pending changes and notify observers.
    ///
    /// Saves are serialised per graph. If the store write fails the changes
    /// stay pending and no observer is called.
    pub async fn save(&self) -> Result<SaveReport> {
        let _guard = self.inner.save_lock.lock().await;

        let name = self.inner.name.as_str();
        let pending = self.inner.context.perform_and_wait(|state| {
            if state.current == state.committed {
                None
            } else {
                let events = derive_events(name, &state.committed, &state.current);
                Some((state.current.clone(), events))
            }
        })?;

        let Some((snapshot, events)) = pending else {
            tracing::debug!("Graph '{}' has no changes to save", name);
            return Ok(SaveReport::default());
        };

        if let Err(e) = self.inner.store.persist(name, &snapshot).await {
            self.inner.metrics.record_save_failure();
            let report = ErrorReport::from(&e);
            tracing::warn!(
                code = %report.code,
                "Failed to save graph '{}': {}",
                name,
                report.message
            );
            return Err(e);
        }

        let entities = snapshot.entities.len();
        let actions = snapshot.actions.len();
        self.inner
            .context
            .perform_and_wait(|state| state.committed = snapshot)?;
        self.inner.metrics.record_save(entities, actions);

        let deliveries = self.dispatch(&events);
        self.inner.metrics.record_events(events.len(), deliveries);

        tracing::info!(
            "Saved graph '{}' ({} entities, {} actions, {} events)",
            name,
            entities,
            actions,
            events.len()
        );

        Ok(SaveReport {
            persisted: true,
            events: events.len(),
            deliveries,
            entities,
            actions,
        })
    }

    /// Save on a background task and report the outcome to `completion`.
    ///
    /// Fails without calling `completion` when no tokio runtime is running.
    pub fn save_with<F>(&self, completion: F) -> Result<JoinHandle<()>>
    where
        F: FnOnce(bool, Option<GraphError>) + Send + 'static,
    {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| GraphError::Internal(format!("save_with needs a tokio runtime: {}", e)))?;
        let graph = self.clone();
        Ok(handle.spawn(async move {
            match graph.save().await {
                Ok(_) => completion(true, None),
                Err(e) => completion(false, Some(e)),
            }
        }))
    }

    /// Delete every node and save
    pub async fn clear(&self) -> Result<SaveReport> {
        self.inner.context.perform_and_wait(|state| state.clear())?;
        tracing::info!("Cleared graph '{}'", self.inner.name);
        self.save().await
    }

    fn dispatch(&self, events: &[GraphEvent]) -> usize {
        let watchers = self.inner.watchers.read().clone();
        let delegate = self.inner.delegate.read().clone();
        let mut deliveries = 0;

        for event in events {
            if self.inner.notifications.log_events {
                tracing::debug!("Graph event: {}", event);
            }
            if let Some(delegate) = &delegate {
                if watchers.matches(event) {
                    notify_delegate(delegate.as_ref(), self, event);
                    deliveries += 1;
                }
            }
            deliveries += self.inner.subscriptions.lock().publish(event);
        }

        deliveries
    }

    // ===== Lookup =====

    /// Entity handle for `id`, if it exists in current state
    pub fn entity(&self, id: NodeId) -> Option<Entity> {
        self.with_read_snapshot(|snap| {
            snap.entity(id)
                .map(|_| Entity::from_managed(self.inner.context.clone(), id))
        })
    }

    /// Action handle for `id`, if it exists in current state
    pub fn action(&self, id: NodeId) -> Option<Action> {
        self.with_read_snapshot(|snap| {
            snap.action(id)
                .map(|_| Action::from_managed(self.inner.context.clone(), id))
        })
    }

    /// Entities matching any criterion of `query`, oldest first
    pub fn search_for_entity(&self, query: &NodeQuery) -> Vec<Entity> {
        self.with_read_snapshot(|snap| search::search_entities(snap, query))
    }

    /// Actions matching any criterion of `query`, oldest first
    pub fn search_for_action(&self, query: &NodeQuery) -> Vec<Action> {
        self.with_read_snapshot(|snap| search::search_actions(snap, query))
    }

    /// Counts by type and group over current state
    pub fn summary(&self) -> GraphSummary {
        self.with_read_snapshot(|snap| search::summarize(&self.inner.name, snap))
    }

    // ===== Observers =====

    /// Widen the entity watch filter used for delegate callbacks
    pub fn watch_for_entity(&self, filter: WatchFilter) {
        self.inner.watchers.write().entity.merge(filter);
    }

    /// Widen the action watch filter used for delegate callbacks
    pub fn watch_for_action(&self, filter: WatchFilter) {
        self.inner.watchers.write().action.merge(filter);
    }

    /// Current delegate watch filters
    pub fn watchers(&self) -> EventFilter {
        self.inner.watchers.read().clone()
    }

    pub fn set_delegate(&self, delegate: Arc<dyn GraphDelegate>) {
        *self.inner.delegate.write() = Some(delegate);
    }

    pub fn clear_delegate(&self) {
        *self.inner.delegate.write() = None;
    }

    /// Receive every committed event matching `filter`
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        let subscription = self.inner.subscriptions.lock().subscribe(filter);
        tracing::debug!(
            "Subscription {} opened on graph '{}'",
            subscription.id(),
            self.inner.name
        );
        subscription
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.subscriptions.lock().unsubscribe(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscriptions.lock().subscriber_count()
    }
}
