//! GraphKit - typed object-graph persistence
//!
//! Entities (the nouns) and actions (the verbs linking subject and object
//! entities) carry a type label, a property bag and group memberships. Changes
//! are staged in a graph's managed context and become durable on `save`, which
//! also notifies watchers of what changed.

pub mod config;
pub mod error;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;
pub mod watch;

pub use config::{AppConfig, ConfigLoader};
pub use error::{GraphError, Result};
pub use models::{Action, ActionRole, Entity, NodeId, NodeKind, Value};
pub use services::{Graph, GraphSummary, NodeQuery, SaveReport};
pub use storage::{GraphStore, JsonFileStore, MemoryStore};
pub use watch::{Change, EventFilter, GraphDelegate, GraphEvent, Subscription, WatchFilter};
