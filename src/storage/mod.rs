//! Storage layer
//!
//! The managed context that serialises access to a graph's records, and the
//! durable stores a save writes to.

pub mod context;
pub mod factory;
pub mod repository;

pub use context::{GraphSnapshot, ManagedContext, ReadSnapshot};
pub use factory::StoreFactory;
pub use repository::{GraphStore, JsonFileStore, MemoryStore};
