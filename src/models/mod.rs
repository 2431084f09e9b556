//! Data model
//!
//! Node handles (`Entity`, `Action`), the managed records behind them and
//! property values.

pub mod action;
pub mod entity;
pub mod managed;
pub(crate) mod node;
pub mod value;

pub use action::Action;
pub use entity::Entity;
pub use managed::{ActionRole, ManagedAction, ManagedEntity, ManagedNode, NodeId, NodeKind};
pub use value::Value;
