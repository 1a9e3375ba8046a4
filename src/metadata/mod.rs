//! Repository metadata and its cascading resolution.
//!
//! - [`Value`] - typed configuration values
//! - [`Metadata`] - a node of repository metadata scoped to one tag
//! - [`resolver`] - precedence and merge rules for queryable nodes

pub mod resolver;
pub mod value;

pub use resolver::{is_queryable, Metadata, RootData, DEFAULT_GROUP, QUERY_KEYS};
pub use value::{Map, Value};
