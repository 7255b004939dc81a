//! Domain layer types and invariants.

pub mod actor;
pub mod error;
pub mod flags;
pub mod links;
pub mod microcosms;
pub mod permissions;
pub mod profiles;
pub mod questions;
pub mod reactions;
pub mod reads;
pub mod text;
pub mod types;
pub mod watchers;
