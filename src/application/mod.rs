//! Application services layer.

pub mod error;
pub mod microcosms;
pub mod mutation;
pub mod pagination;
pub mod permissions;
pub mod profiles;
pub mod questions;
pub mod reactions;
pub mod reads;
pub mod repos;
pub mod services;
pub mod watchers;
