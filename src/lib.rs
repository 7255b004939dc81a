//! Question-forum core: visibility-aware permissions, read-through caching
//! with targeted invalidation, and duplicate-submission suppression.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
