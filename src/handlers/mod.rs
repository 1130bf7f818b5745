//! HTTP handlers for entity listing and lookup.

pub mod entity;
pub use entity::*;
