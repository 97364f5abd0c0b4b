//! Seams to the outside world.
//!
//! The engine only talks to the upstream listing and to durable storage
//! through these traits.

pub mod source;
pub mod store;
