//! Data types shared across the discovery pipeline.

pub mod config;
pub mod state;
pub mod tender;
