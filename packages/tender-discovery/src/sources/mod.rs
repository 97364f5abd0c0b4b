//! Source Adapter implementations.

pub mod pcc;

pub use pcc::{PccConfig, PccSource};
