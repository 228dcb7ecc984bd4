//! Shared types and identifier logic for the rental inventory platform
//!
//! This crate is free of I/O so it can be used by the backend and,
//! through the wasm crate, by browser-side admin screens.

pub mod models;
pub mod sequence;

pub use models::*;
pub use sequence::*;
