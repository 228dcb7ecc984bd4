//! Data models shared between the backend and the browser bindings

pub mod sequence_state;

pub use sequence_state::SequenceState;
