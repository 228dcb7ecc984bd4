//! HTTP handlers

pub mod health;
pub mod id_manager;

pub use health::{health_check, id_manager_health};
pub use id_manager::{allocate_id, delete_sequence, get_sequence, list_sequences, set_sequence};
