//! Business logic services for the rental inventory backend

pub mod id_manager;

pub use id_manager::IdManagerService;
