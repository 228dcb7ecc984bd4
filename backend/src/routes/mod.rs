//! Route definitions for the rental inventory backend

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Sequential ID allocator
        .nest("/id-manager", id_manager_routes())
}

/// ID Manager routes
fn id_manager_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::id_manager_health))
        .route("/sequences", get(handlers::list_sequences))
        .route(
            "/sequences/:prefix",
            get(handlers::get_sequence)
                .put(handlers::set_sequence)
                .delete(handlers::delete_sequence),
        )
        .route("/sequences/:prefix/next", post(handlers::allocate_id))
}
