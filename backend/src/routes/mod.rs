//! Route definitions for the transfer service

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - allocation runs
        .nest("/allocations", allocation_routes(state.clone()))
        // Protected routes - transfer documents
        .nest("/transfers", transfer_routes(state))
}

/// Allocation routes (protected)
fn allocation_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/preview", post(handlers::preview_allocation))
        .route("/run", post(handlers::run_allocation))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Transfer document routes (protected)
fn transfer_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_transfers))
        .route("/events", get(handlers::stream_events))
        .route("/:document_id", get(handlers::get_transfer))
        .route("/:document_id/pick-list", get(handlers::get_pick_list))
        .route("/:document_id/start", post(handlers::start_picking))
        .route("/:document_id/scan", post(handlers::scan_code))
        .route("/:document_id/items", post(handlers::add_item))
        .route(
            "/:document_id/items/:item_id/confirm",
            post(handlers::confirm_item),
        )
        .route("/:document_id/finish", post(handlers::finish_picking))
        .route("/:document_id/ship", post(handlers::ship))
        .route("/:document_id/receive", post(handlers::confirm_receipt))
        .route("/:document_id/cancel", post(handlers::cancel))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
