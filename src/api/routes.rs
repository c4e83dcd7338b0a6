//! API route definitions.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use super::handlers;
use super::state::AppState;
use crate::ws;

/// Create the application router: JSON API under `/api`, push channel at
/// `/ws`, both on the same listener.
pub fn create_router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::DEBUG));

    let api = Router::new()
        .route("/health", get(handlers::health))
        .route("/join/{room}", post(handlers::join_room))
        .route("/leave/{agent_id}", post(handlers::leave_room))
        .route("/send", post(handlers::send_message))
        .route("/messages/{room}", get(handlers::get_messages))
        .route("/rooms", get(handlers::list_rooms))
        .route("/agents/{room}", get(handlers::list_agents))
        .route("/tasks", post(handlers::create_task))
        // The first segment is a room name for the listing and a task id for
        // the update; the router needs one name for both.
        .route("/tasks/{id}", get(handlers::list_tasks))
        .route("/tasks/{id}/update", post(handlers::update_task))
        .route("/broadcast/{room}", post(handlers::broadcast))
        .route(
            "/memory/{agent_id}",
            post(handlers::store_memory).get(handlers::get_memory),
        )
        .route("/notifications/{id}", get(handlers::get_notifications))
        .route(
            "/notifications/{id}/read",
            post(handlers::mark_notification_read),
        )
        .route("/stats", get(handlers::stats))
        .route(
            "/files",
            get(handlers::read_file)
                .put(handlers::write_file)
                .delete(handlers::delete_file),
        )
        .route("/files/list", get(handlers::list_files));

    Router::new()
        .nest("/api", api)
        .route("/ws", get(ws::ws_handler))
        // Agents are trusted peers; the hub carries no auth, so CORS is open.
        .layer(CorsLayer::permissive())
        .layer(trace_layer)
        .with_state(state)
}
