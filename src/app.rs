use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::{
    handlers::{
        create_item, leak_global, leak_object, leak_request, leak_stats, list_items, root,
        snapshot, snapshot_after_gc,
    },
    state::AppState,
};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/leak", get(leak_object))
        .route("/leak-req", get(leak_request))
        .route("/leak-hard", get(leak_global))
        .route("/leak/stats", get(leak_stats))
        .route("/snap", get(snapshot))
        .route("/snap-gc", get(snapshot_after_gc))
        .route("/items", get(list_items).post(create_item))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
