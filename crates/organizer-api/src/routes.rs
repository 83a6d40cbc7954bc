use axum::{
    routing::{get, patch, post, put},
    Router,
};
use organizer_core::repositories::MenuStore;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

use crate::handlers::{health, menus, sync};
use crate::state::AppState;

pub fn build_router<S: MenuStore + 'static>(state: AppState<S>) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health::health_check::<S>))
        .route("/metrics", get(health::metrics::<S>));

    let api_routes = Router::new()
        .route("/menus", get(menus::list_menus::<S>).post(menus::create_menu::<S>))
        .route("/menus/order", put(menus::reorder_menus::<S>))
        .route("/menus/{id}", patch(menus::update_menu::<S>).delete(menus::delete_menu::<S>))
        .route("/sync/pending", get(sync::pending::<S>))
        .route("/sync", post(sync::sync_now::<S>));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
        .with_state(state)
}
