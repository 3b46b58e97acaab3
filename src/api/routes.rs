use axum::{middleware, routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::AppState;
use crate::{
    middleware::{make_span_with_request_id, request_id_middleware, require_cron_secret},
    routes,
};

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    let cron = Router::new()
        .route("/daily", get(routes::cron::daily))
        .route("/events", get(routes::cron::events))
        .route("/events/hourly", get(routes::cron::events_hourly))
        .route("/relay", get(routes::cron::relay_status).post(routes::cron::set_relay))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_cron_secret,
        ));

    let api = Router::new()
        .nest("/cron", cron)
        .route("/recommendations/today", get(routes::recommendations::today))
        .route("/oscars/results", get(routes::oscars::results))
        .route("/feed/board", get(routes::feed::board))
        .route("/feed/oscars", get(routes::feed::oscars));

    Router::new()
        .route("/health", get(routes::health_check))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
