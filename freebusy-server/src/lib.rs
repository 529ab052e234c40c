//! Deployment adapters for the freebusy core: a long-lived HTTP server and a
//! one-shot handler, sharing configuration, state and logging setup.

pub mod config;
pub mod routes;
pub mod state;
pub mod telemetry;

use axum::Router;
use freebusy_core::CalendarFetcher;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// The complete HTTP application.
pub fn app<F: CalendarFetcher + 'static>(state: AppState<F>) -> Router {
    Router::new()
        .merge(routes::freebusy::router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
