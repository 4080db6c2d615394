use axum::Router;
use tower_http::trace::TraceLayer;

use crate::{domains::send::rest::send_routes, state::SharedAppState};

pub fn create_app(state: SharedAppState) -> Router {
  Router::new()
    .merge(send_routes::<SharedAppState>())
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
