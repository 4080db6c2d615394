use axum::{
  extract::{Json, State},
  http::StatusCode,
  response::Json as JsonResponse,
  routing::{get, post},
  Router,
};
use serde_json::Value;

use super::model::{SendRequest, VersionResponse};
use crate::state::AppState;

pub fn send_routes<S: AppState>() -> Router<S> {
  Router::new()
    .route("/", get(version_handler::<S>))
    .route("/send", post(send_handler::<S>))
}

pub async fn version_handler<S: AppState>(State(state): State<S>) -> JsonResponse<VersionResponse> {
  JsonResponse(VersionResponse {
    version: state.version().to_string(),
  })
}

/// Acknowledges as soon as the send is started; its outcome is never reported.
pub async fn send_handler<S: AppState>(State(state): State<S>, Json(payload): Json<Value>) -> StatusCode {
  match state.dispatch_mail(SendRequest::from(payload)) {
    Ok(kind) => {
      tracing::debug!(template = %kind, "send dispatched");
      StatusCode::OK
    }
    Err(req) => {
      tracing::error!(
        op = "send",
        mail_type = req.mail_type().unwrap_or_default(),
        body = %req.body(),
        "invalid type"
      );
      StatusCode::BAD_REQUEST
    }
  }
}
