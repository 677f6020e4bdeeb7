//! HTTP error responses.

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::Error;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = self.detail();

        if status.is_server_error() && !matches!(self, Self::NotReady) {
            tracing::error!(error = %self, "Error generating embeddings");
        } else {
            tracing::debug!(status = %status, detail = %detail, "Request rejected");
        }

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
