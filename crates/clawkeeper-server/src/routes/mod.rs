pub mod env;
pub mod gateway;
pub mod status;

use axum::http::StatusCode;
use axum::{Json, Router};

use clawkeeper_schema::ErrorResponse;

use crate::state::AppState;

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/env", env::router())
        .nest("/gateway", gateway::router())
        .nest("/status", status::router())
}

pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            ok: false,
            error: message.into(),
        }),
    )
}
