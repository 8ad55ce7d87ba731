use axum::{extract::State, http::StatusCode, routing::get, Json, Router};

use clawkeeper_core::KeeperError;
use clawkeeper_schema::{EnvListResponse, SaveEnvRequest, SaveEnvResponse};

use super::{api_error, ApiError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_env).put(save_env))
}

async fn list_env(State(state): State<AppState>) -> Json<EnvListResponse> {
    Json(state.keeper.list_credentials())
}

async fn save_env(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<SaveEnvResponse>, ApiError> {
    let vars = serde_json::from_value::<SaveEnvRequest>(body)
        .ok()
        .and_then(|req| req.vars)
        .ok_or_else(|| {
            api_error(
                StatusCode::BAD_REQUEST,
                KeeperError::MissingVars.to_string(),
            )
        })?;

    state
        .keeper
        .replace_credentials(vars)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to save credentials");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })
}
