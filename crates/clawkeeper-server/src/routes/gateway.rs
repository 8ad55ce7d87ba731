use axum::{extract::State, http::StatusCode, routing::post, Json, Router};

use clawkeeper_schema::RestartResponse;

use super::{api_error, ApiError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/restart", post(restart_gateway))
}

/// Responds once stop and reinstall are done; the relaunch continues in the background.
async fn restart_gateway(State(state): State<AppState>) -> Result<Json<RestartResponse>, ApiError> {
    match state.keeper.restart().await {
        Ok(_relaunch) => Ok(Json(RestartResponse { ok: true })),
        Err(e) => Err(api_error(StatusCode::BAD_REQUEST, e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    use crate::test_support::{body_json, TestApp};

    fn restart_request() -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/gateway/restart")
            .body(Body::empty())
            .expect("build request")
    }

    #[tokio::test]
    async fn test_restart_requires_onboarding() {
        let app = TestApp::new(false);
        let response = app
            .router()
            .oneshot(restart_request())
            .await
            .expect("send request");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Not onboarded");
        assert!(app.cli.calls().is_empty());
    }

    #[tokio::test]
    async fn test_restart_clears_restart_required() {
        let app = TestApp::new(true);
        app.keeper
            .replace_credentials(vec![clawkeeper_schema::EnvEntry::new("GEMINI_API_KEY", "g")])
            .await
            .unwrap();
        assert!(app.keeper.restart_required());

        let response = app
            .router()
            .oneshot(restart_request())
            .await
            .expect("send request");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["ok"], true);
        assert!(!app.keeper.restart_required());
        assert_eq!(
            app.cli.calls(),
            vec!["gateway stop", "gateway install --force"]
        );
    }
}
