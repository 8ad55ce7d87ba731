use axum::{extract::State, routing::get, Json, Router};

use clawkeeper_schema::StatusResponse;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_status))
}

async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(state.keeper.status().await)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    use clawkeeper_core::ProcessEnv;

    use crate::test_support::{body_json, TestApp};

    #[tokio::test]
    async fn test_status_before_onboarding() {
        let app = TestApp::new(false);
        let response = app
            .router()
            .oneshot(
                Request::builder()
                    .uri("/api/status")
                    .body(Body::empty())
                    .expect("build request"),
            )
            .await
            .expect("send request");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["gateway"], "not_onboarded");
        assert_eq!(body["configExists"], false);
        assert_eq!(body["channels"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_status_reports_channel_pairing() {
        let app = TestApp::new(true);
        std::fs::write(
            app.settings.config_path(),
            r#"{"channels":{"discord":{"enabled":true}}}"#,
        )
        .unwrap();
        app.env.set("DISCORD_BOT_TOKEN", "d-token");
        let creds = app.settings.credentials_dir();
        std::fs::create_dir_all(&creds).unwrap();
        std::fs::write(
            creds.join("discord-main-allowFrom.json"),
            r#"{"allowFrom":["a","b"]}"#,
        )
        .unwrap();

        let response = app
            .router()
            .oneshot(
                Request::builder()
                    .uri("/api/status")
                    .body(Body::empty())
                    .expect("build request"),
            )
            .await
            .expect("send request");

        let body = body_json(response).await;
        assert_eq!(body["gateway"], "starting");
        assert_eq!(body["channels"]["discord"]["status"], "paired");
        assert_eq!(body["channels"]["discord"]["paired"], 2);
    }
}
