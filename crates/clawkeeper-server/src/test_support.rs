use std::sync::Arc;

use axum::{body::Body, http::Response, Router};

use clawkeeper_core::testing::{FakeLauncher, RecordingCli, ScriptedProbe};
use clawkeeper_core::{Keeper, KeeperDeps, MemoryEnv, Settings};

use crate::state::AppState;

pub struct TestApp {
    _dir: tempfile::TempDir,
    pub settings: Settings,
    pub keeper: Arc<Keeper>,
    pub env: Arc<MemoryEnv>,
    pub cli: Arc<RecordingCli>,
}

impl TestApp {
    pub fn new(onboarded: bool) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let settings = Settings {
            env_file: dir.path().join(".env"),
            ..Settings::for_state_dir(dir.path().join("state"))
        };
        std::fs::create_dir_all(&settings.state_dir).expect("create state dir");
        if onboarded {
            std::fs::write(settings.config_path(), r#"{"channels":{}}"#).expect("write config");
        }
        let env = Arc::new(MemoryEnv::new());
        let cli = Arc::new(RecordingCli::new());
        let keeper = Arc::new(Keeper::with_deps(
            settings.clone(),
            KeeperDeps {
                env: env.clone(),
                cli: cli.clone(),
                launcher: Arc::new(FakeLauncher::new()),
                probe: Arc::new(ScriptedProbe::always(false)),
            },
        ));
        Self {
            _dir: dir,
            settings,
            keeper,
            env,
            cli,
        }
    }

    pub fn router(&self) -> Router {
        crate::create_router(AppState::new(self.keeper.clone()))
    }
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse body")
}
