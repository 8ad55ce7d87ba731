use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use clawkeeper_core::{
    GatewayCli, Keeper, OpenclawCli, Settings, DEFAULT_GATEWAY_PORT, GATEWAY_STOP,
};
use clawkeeper_server::state::AppState;

#[derive(Parser)]
#[command(
    name = "clawkeeper",
    version,
    about = "Supervisor and credential keeper for the openclaw gateway"
)]
struct Cli {
    #[arg(
        long,
        env = "OPENCLAW_STATE_DIR",
        default_value = "/data/.openclaw",
        help = "Gateway state directory (holds openclaw.json, credentials/, logs/)"
    )]
    state_dir: PathBuf,

    #[arg(long, env = "OPENCLAW_HOME_DIR", default_value = "/data")]
    home_dir: PathBuf,

    #[arg(
        long,
        env = "CLAWKEEPER_ENV_FILE",
        default_value = "/data/.env",
        help = "Credential file of KEY=VALUE lines"
    )]
    env_file: PathBuf,

    #[arg(long, env = "CLAWKEEPER_GATEWAY_BIN", default_value = "openclaw")]
    gateway_bin: String,

    #[arg(long, default_value_t = DEFAULT_GATEWAY_PORT)]
    gateway_port: u16,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Start the gateway and serve the dashboard API")]
    Start {
        #[arg(long, env = "PORT", default_value = "3000", help = "HTTP API server port")]
        port: u16,
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
    },
    #[command(about = "Stop the gateway service")]
    Stop,
    #[command(about = "Print gateway and channel status as JSON")]
    Status,
    #[command(about = "Normalize a freshly onboarded gateway config")]
    NormalizeConfig {
        #[arg(long, env = "OPENCLAW_GATEWAY_TOKEN", hide_env_values = true)]
        gateway_token: Option<String>,
    },
}

impl Cli {
    fn settings(&self) -> Settings {
        Settings {
            state_dir: self.state_dir.clone(),
            home_dir: self.home_dir.clone(),
            env_file: self.env_file.clone(),
            gateway_bin: self.gateway_bin.clone(),
            gateway_port: self.gateway_port,
            ..Settings::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.settings();

    let log_dir = settings.log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "clawkeeper.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    match command {
        Commands::Start { port, host } => {
            run_supervisor(settings, &format!("{host}:{port}")).await?;
        }
        Commands::Stop => {
            let out = OpenclawCli::new(&settings).run(GATEWAY_STOP).await;
            if !out.ok {
                anyhow::bail!("gateway stop failed: {}", out.summary());
            }
            println!("Gateway stopped.");
        }
        Commands::Status => {
            let keeper = Keeper::new(settings);
            let status = keeper.status().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::NormalizeConfig { gateway_token } => {
            let config_path = settings.config_path();
            Keeper::new(settings).normalize_config(gateway_token.as_deref())?;
            println!("Normalized {}", config_path.display());
        }
    }

    Ok(())
}

async fn run_supervisor(settings: Settings, addr: &str) -> Result<()> {
    let keeper = Arc::new(Keeper::new(settings));
    keeper.bootstrap().await;
    let _watcher = keeper.watch_env_file();

    tokio::select! {
        result = clawkeeper_server::serve(AppState::new(Arc::clone(&keeper)), addr) => result?,
        _ = shutdown_signal() => {
            keeper.shutdown().await;
            tracing::info!("Gateway stopped, exiting");
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => tracing::info!("Received SIGINT, shutting down..."),
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        tracing::info!("Received SIGINT, shutting down...");
    }
}
