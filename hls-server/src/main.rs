//! HLS streaming server
//!
//! Serves just-in-time transcoded HLS (MPEG-TS) for any video file under
//! `media_root`, backed by `hls_core::StreamingFacade`.

use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hls_server::config::ServerConfig;
use hls_server::error::Result;
use hls_server::http::create_router;
use hls_server::state::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const APP_NAME: &str = "hls-server";

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config = if std::path::Path::new(&config_path).exists() {
        match hls_server::config_file::ConfigFile::from_file(&config_path) {
            Ok(cf) => cf.into_server_config(),
            Err(e) => {
                eprintln!("failed to load config file {config_path}: {e}. Using defaults.");
                ServerConfig::default()
            }
        }
    } else {
        ServerConfig::default()
    };

    init_logging(&config);

    tracing::info!("{} v{} starting", APP_NAME, VERSION);
    tracing::info!(?config, "configuration loaded");

    let state = Arc::new(AppState::new(config.clone()));
    let app = create_router(state.clone());

    let addr: SocketAddr = config
        .socket_addr()
        .parse()
        .map_err(|e| hls_server::error::ServerError::Config(format!("invalid socket address: {e}")))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", addr);

    let shutdown_state = state.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_state))
    .await?;

    Ok(())
}

async fn shutdown_signal(state: Arc<AppState>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining encoder subprocesses");
    state.shutdown();
    state.drain_subprocesses().await;
}

fn init_logging(config: &ServerConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("hls_server={},tower_http=info", config.log_level).into());

    let registry = tracing_subscriber::registry().with(filter);

    if config.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
