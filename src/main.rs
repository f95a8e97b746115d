use std::sync::Arc;

use bookmarks::config::{Cli, Config, default_config_dir, default_config_path};
use bookmarks::db::Database;
use bookmarks::handler::AppState;
use bookmarks::logging;
use bookmarks::routes;
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    let args = Cli::parse();

    // .env values feed the ${VAR} placeholders in the config file
    dotenvy::dotenv().ok();

    let config_path = match args.config_path {
        Some(path) => std::path::PathBuf::from(path),
        None => {
            if let Err(e) = std::fs::create_dir_all(default_config_dir()) {
                eprintln!("failed to create config directory {:?}: {}", default_config_dir(), e);
                std::process::exit(1);
            }
            default_config_path()
        }
    };

    let cfg = Config::new(&config_path.to_string_lossy()).unwrap_or_else(|e| {
        eprintln!("failed to load config file {:?}: {:#}", config_path, e);
        std::process::exit(1);
    });

    let offset = cfg.app.utc_offset().unwrap_or_else(|e| {
        eprintln!("{:#}", e);
        std::process::exit(1);
    });
    let _log_guard = logging::init(&cfg.log, &cfg.log_dir(), offset).unwrap_or_else(|e| {
        eprintln!("failed to setup logging: {:#}", e);
        std::process::exit(1);
    });
    tracing::info!("bookmarks.svc starting");

    let db = Arc::new(Database::new(&cfg.database_path()).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup database");
        std::process::exit(1);
    }));

    let api_prefix = cfg.app.get_api_prefix();
    let app = routes::app(AppState::new(db, cfg.list), &api_prefix);

    let address = format!("0.0.0.0:{}", cfg.app.get_port());
    let listener = tokio::net::TcpListener::bind(&address).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup tcp listener");
        std::process::exit(1);
    });

    let cancellation_token = CancellationToken::new();
    let shutdown_token = cancellation_token.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("ctrl+c signal received, preparing to shutdown");
                cancellation_token.cancel();
            }
            Err(e) => tracing::warn!(error = %e, "failed to listen for ctrl+c"),
        }
    });

    tracing::info!(api_prefix = %api_prefix, "bookmarks.svc running on {}", &address);
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown_token.cancelled().await })
        .await;

    if let Err(err) = result {
        tracing::error!(error = %err, "server error");
        std::process::exit(1);
    }

    tracing::info!("bookmarks.svc going off, graceful shutdown complete");
}
