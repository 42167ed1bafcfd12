mod handlers;

use axum::{Router, routing};
use handlers::{handle_webhook, root};
use scm_hooks::gitee::WebhookService;
use scm_hooks::logging::{FileLogger, setup_logging};
use scm_hooks::{AppState, RelayConfig};
use std::sync::Arc;
use tracing::{error, info};

const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8888";
const DEFAULT_CONFIG_PATH: &str = "hook_config.toml";

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let bind_address =
        std::env::var("BIND_ADDRESS").unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_string());
    let config_path =
        std::env::var("HOOK_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let config = match RelayConfig::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let file_logger = config.log_dir.clone().map(|dir| {
        let logger = FileLogger::new(dir);
        match config.log_max_files {
            Some(max_files) => logger.with_max_files(max_files),
            None => logger,
        }
    });
    // Held for the lifetime of the server so buffered file logs get flushed.
    let _log_guard = match setup_logging(file_logger.as_ref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to set up logging: {}", e);
            std::process::exit(1);
        }
    };

    if let (Some(dir), Some(logger)) = (&config.log_dir, &file_logger) {
        info!(
            "Writing logs to {:?}, keeping {} files",
            dir,
            logger.max_files()
        );
    }

    let service = WebhookService::new(config.schema);
    info!(
        "Loaded {} repository entries, payload schema {:?}",
        config.repository.len(),
        service.schema()
    );

    let state = Arc::new(AppState { service, config });

    let app = Router::new()
        .route("/", routing::get(root))
        .route("/webhook", routing::post(handle_webhook))
        .with_state(state);

    info!("Listening on {}", bind_address);
    info!("Using config at {:?}", config_path);
    let listener = match tokio::net::TcpListener::bind(&bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", bind_address, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
