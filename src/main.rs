use std::sync::Arc;

use crewgate::api;
use crewgate::auth::build_allowed_key_set;
use crewgate::config::{load_config, AppConfig};
use crewgate::observability::init_tracing;
use crewgate::state::AppState;
use crewgate::transport::build_http_client;

fn main() {
    let config = load_config("config.yaml").unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {e}");
        eprintln!("Please copy 'config.example.yaml' to 'config.yaml' and modify as needed.");
        std::process::exit(1);
    });

    init_tracing(&config.features.log_level);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_io()
        .enable_time()
        .build()
        .unwrap_or_else(|e| {
            eprintln!("Failed to initialize Tokio runtime: {e}");
            std::process::exit(1);
        });

    runtime.block_on(async move {
        run(config).await;
    });
}

async fn run(config: AppConfig) {
    let host = config.server.host.clone();
    let port = config.server.port;

    let http = build_http_client(&config.server).unwrap_or_else(|e| {
        eprintln!("Failed to build HTTP client: {e}");
        std::process::exit(1);
    });
    let allowed_client_keys = build_allowed_key_set(&config);
    let state = Arc::new(AppState::new(config, http, allowed_client_keys));

    tracing::info!("crewgate starting on {}:{}", host, port);

    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}"))
        .await
        .unwrap_or_else(|err| {
            eprintln!("Failed to bind to {host}:{port}: {err}");
            std::process::exit(1);
        });

    tracing::info!("crewgate is ready to accept connections");

    if let Err(err) = axum::serve(listener, api::router(state)).await {
        eprintln!("Server error: {err}");
        std::process::exit(1);
    }
}
