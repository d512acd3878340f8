use std::time::Duration;

use miette::IntoDiagnostic;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use wind_core::ProgramCache;

use crate::{
    config::{Config, LogFormat},
    handlers::AppState,
    routes::create_router,
};

pub fn init_tracing(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into());

    match config.log_format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer())
                .init();
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

pub async fn start_server(config: Config) -> miette::Result<()> {
    info!("Starting wind-web-api server with config: {:?}", config);

    let state = AppState::new(
        ProgramCache::new(config.source_root.clone(), config.cache_root.clone()),
        config.dispatch_options(),
    );

    let app = create_router(&config, state).layer(TraceLayer::new_for_http().on_response(
        |response: &axum::response::Response, latency: Duration, _span: &tracing::Span| {
            tracing::info!(
                "response latency: {:?}, status: {}",
                latency,
                response.status()
            );
        },
    ));

    let bind_address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .into_diagnostic()?;

    info!("Server running on {}", config.server_url());
    info!(
        "Serving functions from {} (compiled into {})",
        config.source_root.display(),
        config.cache_root.display()
    );

    info!("Configuration options:");
    info!("  WIND_HOST: Host to bind to (default: 0.0.0.0)");
    info!("  WIND_PORT: Port to bind to (default: 8080)");
    info!("  RUST_LOG or WIND_LOG_LEVEL: Log level");
    info!("  WIND_LOG_FORMAT: Log format - 'json' or 'text' (default: json)");
    info!("  WIND_CORS_ORIGINS: Comma-separated CORS origins (default: *)");
    info!("  WIND_SOURCE_ROOT: Function source directory (default: resources/wind)");
    info!("  WIND_CACHE_ROOT: Compiled program directory (default: resources/windc)");
    info!("  WIND_MAX_DEPTH: Maximum nested call depth (default: 128)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .into_diagnostic()?;

    info!("Shutting down wind-web-api server");

    Ok(())
}
