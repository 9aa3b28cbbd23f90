use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, http::Method, routing::get};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use super::{
    services::{health, stream},
    state::AppState,
};
use crate::cache::{DEFAULT_CACHE_TTL, MemoryCache};
use crate::config::Config;
use crate::stream::{GatewaySettings, StreamService};
use crate::upstream::{EmbyClient, HttpConfig};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Routes plus CORS and access logging, without binding a socket.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/stream/{item_id}", get(stream))
        .route("/health", get(health))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Wire the upstream client, cache and signer from `config` and serve until
/// Ctrl+C or SIGTERM. SIGHUP re-reads `config_path` and swaps the gateway
/// settings in place.
pub async fn run(
    config: Config,
    config_path: Option<PathBuf>,
    address: SocketAddr,
) -> Result<(), AnyError> {
    let emby_url = config
        .emby
        .full_url()
        .map_err(|e| format!("Invalid emby url '{}': {}", config.emby.url, e))?;
    info!(url = %emby_url, "Using Emby upstream");

    let http = HttpConfig {
        request_timeout: Duration::from_secs(config.emby.timeout_secs),
        ..HttpConfig::default()
    };
    let emby = EmbyClient::new(&emby_url, config.emby.api_key.clone(), http)
        .map_err(|e| format!("Failed to build Emby client: {}", e))?;

    let cache = Arc::new(MemoryCache::new(DEFAULT_CACHE_TTL));
    let sweeper = (config.server.cache_sweep_secs > 0)
        .then(|| cache.spawn_sweeper(Duration::from_secs(config.server.cache_sweep_secs)));

    let settings = GatewaySettings::from_config(&config)
        .map_err(|e| format!("Failed to initialise signer: {}", e))?;
    info!(backends = settings.router.len(), "Loaded backends");

    let service = Arc::new(
        StreamService::builder()
            .settings(settings)
            .cache(cache)
            .source(Arc::new(emby))
            .build(),
    );

    let reloader = tokio::spawn(reload_on_hangup(Arc::clone(&service), config_path));

    let app = build_router(AppState::new(service));

    let listener = TcpListener::bind(address).await?;
    info!(%address, "streamsign listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    reloader.abort();
    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }

    Ok(())
}

/// Reload the configuration on every SIGHUP. A configuration that fails to
/// load or validate leaves the running settings untouched.
#[cfg(unix)]
async fn reload_on_hangup(service: Arc<StreamService>, config_path: Option<PathBuf>) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(e) => {
            warn!(error = %e, "Failed to install SIGHUP handler, reload disabled");
            return;
        }
    };

    while hangup.recv().await.is_some() {
        info!("SIGHUP received, reloading configuration");
        if let Err(e) = reload(&service, config_path.as_deref()) {
            error!(error = %e, "Configuration reload failed, keeping previous settings");
        }
    }
}

#[cfg(not(unix))]
async fn reload_on_hangup(_service: Arc<StreamService>, _config_path: Option<PathBuf>) {}

#[cfg_attr(not(unix), allow(dead_code))]
fn reload(service: &StreamService, config_path: Option<&std::path::Path>) -> Result<(), AnyError> {
    let config = Config::load(config_path)?;
    let settings = GatewaySettings::from_config(&config)?;
    service.reload(settings);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received");
}
