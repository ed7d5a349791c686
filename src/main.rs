mod cache;
mod config;
mod error;
mod extractors;
mod forecast;
mod openapi;
mod provider;
mod routes;
mod weather;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use reqwest::Client;
use std::{sync::Arc, time::Duration};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cache::TtlCache;
use crate::config::AppConfig;
use crate::error::Envelope;
use crate::provider::{ApiCallBudget, OpenWeatherMapClient};
use crate::weather::WeatherService;

/// Shared HTTP client configuration
const HTTP_CONNECT_TIMEOUT_SECS: u64 = 5;
const HTTP_POOL_IDLE_TIMEOUT_SECS: u64 = 90;

#[derive(Clone)]
pub struct AppState {
    pub weather_service: Arc<WeatherService>,
    pub cache: Arc<TtlCache<String, Envelope>>,
    pub budget: Option<Arc<ApiCallBudget>>,
    pub metrics: Option<PrometheusHandle>,
}

/// Create shared HTTP client with connection pooling
fn create_http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
        .pool_idle_timeout(Duration::from_secs(HTTP_POOL_IDLE_TIMEOUT_SECS))
        .pool_max_idle_per_host(10)
        .build()
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weather_relay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load()?;
    tracing::info!("Configuration loaded successfully");

    let metrics = if config.metrics_enabled {
        Some(PrometheusBuilder::new().install_recorder()?)
    } else {
        None
    };

    let http_client = create_http_client(config.provider_timeout())?;
    tracing::debug!("Shared HTTP client created");

    let budget = config
        .provider_daily_call_limit
        .map(|limit| Arc::new(ApiCallBudget::new(limit)));

    let mut provider = OpenWeatherMapClient::new(
        http_client,
        &config.openweathermap_url,
        &config.openweathermap_api_key,
    );
    if let Some(budget) = &budget {
        tracing::info!(daily_limit = budget.daily_limit(), "Provider call budget enabled");
        provider = provider.with_budget(Arc::clone(budget));
    }

    let cache = Arc::new(TtlCache::new());
    let weather_service = Arc::new(WeatherService::new(
        Arc::new(provider),
        Arc::clone(&cache),
        config.cache_ttl(),
    ));

    let state = AppState {
        weather_service,
        cache,
        budget,
        metrics,
    };

    let app = routes::build_router(state);

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        address = %addr,
        cache_ttl_secs = config.cache_ttl_secs,
        "Server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}
