//! Bed Monitoring API Server
//!
//! REST API and WebSocket server for the bed monitoring dashboard.

use alerting::{AlertConfig, AlertManager};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, MethodRouter},
    Json, Router,
};
use data_validator::Validator;
use ledger::Ledger;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use storage::Repository;
use tokio::sync::Mutex;
use tower_governor::GovernorLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

pub mod error;
pub mod rate_limit;
pub mod routes;
pub mod settings;

pub use error::ApiError;
pub use settings::{ConfigError, ServiceConfig};

use rate_limit::{create_governor_config, IngestGovernorConfig};

/// Application state shared across handlers
pub struct AppState {
    /// Reading ledger (owns the storage repository)
    pub ledger: Ledger,
    /// Per-viewer alert sessions
    pub alerts: Mutex<AlertManager>,
    /// Payload validator
    pub validator: Validator,
    /// Prometheus exporter, when installed
    pub metrics: Option<PrometheusHandle>,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: Instant,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Create new application state
    pub fn new(ledger: Ledger, alert_config: AlertConfig, validator: Validator) -> Self {
        Self {
            ledger,
            alerts: Mutex::new(AlertManager::new(alert_config)),
            validator,
            metrics: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
        }
    }

    /// Attach a Prometheus handle served at `/metrics`
    pub fn with_metrics(mut self, handle: Option<PrometheusHandle>) -> Self {
        self.metrics = handle;
        self
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: ComponentStatus,
    pub metrics: SystemMetrics,
}

/// Component status
#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    pub database: ComponentHealth,
}

/// Individual component health
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: String,
    pub error: Option<String>,
}

/// System metrics
#[derive(Debug, Serialize)]
pub struct SystemMetrics {
    pub reading_count: i64,
    pub patient_count: i64,
    pub live_subscribers: usize,
    pub alert_sessions: usize,
}

/// Create the application router without rate limiting
pub fn create_router(state: SharedState) -> Router {
    build_router(state, None)
}

/// Create the application router with the ingest routes rate limited
pub fn create_router_with_rate_limit(
    state: SharedState,
    governor: Arc<IngestGovernorConfig>,
) -> Router {
    build_router(state, Some(governor))
}

fn build_router(state: SharedState, governor: Option<Arc<IngestGovernorConfig>>) -> Router {
    let limited = |route: MethodRouter<SharedState>| match &governor {
        Some(config) => route.layer(GovernorLayer {
            config: Arc::clone(config),
        }),
        None => route,
    };

    Router::new()
        .route("/update", limited(get(routes::readings::ingest_legacy)))
        .route(
            "/api/v1/readings",
            limited(post(routes::readings::ingest)).get(routes::readings::list_readings),
        )
        .route(
            "/api/v1/patients",
            get(routes::patients::get_patient).post(routes::patients::save_patient),
        )
        .route("/api/v1/stats/patients", get(routes::patients::patient_count))
        .route("/api/v1/stats/rooms", get(routes::patients::room_count))
        .route("/api/v1/rooms/:room", get(routes::rooms::get_room))
        .route("/api/v1/alerts", get(routes::alerts::get_alerts))
        .route("/api/v1/ws", get(routes::live::live_feed))
        .route("/api/v1/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let repository = state.ledger.repository();
    let counts = async {
        let readings = repository.reading_count().await?;
        let patients = repository.patient_count().await?;
        Ok::<_, storage::StorageError>((readings, patients))
    }
    .await;

    let (database, reading_count, patient_count) = match counts {
        Ok((readings, patients)) => (
            ComponentHealth {
                status: "ok".to_string(),
                error: None,
            },
            readings,
            patients,
        ),
        Err(e) => {
            warn!("Health check database query failed: {}", e);
            (
                ComponentHealth {
                    status: "error".to_string(),
                    error: Some(e.to_string()),
                },
                0,
                0,
            )
        }
    };

    let status = if database.error.is_none() {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        components: ComponentStatus { database },
        metrics: SystemMetrics {
            reading_count,
            patient_count,
            live_subscribers: state.ledger.subscriber_count(),
            alert_sessions: state.alerts.lock().await.session_count(),
        },
    })
}

/// Prometheus scrape handler
async fn metrics_handler(State(state): State<SharedState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics exporter not installed".to_string()),
    }
}

/// Initialize logging
pub fn init_logging(level: &str, json: bool) {
    let level = Level::from_str(level).unwrap_or(Level::INFO);
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    let result = if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };

    if let Err(e) = result {
        eprintln!("Tracing subscriber already set: {}", e);
    }
}

/// Drop alert sessions of viewers that stopped polling
fn spawn_session_pruner(state: SharedState) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            state.alerts.lock().await.prune(Instant::now());
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Run the server
pub async fn run_server(config: ServiceConfig) -> anyhow::Result<()> {
    config.validate()?;

    let repository =
        Repository::connect(&config.database.url, config.database.max_connections).await?;
    let ledger = Ledger::new(repository.clone(), config.ledger.clone())?;

    let metrics = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Prometheus exporter not installed: {}", e);
            None
        }
    };

    let state: SharedState = Arc::new(
        AppState::new(
            ledger,
            config.alerting.clone(),
            Validator::new(config.validation.clone()),
        )
        .with_metrics(metrics),
    );
    spawn_session_pruner(Arc::clone(&state));

    let app = if config.rate_limit.enabled {
        create_router_with_rate_limit(state, create_governor_config(&config.rate_limit)?)
    } else {
        create_router(state)
    };

    info!("Starting API server on {}", config.server.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    repository.close().await;
    info!("Server stopped");
    Ok(())
}
