//! Axum HTTP routes for the control surface.

use super::runs::RunRegistry;
use crate::checkpoint::SharedStore;
use crate::config::{HashPolicy, ScanConfig, DEFAULT_BATCH_SIZE, DEFAULT_HASH_MAX_MB};
use crate::error::{ServerError, ServerResult, StorageError};
use crate::sink::SharedSink;
use crate::status::StatusHandle;
use crate::storage::SharedBackend;
use crate::walker::Coordinator;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

/// Opens the backend for a storage account named in a request
pub type BackendFactory = Arc<dyn Fn(&str) -> Result<SharedBackend, StorageError> + Send + Sync>;

/// Shared application state
pub struct AppState {
    pub runs: RunRegistry,
    pub sink: SharedSink,
    pub store: SharedStore,
    pub backend_factory: BackendFactory,
}

// ─── Route builder ───────────────────────────────────────────────

pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/scans", get(list_scans).post(start_scan))
        .route("/scans/:execution_id", get(get_scan))
        .route("/scans/:execution_id/cancel", post(cancel_scan));

    Router::new()
        .nest("/api", api)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ─── Handlers ────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "share-inventory",
    }))
}

/// Request body for starting a scan
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartScanRequest {
    pub storage_account_name: Option<String>,
    pub file_share_names: Vec<String>,
    pub skip_hash_computation: Option<bool>,
    pub batch_size: Option<usize>,
    #[serde(rename = "maxFileSizeForHashMB")]
    pub max_file_size_for_hash_mb: Option<u64>,
    pub exclude_patterns: Option<Vec<String>>,
    pub namespace_concurrency: Option<usize>,
    pub delivery_attempts: Option<u32>,
}

impl StartScanRequest {
    /// Build and validate the run configuration
    pub fn into_config(self) -> ServerResult<ScanConfig> {
        let account = self
            .storage_account_name
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .ok_or_else(|| ServerError::InvalidParameter {
                name: "storageAccountName".into(),
                reason: "is required".into(),
            })?;

        let hash = if self.skip_hash_computation.unwrap_or(true) {
            HashPolicy::disabled()
        } else {
            HashPolicy::up_to_mb(self.max_file_size_for_hash_mb.unwrap_or(DEFAULT_HASH_MAX_MB))
        };

        let mut config = ScanConfig::new(account)
            .with_namespaces(self.file_share_names)
            .with_batch_size(self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE))
            .with_hash_policy(hash);
        if let Some(patterns) = self.exclude_patterns {
            config = config.with_exclude_patterns(patterns);
        }
        if let Some(count) = self.namespace_concurrency {
            config = config.with_namespace_concurrency(count);
        }
        if let Some(attempts) = self.delivery_attempts {
            config = config.with_delivery_attempts(attempts);
        }

        config.validate()?;
        Ok(config)
    }
}

async fn start_scan(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StartScanRequest>,
) -> ServerResult<impl IntoResponse> {
    let config = body.into_config()?;
    let execution_id = config.execution_id.clone();
    let account = config.storage_account.clone();

    let backend = (state.backend_factory)(&account)
        .map_err(|e| ServerError::Other(format!("Cannot open storage account: {}", e)))?;

    let cancel = Arc::new(AtomicBool::new(false));
    let status = StatusHandle::new(&execution_id, &account);
    let coordinator = Coordinator::new(backend, Arc::clone(&state.sink), Arc::clone(&state.store))
        .with_cancel_flag(Arc::clone(&cancel))
        .with_status(status.clone());
    state.runs.register(&execution_id, status, cancel);

    let runs = state.runs.clone();
    let run_id = execution_id.clone();
    tokio::spawn(async move {
        match coordinator.run(config).await {
            Ok(report) => info!(execution_id = %run_id, status = %report.status, "Scan finished"),
            Err(e) => {
                error!(execution_id = %run_id, error = %e, "Scan aborted");
                runs.mark_failed(&run_id, e.to_string());
            }
        }
    });

    info!(execution_id = %execution_id, account = %account, "Scan started");
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "executionId": execution_id,
            "storageAccount": account,
            "startTime": Utc::now().to_rfc3339(),
            "statusQueryUri": format!("/api/scans/{}", execution_id),
            "cancelUri": format!("/api/scans/{}/cancel", execution_id),
        })),
    ))
}

async fn list_scans(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let scans = state.runs.list();
    Json(serde_json::json!({
        "count": scans.len(),
        "scans": scans,
    }))
}

async fn get_scan(
    State(state): State<Arc<AppState>>,
    Path(execution_id): Path<String>,
) -> ServerResult<impl IntoResponse> {
    let view = state
        .runs
        .get(&execution_id)
        .ok_or_else(|| ServerError::ScanNotFound(execution_id.clone()))?;
    Ok(Json(view))
}

async fn cancel_scan(
    State(state): State<Arc<AppState>>,
    Path(execution_id): Path<String>,
) -> ServerResult<impl IntoResponse> {
    if !state.runs.cancel(&execution_id) {
        return Err(ServerError::ScanNotFound(execution_id));
    }
    info!(execution_id = %execution_id, "Cancel requested");
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "executionId": execution_id,
            "cancelRequested": true,
        })),
    ))
}

// ─── Server startup ──────────────────────────────────────────────

/// Start the control surface and serve until Ctrl-C
pub async fn serve(state: AppState, bind: &str, port: u16) -> ServerResult<()> {
    let router = build_router(Arc::new(state));
    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .map_err(|e| ServerError::Other(format!("Invalid bind address: {}", e)))?;

    eprintln!("Control surface listening on http://{}", addr);
    eprintln!("API endpoints:");
    eprintln!("  GET  /api/health");
    eprintln!("  GET  /api/scans");
    eprintln!("  POST /api/scans");
    eprintln!("  GET  /api/scans/:execution_id");
    eprintln!("  POST /api/scans/:execution_id/cancel");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Io)?;

    eprintln!("\nServer shut down.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for Ctrl-C; serving until killed");
        std::future::pending::<()>().await;
    }
    eprintln!("\nShutting down gracefully...");
}
