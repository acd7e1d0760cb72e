// src/main.rs
use anyhow::{Context, Result};
use axum::http::StatusCode as AxumStatusCode;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{FixedOffset, NaiveDate, Utc};
use clap::Parser;
use serde::Deserialize;
use std::{net::SocketAddr, sync::Arc};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

mod archive;
mod config;
mod fines;
mod incentive;
mod model;
mod period;
mod recurrence;
mod report;
mod reset;
mod store;

use config::{AppConfig, Cli};
use fines::charge_missing_daily_task_fines;
use incentive::{calculate_for_employee, IncentivePeriod};
use model::EntityId;
use period::business_date;
use report::build_report;
use reset::ResetExecutor;
use store::{DataStore, DirectoryResolver};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (AxumStatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (AxumStatusCode::NOT_FOUND, msg.clone()),
            AppError::Internal(e) => {
                error!("internal error: {:?}", e);
                (
                    AxumStatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[derive(Clone)]
struct AppState {
    store: DataStore,
    executor: ResetExecutor,
    tz: FixedOffset,
    config: Arc<AppConfig>,
}

#[derive(Debug, Deserialize)]
struct RangeParams {
    from: NaiveDate,
    to: NaiveDate,
}

impl RangeParams {
    fn validated(self) -> Result<(NaiveDate, NaiveDate), AppError> {
        if self.from > self.to {
            return Err(AppError::BadRequest(format!(
                "from {} is after to {}",
                self.from, self.to
            )));
        }
        Ok((self.from, self.to))
    }
}

#[derive(Debug, Deserialize)]
struct SweepParams {
    /// Business date to check; defaults to today in the business timezone.
    date: Option<NaiveDate>,
}

async fn handle_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "collections": state.store.counts(),
    }))
}

async fn handle_seed(
    State(state): State<AppState>,
    Json(snapshot): Json<store::Snapshot>,
) -> impl IntoResponse {
    state.store.load_snapshot(snapshot);
    Json(serde_json::json!({ "loaded": state.store.counts() }))
}

async fn handle_reset_all(State(state): State<AppState>) -> impl IntoResponse {
    let summary = state.executor.reset_all(Utc::now()).await;
    Json(summary)
}

async fn handle_reset_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let summary = state
        .executor
        .reset_for_project(&EntityId::new(id), Utc::now())
        .await;
    Json(summary)
}

async fn handle_reset_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let summary = state
        .executor
        .reset_for_user(&EntityId::new(id), Utc::now())
        .await;
    Json(summary)
}

async fn handle_daily_task_check(
    State(state): State<AppState>,
    Query(params): Query<SweepParams>,
) -> impl IntoResponse {
    let now = Utc::now();
    let date = params.date.unwrap_or_else(|| business_date(now, state.tz));
    let summary = charge_missing_daily_task_fines(
        &state.store,
        date,
        &state.config.daily_task_deadline,
        now,
        state.tz,
    );
    Json(summary)
}

async fn handle_incentives(
    State(state): State<AppState>,
    Path(employee): Path<String>,
    Query(params): Query<RangeParams>,
) -> Result<impl IntoResponse, AppError> {
    let (from, to) = params.validated()?;
    let employee_id = EntityId::new(employee);
    if state.store.employee(&employee_id).is_err() {
        return Err(AppError::NotFound(format!("employee {}", employee_id)));
    }
    let calculation = calculate_for_employee(
        &state.store,
        &employee_id,
        IncentivePeriod::new(from, to),
        Utc::now(),
        state.tz,
    )?;
    Ok(Json(calculation))
}

async fn handle_report(
    State(state): State<AppState>,
    Query(params): Query<RangeParams>,
) -> Result<impl IntoResponse, AppError> {
    let (from, to) = params.validated()?;
    let report = build_report(&state.store, from, to, Utc::now(), state.tz);
    Ok(Json(report))
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(handle_status))
        .route("/api/seed", post(handle_seed))
        .route("/api/reset/all", post(handle_reset_all))
        .route("/api/reset/project/{id}", post(handle_reset_project))
        .route("/api/reset/user/{id}", post(handle_reset_user))
        .route("/api/fines/daily-task-check", post(handle_daily_task_check))
        .route("/api/incentives/{employee}", get(handle_incentives))
        .route("/api/report", get(handle_report))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Setting tracing subscriber failed")?;
    info!("Tracing subscriber initialized.");

    let mut config = AppConfig::from_env().context("loading configuration")?;
    config.apply_cli(&cli);
    let tz = config.business_offset()?;
    info!(
        host = %config.server_host,
        port = config.server_port,
        offset_minutes = config.business_tz_offset_minutes,
        "configuration loaded"
    );

    let store = DataStore::new();
    let executor = ResetExecutor::new(
        store.clone(),
        Arc::new(store.clone()),
        Arc::new(DirectoryResolver::new(store.clone())),
        tz,
    );
    let state = AppState {
        store,
        executor,
        tz,
        config: Arc::new(config.clone()),
    };

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port)
        .parse()
        .context("parsing bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!(%addr, "listening");
    axum::serve(listener, router(state))
        .await
        .context("server terminated")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_state() -> AppState {
        let store = DataStore::new();
        let tz = FixedOffset::east_opt(0).unwrap();
        let executor = ResetExecutor::new(
            store.clone(),
            Arc::new(store.clone()),
            Arc::new(DirectoryResolver::new(store.clone())),
            tz,
        );
        AppState {
            store,
            executor,
            tz,
            config: Arc::new(AppConfig {
                server_host: "127.0.0.1".into(),
                server_port: 0,
                business_tz_offset_minutes: 0,
                daily_task_deadline: "10:00".into(),
            }),
        }
    }

    #[tokio::test]
    async fn seed_then_status_reports_collection_counts() {
        let state = test_state();
        let snapshot: store::Snapshot = serde_json::from_value(serde_json::json!({
            "employees": [
                { "id": "emp-1", "name": "Asha", "joined_on": "2023-01-01", "approved": true }
            ],
            "tasks": [],
        }))
        .unwrap();
        state.store.load_snapshot(snapshot);
        assert_eq!(state.store.counts()["employees"], 1);
    }

    #[tokio::test]
    async fn incentive_route_rejects_inverted_ranges() {
        let params = RangeParams {
            from: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            to: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        };
        assert!(matches!(params.validated(), Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn incentive_handler_404s_for_unknown_employees() {
        let state = test_state();
        let result = handle_incentives(
            State(state),
            Path("ghost".to_string()),
            Query(RangeParams {
                from: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
                to: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            }),
        )
        .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn reset_endpoint_summary_counts_flow_through() {
        let state = test_state();
        // An empty store sweeps nothing but still reports a summary.
        let summary = state
            .executor
            .reset_all(Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap())
            .await;
        assert_eq!(summary.applied, 0);
        assert_eq!(summary.errored, 0);
    }
}
