use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use sqlx::PgPool;
use std::time::Instant;

use crate::api::middleware::session::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Healthy,
    Unhealthy,
    Configured,
    NotConfigured,
}

#[derive(Debug, Serialize)]
pub struct Check {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u128>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Dependencies {
    pub database: Check,
    pub email: Check,
    pub google_wallet: Check,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: Status,
    pub timestamp: String,
    pub version: &'static str,
    pub dependencies: Dependencies,
}

/// Optional integrations are reported but never fail the check.
fn integration(enabled: bool) -> Check {
    Check {
        status: if enabled {
            Status::Configured
        } else {
            Status::NotConfigured
        },
        response_time_ms: None,
        error: None,
    }
}

async fn ping_database(pool: &PgPool) -> Check {
    let started = Instant::now();
    let result = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await;
    let elapsed = Some(started.elapsed().as_millis());

    match result {
        Ok(_) => Check {
            status: Status::Healthy,
            response_time_ms: elapsed,
            error: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            Check {
                status: Status::Unhealthy,
                response_time_ms: elapsed,
                error: Some(e.to_string()),
            }
        }
    }
}

/// 200 while the database answers, 503 otherwise
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let database = ping_database(&state.pool).await;
    let healthy = database.status == Status::Healthy;

    let report = HealthReport {
        status: if healthy { Status::Healthy } else { Status::Unhealthy },
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION"),
        dependencies: Dependencies {
            database,
            email: integration(state.config.sendgrid_api_key.is_some()),
            google_wallet: integration(state.wallet.is_some()),
        },
    };

    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(report))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
