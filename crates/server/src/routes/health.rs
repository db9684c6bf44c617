use axum::{extract::State, Json};
use taskboard_api::HealthResponse;

use crate::storage::Db;

/// GET /api/health: liveness plus a trivial database round-trip.
///
/// Always answers 200; `status` is `"degraded"` when SQLite is unreachable.
pub async fn health(State(db): State<Db>) -> Json<HealthResponse> {
    let db_ok = db
        .conn()
        .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
        .inspect_err(|e| tracing::error!("health check query failed: {e}"))
        .is_ok();

    Json(HealthResponse {
        status: if db_ok { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
