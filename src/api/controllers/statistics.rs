use std::str::FromStr;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, warn};
use crate::api::{AdminSession, ApiContext, ApiError, Result};
use crate::entities::{Counter, Statistic, StatisticType};
use crate::error::CatalogError;

pub fn router() -> Router<ApiContext> {
    Router::new()
        .route("/api/statistics", get(list_statistics))
}

#[derive(Deserialize, Debug, Default)]
struct StatisticsQuery {
    #[serde(rename = "type")]
    kind: Option<String>,
}

async fn list_statistics(
    _admin: AdminSession,
    State(ctx): State<ApiContext>,
    query: std::result::Result<Query<StatisticsQuery>, QueryRejection>,
) -> Result<Json<Vec<Statistic>>> {
    let Query(query) = query?;
    let kind = match query.kind.as_deref().map(str::trim).filter(|x| !x.is_empty()) {
        Some(kind) => Some(StatisticType::from_str(kind).map_err(ApiError::from_catalog("Failed to fetch statistics"))?),
        None => None,
    };
    flush_or_warn(&ctx).await;
    let db = ctx.db.read().await;
    db.ensure_connected().map_err(ApiError::from_catalog("Failed to fetch statistics"))?;
    Ok(Json(db.list_statistics(kind)))
}

/// Counts one event for the current period. The count is buffered in memory
/// and stored by the next [`flush`].
pub(crate) fn count(ctx: &ApiContext, counter: Counter) {
    ctx.statistics.add(counter, Utc::now());
}

/// Stores the buffered counts as a single log write. On failure the counts go
/// back into the buffer for the next attempt.
pub(crate) async fn flush(ctx: &ApiContext) -> std::result::Result<(), CatalogError> {
    let counts = ctx.statistics.take();
    if counts.is_empty() {
        return Ok(());
    }
    let mut db = ctx.db.write().await;
    match db.record(&counts, Utc::now()).await {
        Ok(()) => {
            debug!(periods = counts.len(), "statistics flushed");
            Ok(())
        }
        Err(err) => {
            ctx.statistics.restore(counts);
            Err(err)
        }
    }
}

/// Flushes before statistics are read. A failed flush never fails the read.
pub(crate) async fn flush_or_warn(ctx: &ApiContext) {
    if let Err(err) = flush(ctx).await {
        warn!(error = ?err, "failed to store statistics");
    }
}
