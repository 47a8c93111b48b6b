use std::sync::Arc;
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info};

use crate::db::operations::analytics;
use crate::db::DatabaseProxy;

/// Recomputes `engagement_metrics` for `date`, or today (UTC) when none is given.
pub async fn run_engagement_rollup(
    db: Arc<DatabaseProxy>,
    date: Option<NaiveDate>,
) -> Result<u64, super::WorkerError> {
    let start = Instant::now();
    let date = date.unwrap_or_else(|| Utc::now().date_naive());
    debug!(%date, "Starting engagement rollup");

    let students = analytics::update_engagement_for_date(&db, date).await?;

    info!(
        %date,
        students,
        duration_secs = format!("{:.2}", start.elapsed().as_secs_f64()),
        "Engagement rollup completed"
    );

    Ok(students)
}
