use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tracing::info;

use camerpulse_common::{QuotaStatus, QUOTA_WINDOW_DAYS};

use crate::traits::GenerationStore;

/// Start of the trailing quota window ending at `now`.
pub fn window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(QUOTA_WINDOW_DAYS)
}

/// Count generations in the trailing window. Recomputed on every call.
///
/// This is the cheap pre-check that avoids an LLM call when the cap is
/// visibly reached; the authoritative check happens inside the write
/// transaction (see `GenerationStore::commit_generation`).
pub async fn check_quota(
    store: &dyn GenerationStore,
    max_per_week: u32,
    now: DateTime<Utc>,
) -> Result<QuotaStatus> {
    let used = store.count_generations_since(window_start(now)).await?;
    let status = QuotaStatus {
        used,
        max_per_week,
        window_days: QUOTA_WINDOW_DAYS,
    };

    info!(
        used = status.used,
        max = status.max_per_week,
        exhausted = status.is_exhausted(),
        "Quota checked"
    );

    Ok(status)
}
