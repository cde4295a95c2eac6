use chrono::{DateTime, TimeDelta, Utc};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use camerpulse_common::{
    AuditRecord, CommitOutcome, GeneratedPoll, GenerationMethod, GenerationSettings, PulseError,
    Signal,
};

use crate::quota::window_start;
use crate::synthesizer::Synthesis;
use crate::traits::GenerationStore;

/// Expiry `poll_duration_days` after `now`. Out-of-range durations are a
/// configuration error, never a panic.
pub fn expiry(now: DateTime<Utc>, poll_duration_days: i64) -> Result<DateTime<Utc>, PulseError> {
    TimeDelta::try_days(poll_duration_days)
        .and_then(|d| now.checked_add_signed(d))
        .ok_or_else(|| {
            PulseError::Config(format!("poll duration of {poll_duration_days} days is out of range"))
        })
}

/// Assemble the poll and its audit row from one synthesis.
pub fn build_records(
    signal: &Signal,
    synthesis: &Synthesis,
    settings: &GenerationSettings,
    now: DateTime<Utc>,
) -> Result<(GeneratedPoll, AuditRecord), PulseError> {
    let expires_at = expiry(now, settings.poll_duration_days)?;
    let auto_publish = !settings.require_admin_approval;

    let mut metadata = json!({
        "trigger_category": signal.category.as_str(),
        "trigger_strength": signal.strength,
        "generation_method": GenerationMethod::TrendBased.as_str(),
    });
    if settings.regional_boost.enabled {
        if let Some(region) = signal.region.as_deref() {
            metadata["regional_boost"] = json!({
                "region": region,
                "boost_factor": settings.regional_boost.boost_factor,
            });
        }
    }

    let poll = GeneratedPoll {
        id: Uuid::new_v4(),
        title: synthesis.draft.question.clone(),
        description: Some(format!(
            "Based on trending {}: {}",
            signal.category.as_str().replace('_', " "),
            signal.topic.trim()
        )),
        options: synthesis.draft.options.clone(),
        style: synthesis.style,
        is_active: auto_publish,
        region: signal.region.clone(),
        metadata,
        expires_at,
        created_at: now,
    };

    let audit = AuditRecord {
        id: Uuid::new_v4(),
        poll_id: poll.id,
        trigger_signal_id: signal.id,
        trigger_category: signal.category,
        trigger_topic: signal.topic.clone(),
        generation_method: GenerationMethod::TrendBased,
        confidence_score: synthesis.confidence,
        admin_approved: if auto_publish { Some(true) } else { None },
        prompt: synthesis.prompt.clone(),
        ai_reasoning: synthesis.draft.reasoning().to_string(),
        created_at: now,
    };

    Ok((poll, audit))
}

/// Write poll + audit in one transaction, re-checking the quota under lock.
pub async fn persist(
    store: &dyn GenerationStore,
    poll: &GeneratedPoll,
    audit: &AuditRecord,
    max_per_week: u32,
    now: DateTime<Utc>,
) -> Result<CommitOutcome, PulseError> {
    let outcome = store
        .commit_generation(poll, audit, window_start(now), max_per_week)
        .await
        .map_err(|e| PulseError::Persistence(format!("{e:#}")))?;

    match outcome {
        CommitOutcome::Committed => info!(
            poll_id = %poll.id,
            audit_id = %audit.id,
            is_active = poll.is_active,
            "Poll and audit record written"
        ),
        CommitOutcome::QuotaReached { used } => warn!(
            used,
            max = max_per_week,
            "Quota filled before commit, nothing written"
        ),
    }

    Ok(outcome)
}
