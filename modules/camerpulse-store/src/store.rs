//! PulseStore: settings, signal reads, and the transactional poll + audit write.
//!
//! The quota re-check and both inserts share one transaction serialized by a
//! transaction-scoped advisory lock, so concurrent runs cannot overshoot the
//! weekly cap and a poll can never exist without its audit row.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use camerpulse_common::{
    AuditRecord, CommitOutcome, GeneratedPoll, GenerationMethod, PollStyle, Signal,
    SignalCategory,
};

/// Advisory lock key guarding the generation quota ("CPGEN" in ASCII).
pub const GENERATION_LOCK_KEY: i64 = 0x4350_4745_4E;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct AuditRow {
    id: Uuid,
    poll_id: Uuid,
    trigger_signal_id: Option<Uuid>,
    trigger_category: String,
    trigger_topic: String,
    generation_method: String,
    confidence_score: f64,
    admin_approved: Option<bool>,
    generation_prompt: String,
    ai_reasoning: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditRecord {
    type Error = anyhow::Error;

    fn try_from(row: AuditRow) -> Result<Self> {
        Ok(AuditRecord {
            id: row.id,
            poll_id: row.poll_id,
            trigger_signal_id: row.trigger_signal_id,
            trigger_category: row
                .trigger_category
                .parse::<SignalCategory>()
                .map_err(|e| anyhow!(e))?,
            trigger_topic: row.trigger_topic,
            generation_method: row
                .generation_method
                .parse::<GenerationMethod>()
                .map_err(|e| anyhow!(e))?,
            confidence_score: row.confidence_score,
            admin_approved: row.admin_approved,
            prompt: row.generation_prompt,
            ai_reasoning: row.ai_reasoning,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PollRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    options: Json<Vec<String>>,
    style: String,
    is_active: bool,
    region: Option<String>,
    metadata: serde_json::Value,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PollRow> for GeneratedPoll {
    type Error = anyhow::Error;

    fn try_from(row: PollRow) -> Result<Self> {
        Ok(GeneratedPoll {
            id: row.id,
            title: row.title,
            description: row.description,
            options: row.options.0,
            style: row.style.parse::<PollStyle>().map_err(|e| anyhow!(e))?,
            is_active: row.is_active,
            region: row.region,
            metadata: row.metadata,
            expires_at: row.expires_at,
            created_at: row.created_at,
        })
    }
}

type SignalTuple = (
    Option<Uuid>,
    String,
    Option<String>,
    f64,
    Option<String>,
    DateTime<Utc>,
);

fn row_to_signal(category: SignalCategory, row: SignalTuple) -> Signal {
    let (id, topic, description, strength, region, observed_at) = row;
    Signal {
        id,
        topic,
        description,
        strength: if strength.is_finite() {
            strength.clamp(0.0, 1.0)
        } else {
            0.0
        },
        category,
        region,
        observed_at,
    }
}

// ---------------------------------------------------------------------------
// PulseStore
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PulseStore {
    pool: PgPool,
}

impl PulseStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// All `(setting_key, setting_value)` rows of the generation config table.
    pub async fn settings_rows(&self) -> Result<Vec<(String, serde_json::Value)>> {
        let rows = sqlx::query_as::<_, (String, serde_json::Value)>(
            r#"
            SELECT setting_key, setting_value
            FROM autonomous_poll_config
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Strongest signals of one category observed since `since`, at or above
    /// `min_strength`. Equal strengths keep the most recent first.
    pub async fn top_signals(
        &self,
        category: SignalCategory,
        since: DateTime<Utc>,
        min_strength: f64,
        limit: u32,
    ) -> Result<Vec<Signal>> {
        let sql = match category {
            SignalCategory::Complaint => {
                r#"
                SELECT id, title, description, trending_score, region, created_at
                FROM civic_complaints
                WHERE created_at >= $1 AND trending_score >= $2 AND trending_score <> 'NaN'
                ORDER BY trending_score DESC, created_at DESC
                LIMIT $3
                "#
            }
            SignalCategory::SentimentTrend => {
                r#"
                SELECT NULL::uuid, topic, summary, trend_strength, region, recorded_at
                FROM sentiment_trends
                WHERE recorded_at >= $1 AND trend_strength >= $2 AND trend_strength <> 'NaN'
                ORDER BY trend_strength DESC, recorded_at DESC
                LIMIT $3
                "#
            }
        };

        let rows = sqlx::query_as::<_, SignalTuple>(sql)
            .bind(since)
            .bind(min_strength)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        debug!(%category, count = rows.len(), "Loaded trending signals");

        Ok(rows
            .into_iter()
            .map(|row| row_to_signal(category, row))
            .collect())
    }

    /// Audit rows created at or after `since`.
    pub async fn count_generations_since(&self, since: DateTime<Utc>) -> Result<u64> {
        let (count,) = sqlx::query_as::<_, (i64,)>(
            "SELECT count(*) FROM autonomous_polls WHERE created_at >= $1",
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u64)
    }

    /// Insert the poll and its audit row in one transaction, after re-checking
    /// the quota under the generation advisory lock.
    pub async fn commit_generation(
        &self,
        poll: &GeneratedPoll,
        audit: &AuditRecord,
        window_start: DateTime<Utc>,
        max_per_window: u32,
    ) -> Result<CommitOutcome> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(GENERATION_LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        let (used,) = sqlx::query_as::<_, (i64,)>(
            "SELECT count(*) FROM autonomous_polls WHERE created_at >= $1",
        )
        .bind(window_start)
        .fetch_one(&mut *tx)
        .await?;
        let used = used.max(0) as u64;

        if used >= u64::from(max_per_window) {
            tx.rollback().await?;
            info!(used, max = max_per_window, "Quota filled before commit, nothing written");
            return Ok(CommitOutcome::QuotaReached { used });
        }

        sqlx::query(
            r#"
            INSERT INTO polls (id, title, description, options, style, is_active, region,
                               metadata, created_by_system, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, true, $9, $10)
            "#,
        )
        .bind(poll.id)
        .bind(&poll.title)
        .bind(&poll.description)
        .bind(Json(&poll.options))
        .bind(poll.style.as_str())
        .bind(poll.is_active)
        .bind(&poll.region)
        .bind(&poll.metadata)
        .bind(poll.expires_at)
        .bind(poll.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO autonomous_polls (id, poll_id, trigger_signal_id, trigger_category,
                                          trigger_topic, generation_method, confidence_score,
                                          admin_approved, generation_prompt, ai_reasoning,
                                          created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(audit.id)
        .bind(audit.poll_id)
        .bind(audit.trigger_signal_id)
        .bind(audit.trigger_category.as_str())
        .bind(&audit.trigger_topic)
        .bind(audit.generation_method.as_str())
        .bind(audit.confidence_score)
        .bind(audit.admin_approved)
        .bind(&audit.prompt)
        .bind(&audit.ai_reasoning)
        .bind(audit.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(CommitOutcome::Committed)
    }

    /// Most recent audit rows, newest first.
    pub async fn recent_audit_records(&self, limit: u32) -> Result<Vec<AuditRecord>> {
        let rows = sqlx::query_as::<_, AuditRow>(
            r#"
            SELECT id, poll_id, trigger_signal_id, trigger_category, trigger_topic,
                   generation_method, confidence_score, admin_approved,
                   generation_prompt, ai_reasoning, created_at
            FROM autonomous_polls
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit.min(100)))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AuditRecord::try_from).collect()
    }

    pub async fn find_poll(&self, id: Uuid) -> Result<Option<GeneratedPoll>> {
        let row = sqlx::query_as::<_, PollRow>(
            r#"
            SELECT id, title, description, options, style, is_active, region,
                   metadata, expires_at, created_at
            FROM polls
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(GeneratedPoll::try_from).transpose()
    }
}
