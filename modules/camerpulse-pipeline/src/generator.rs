//! PollGenerator: one end-to-end generation run.
//!
//! settings → kill switch → quota pre-check → collect → pick strongest →
//! synthesize → build records → transactional commit. Every run reads its
//! inputs fresh; nothing is cached between runs.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use camerpulse_common::{
    AuditRecord, CommitOutcome, GeneratedPoll, GenerationSettings, PollStyle, PulseError,
    QuotaStatus, SignalCategory,
};

use crate::collector::collect_signals;
use crate::quota::check_quota;
use crate::synthesizer::Synthesizer;
use crate::traits::{GenerationStore, TextGenerator};
use crate::writer::{build_records, persist};

const MAX_LOG_LIMIT: u32 = 100;

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub poll: GeneratedPoll,
    pub audit: AuditRecord,
    pub category: SignalCategory,
    pub style: PollStyle,
    pub confidence_score: f64,
    pub auto_published: bool,
    pub ai_reasoning: String,
    pub trigger_topic: String,
}

/// Terminal state of a run that did not fail.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Disabled,
    QuotaReached(QuotaStatus),
    NoSignal,
    Generated(Box<GenerationReport>),
}

impl RunOutcome {
    /// Human-readable message for the non-generating outcomes.
    pub fn message(&self) -> &'static str {
        match self {
            RunOutcome::Disabled => "Autonomous poll generation is disabled",
            RunOutcome::QuotaReached(_) => "Weekly poll generation limit reached",
            RunOutcome::NoSignal => "No trending topics found above threshold",
            RunOutcome::Generated(_) => "Poll generated",
        }
    }
}

pub struct PollGenerator {
    store: Arc<dyn GenerationStore>,
    synthesizer: Synthesizer,
}

impl PollGenerator {
    pub fn new(store: Arc<dyn GenerationStore>, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            store,
            synthesizer: Synthesizer::new(generator),
        }
    }

    pub async fn run(&self) -> Result<RunOutcome, PulseError> {
        self.run_at(Utc::now()).await
    }

    /// Run the pipeline as of `now`.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunOutcome, PulseError> {
        let result = self.run_inner(now).await;
        match &result {
            Ok(outcome) => info!(outcome = outcome.message(), "Generation run finished"),
            Err(e) => error!(error = %e, "Generation run failed"),
        }
        result
    }

    async fn run_inner(&self, now: DateTime<Utc>) -> Result<RunOutcome, PulseError> {
        let settings = self.load_settings().await?;
        if !settings.enabled {
            return Ok(RunOutcome::Disabled);
        }

        let quota = check_quota(self.store.as_ref(), settings.max_per_week, now)
            .await
            .map_err(database)?;
        if quota.is_exhausted() {
            return Ok(RunOutcome::QuotaReached(quota));
        }

        let collected = collect_signals(self.store.as_ref(), settings.trending_threshold, now)
            .await
            .map_err(database)?;
        let Some(signal) = collected.strongest() else {
            return Ok(RunOutcome::NoSignal);
        };

        info!(
            topic = signal.topic.as_str(),
            category = %signal.category,
            strength = signal.strength,
            "Selected trigger signal"
        );

        let synthesis = self.synthesizer.synthesize(signal, &settings).await?;
        let (poll, audit) = build_records(signal, &synthesis, &settings, now)?;

        match persist(self.store.as_ref(), &poll, &audit, settings.max_per_week, now).await? {
            CommitOutcome::QuotaReached { used } => Ok(RunOutcome::QuotaReached(QuotaStatus {
                used,
                ..quota
            })),
            CommitOutcome::Committed => Ok(RunOutcome::Generated(Box::new(GenerationReport {
                category: signal.category,
                style: synthesis.style,
                confidence_score: synthesis.confidence,
                auto_published: poll.is_active,
                ai_reasoning: audit.ai_reasoning.clone(),
                trigger_topic: signal.topic.clone(),
                poll,
                audit,
            }))),
        }
    }

    /// Current quota usage under the configured weekly cap.
    pub async fn quota_status(&self) -> Result<QuotaStatus, PulseError> {
        let settings = self.load_settings().await?;
        check_quota(self.store.as_ref(), settings.max_per_week, Utc::now())
            .await
            .map_err(database)
    }

    /// Most recent audit records, newest first. `limit` is capped at 100.
    pub async fn generation_log(&self, limit: u32) -> Result<Vec<AuditRecord>, PulseError> {
        self.store
            .recent_audit_records(limit.min(MAX_LOG_LIMIT))
            .await
            .map_err(database)
    }

    async fn load_settings(&self) -> Result<GenerationSettings, PulseError> {
        self.store.load_settings().await.map_err(database)
    }
}

fn database(e: anyhow::Error) -> PulseError {
    PulseError::Database(format!("{e:#}"))
}
