//! Integration tests for PulseStore.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.

use std::sync::OnceLock;

use chrono::{Duration, Utc};
use serde_json::json;
use sqlx::PgPool;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use camerpulse_common::{
    AuditRecord, CommitOutcome, GeneratedPoll, GenerationMethod, PollStyle, SignalCategory,
};
use camerpulse_store::{migrate, PulseStore};

/// Tests share one database and truncate it; they must not overlap.
fn db_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// Get a migrated, empty test database, or skip if no test DB is available.
/// Hold the returned guard for the whole test.
async fn test_store() -> Option<(PulseStore, MutexGuard<'static, ()>)> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let guard = db_lock().lock().await;
    let pool = PgPool::connect(&url).await.ok()?;
    migrate(&pool).await.ok()?;

    sqlx::query("TRUNCATE autonomous_polls, polls, civic_complaints, sentiment_trends")
        .execute(&pool)
        .await
        .ok()?;

    Some((PulseStore::new(pool), guard))
}

fn poll_and_audit(now: chrono::DateTime<Utc>) -> (GeneratedPoll, AuditRecord) {
    let poll = GeneratedPoll {
        id: Uuid::new_v4(),
        title: "Should Douala prioritise drainage repairs before the rainy season?".to_string(),
        description: None,
        options: vec!["Yes".into(), "No".into(), "Not sure".into()],
        style: PollStyle::Ballot,
        is_active: false,
        region: Some("Littoral".to_string()),
        metadata: json!({"trigger_category": "complaint"}),
        expires_at: now + Duration::days(7),
        created_at: now,
    };
    let audit = AuditRecord {
        id: Uuid::new_v4(),
        poll_id: poll.id,
        trigger_signal_id: Some(Uuid::new_v4()),
        trigger_category: SignalCategory::Complaint,
        trigger_topic: "Flooded streets in Bonaberi".to_string(),
        generation_method: GenerationMethod::TrendBased,
        confidence_score: 0.74,
        admin_approved: None,
        prompt: "prompt".to_string(),
        ai_reasoning: "Flooding complaints spiked this week".to_string(),
        created_at: now,
    };
    (poll, audit)
}

#[tokio::test]
async fn commit_writes_poll_and_audit_together() {
    let Some((store, _guard)) = test_store().await else {
        return;
    };
    let now = Utc::now();
    let (poll, audit) = poll_and_audit(now);

    let outcome = store
        .commit_generation(&poll, &audit, now - Duration::days(7), 2)
        .await
        .unwrap();
    assert_eq!(outcome, CommitOutcome::Committed);

    let stored = store.find_poll(poll.id).await.unwrap().unwrap();
    assert_eq!(stored.options, poll.options);
    assert_eq!(stored.style, PollStyle::Ballot);

    let audits = store.recent_audit_records(10).await.unwrap();
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].poll_id, poll.id);
    assert_eq!(audits[0].admin_approved, None);
}

#[tokio::test]
async fn commit_refuses_when_window_is_full() {
    let Some((store, _guard)) = test_store().await else {
        return;
    };
    let now = Utc::now();
    let window_start = now - Duration::days(7);

    let (first_poll, first_audit) = poll_and_audit(now);
    store
        .commit_generation(&first_poll, &first_audit, window_start, 1)
        .await
        .unwrap();

    let (second_poll, second_audit) = poll_and_audit(now);
    let outcome = store
        .commit_generation(&second_poll, &second_audit, window_start, 1)
        .await
        .unwrap();

    assert_eq!(outcome, CommitOutcome::QuotaReached { used: 1 });
    assert!(store.find_poll(second_poll.id).await.unwrap().is_none());
    assert_eq!(store.count_generations_since(window_start).await.unwrap(), 1);
}

#[tokio::test]
async fn failed_audit_insert_rolls_back_poll() {
    let Some((store, _guard)) = test_store().await else {
        return;
    };
    let now = Utc::now();
    let (poll, mut audit) = poll_and_audit(now);
    // Violates the confidence CHECK constraint.
    audit.confidence_score = 2.0;

    let result = store
        .commit_generation(&poll, &audit, now - Duration::days(7), 2)
        .await;

    assert!(result.is_err());
    assert!(store.find_poll(poll.id).await.unwrap().is_none());
}

#[tokio::test]
async fn top_signals_filters_by_threshold_and_recency() {
    let Some((store, _guard)) = test_store().await else {
        return;
    };
    let pool = store.pool();

    sqlx::query(
        r#"
        INSERT INTO civic_complaints (title, trending_score, region, created_at) VALUES
            ('Power cuts in Bamenda', 0.9, 'North West', now() - interval '1 day'),
            ('Water shortage in Garoua', 0.4, 'North', now() - interval '1 day'),
            ('Old road complaint', 0.95, 'Centre', now() - interval '30 days')
        "#,
    )
    .execute(pool)
    .await
    .unwrap();

    let signals = store
        .top_signals(SignalCategory::Complaint, Utc::now() - Duration::days(7), 0.6, 5)
        .await
        .unwrap();

    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].topic, "Power cuts in Bamenda");
    assert!(signals[0].id.is_some());
}

#[tokio::test]
async fn sentiment_trends_have_no_stable_id() {
    let Some((store, _guard)) = test_store().await else {
        return;
    };

    sqlx::query(
        "INSERT INTO sentiment_trends (topic, trend_strength, region) VALUES ('Fuel prices', 0.8, 'Centre')",
    )
    .execute(store.pool())
    .await
    .unwrap();

    let signals = store
        .top_signals(SignalCategory::SentimentTrend, Utc::now() - Duration::days(7), 0.6, 10)
        .await
        .unwrap();

    assert_eq!(signals.len(), 1);
    assert!(signals[0].id.is_none());
    assert_eq!(signals[0].category, SignalCategory::SentimentTrend);
}

#[tokio::test]
async fn nan_scores_are_never_trending() {
    let Some((store, _guard)) = test_store().await else {
        return;
    };

    sqlx::query(
        r#"
        INSERT INTO civic_complaints (title, trending_score, region) VALUES
            ('Corrupted score', 'NaN', 'Centre'),
            ('Hospital fees in Bafoussam', 0.7, 'West')
        "#,
    )
    .execute(store.pool())
    .await
    .unwrap();

    let signals = store
        .top_signals(SignalCategory::Complaint, Utc::now() - Duration::days(7), 0.6, 5)
        .await
        .unwrap();

    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].topic, "Hospital fees in Bafoussam");
}
