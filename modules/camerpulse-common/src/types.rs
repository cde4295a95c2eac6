use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trailing window over which generated polls count against the quota.
pub const QUOTA_WINDOW_DAYS: i64 = 7;

/// How far back the collector looks for trending signals.
pub const SIGNAL_LOOKBACK_DAYS: i64 = 7;

// --- Signals ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SignalCategory {
    Complaint,
    SentimentTrend,
}

impl SignalCategory {
    /// Tie-break order when two categories produce equally strong signals.
    /// Lower wins.
    pub fn priority(self) -> u8 {
        match self {
            SignalCategory::Complaint => 0,
            SignalCategory::SentimentTrend => 1,
        }
    }

    /// How many top signals the collector keeps for this category.
    pub fn collect_limit(self) -> u32 {
        match self {
            SignalCategory::Complaint => 5,
            SignalCategory::SentimentTrend => 10,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SignalCategory::Complaint => "complaint",
            SignalCategory::SentimentTrend => "sentiment_trend",
        }
    }
}

impl std::fmt::Display for SignalCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SignalCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "complaint" => Ok(SignalCategory::Complaint),
            "sentiment_trend" => Ok(SignalCategory::SentimentTrend),
            other => Err(format!("unknown signal category: {other}")),
        }
    }
}

/// A trending row considered as a trigger for generation. Read-only snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Stable row id. Sentiment trends are aggregates and carry none.
    pub id: Option<Uuid>,
    pub topic: String,
    pub description: Option<String>,
    /// Normalized to [0, 1].
    pub strength: f64,
    pub category: SignalCategory,
    pub region: Option<String>,
    pub observed_at: DateTime<Utc>,
}

// --- Poll styles ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PollStyle {
    Card,
    Chart,
    Ballot,
    Map,
    Swipe,
}

impl PollStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            PollStyle::Card => "card",
            PollStyle::Chart => "chart",
            PollStyle::Ballot => "ballot",
            PollStyle::Map => "map",
            PollStyle::Swipe => "swipe",
        }
    }
}

impl std::fmt::Display for PollStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PollStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "card" => Ok(PollStyle::Card),
            "chart" => Ok(PollStyle::Chart),
            "ballot" => Ok(PollStyle::Ballot),
            "map" => Ok(PollStyle::Map),
            "swipe" => Ok(PollStyle::Swipe),
            other => Err(format!("unknown poll style: {other}")),
        }
    }
}

/// Category → presentation style. One slot per category; an empty slot
/// falls back to `default`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleMapping {
    #[serde(default)]
    pub complaint: Option<PollStyle>,
    #[serde(default)]
    pub sentiment_trend: Option<PollStyle>,
    #[serde(default = "default_style")]
    pub default: PollStyle,
}

fn default_style() -> PollStyle {
    PollStyle::Card
}

impl Default for StyleMapping {
    fn default() -> Self {
        Self {
            complaint: None,
            sentiment_trend: None,
            default: default_style(),
        }
    }
}

impl StyleMapping {
    pub fn style_for(&self, category: SignalCategory) -> PollStyle {
        let mapped = match category {
            SignalCategory::Complaint => self.complaint,
            SignalCategory::SentimentTrend => self.sentiment_trend,
        };
        mapped.unwrap_or(self.default)
    }
}

// --- Generated artifacts ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMethod {
    TrendBased,
}

impl GenerationMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            GenerationMethod::TrendBased => "trend_based",
        }
    }
}

impl std::str::FromStr for GenerationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trend_based" => Ok(GenerationMethod::TrendBased),
            other => Err(format!("unknown generation method: {other}")),
        }
    }
}

/// A system-created poll. Created once per successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedPoll {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub options: Vec<String>,
    pub style: PollStyle,
    pub is_active: bool,
    pub region: Option<String>,
    pub metadata: serde_json::Value,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Provenance row paired one-to-one with a `GeneratedPoll`. Write-once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub poll_id: Uuid,
    pub trigger_signal_id: Option<Uuid>,
    pub trigger_category: SignalCategory,
    pub trigger_topic: String,
    pub generation_method: GenerationMethod,
    pub confidence_score: f64,
    /// `None` while awaiting manual review.
    pub admin_approved: Option<bool>,
    pub prompt: String,
    pub ai_reasoning: String,
    pub created_at: DateTime<Utc>,
}

// --- Quota ---

/// Generation count inside the trailing quota window. Derived on every run
/// from existing audit rows; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaStatus {
    pub used: u64,
    pub max_per_week: u32,
    pub window_days: i64,
}

impl QuotaStatus {
    pub fn is_exhausted(&self) -> bool {
        self.used >= u64::from(self.max_per_week)
    }

    pub fn remaining(&self) -> u64 {
        u64::from(self.max_per_week).saturating_sub(self.used)
    }
}

/// Result of the transactional poll + audit write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// The window filled up between the pre-check and the write. Nothing was written.
    QuotaReached { used: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapped_category_uses_mapped_style() {
        let mapping = StyleMapping {
            complaint: Some(PollStyle::Ballot),
            sentiment_trend: Some(PollStyle::Chart),
            default: PollStyle::Card,
        };
        assert_eq!(mapping.style_for(SignalCategory::Complaint), PollStyle::Ballot);
        assert_eq!(mapping.style_for(SignalCategory::SentimentTrend), PollStyle::Chart);
    }

    #[test]
    fn unmapped_category_falls_back_to_default() {
        let mapping = StyleMapping {
            complaint: Some(PollStyle::Ballot),
            sentiment_trend: None,
            default: PollStyle::Swipe,
        };
        assert_eq!(mapping.style_for(SignalCategory::SentimentTrend), PollStyle::Swipe);
    }

    #[test]
    fn complaints_outrank_sentiment_trends() {
        assert!(SignalCategory::Complaint.priority() < SignalCategory::SentimentTrend.priority());
    }

    #[test]
    fn poll_style_parses_case_insensitively() {
        assert_eq!("Chart".parse::<PollStyle>(), Ok(PollStyle::Chart));
        assert!("hologram".parse::<PollStyle>().is_err());
    }

    #[test]
    fn quota_exhausted_at_max() {
        let status = QuotaStatus { used: 2, max_per_week: 2, window_days: 7 };
        assert!(status.is_exhausted());
        assert_eq!(status.remaining(), 0);

        let status = QuotaStatus { used: 1, max_per_week: 2, window_days: 7 };
        assert!(!status.is_exhausted());
        assert_eq!(status.remaining(), 1);
    }

    #[test]
    fn zero_quota_is_always_exhausted() {
        let status = QuotaStatus { used: 0, max_per_week: 0, window_days: 7 };
        assert!(status.is_exhausted());
    }

    #[test]
    fn style_mapping_deserializes_with_defaults() {
        let mapping: StyleMapping = serde_json::from_str(r#"{"complaint":"map"}"#).unwrap();
        assert_eq!(mapping.complaint, Some(PollStyle::Map));
        assert_eq!(mapping.sentiment_trend, None);
        assert_eq!(mapping.default, PollStyle::Card);
    }
}
