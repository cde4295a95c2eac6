use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tracing::info;

use camerpulse_common::{Signal, SignalCategory, SIGNAL_LOOKBACK_DAYS};

use crate::traits::GenerationStore;

/// Categories in tie-break order.
const CATEGORIES: [SignalCategory; 2] = [SignalCategory::Complaint, SignalCategory::SentimentTrend];

/// Top signals per category, each list strongest first.
#[derive(Debug, Clone, Default)]
pub struct CollectedSignals {
    pub complaints: Vec<Signal>,
    pub sentiment_trends: Vec<Signal>,
}

impl CollectedSignals {
    pub fn is_empty(&self) -> bool {
        self.complaints.is_empty() && self.sentiment_trends.is_empty()
    }

    fn for_category(&self, category: SignalCategory) -> &[Signal] {
        match category {
            SignalCategory::Complaint => &self.complaints,
            SignalCategory::SentimentTrend => &self.sentiment_trends,
        }
    }

    fn for_category_mut(&mut self, category: SignalCategory) -> &mut Vec<Signal> {
        match category {
            SignalCategory::Complaint => &mut self.complaints,
            SignalCategory::SentimentTrend => &mut self.sentiment_trends,
        }
    }

    /// The single strongest signal. Equal strengths resolve by category
    /// priority, then by the store's order within a category. Non-finite
    /// strengths never win.
    pub fn strongest(&self) -> Option<&Signal> {
        let mut ordered = CATEGORIES;
        ordered.sort_by_key(|c| c.priority());

        let mut best: Option<&Signal> = None;
        for category in ordered {
            for signal in self.for_category(category) {
                if !signal.strength.is_finite() {
                    continue;
                }
                match best {
                    Some(current) if signal.strength <= current.strength => {}
                    _ => best = Some(signal),
                }
            }
        }
        best
    }
}

/// Read the strongest recent signals of every category.
///
/// An empty result is a valid outcome, not an error.
pub async fn collect_signals(
    store: &dyn GenerationStore,
    min_strength: f64,
    now: DateTime<Utc>,
) -> Result<CollectedSignals> {
    let since = now - Duration::days(SIGNAL_LOOKBACK_DAYS);
    let mut collected = CollectedSignals::default();

    for category in CATEGORIES {
        let signals = store
            .top_signals(category, since, min_strength, category.collect_limit())
            .await?;
        *collected.for_category_mut(category) = signals;
    }

    info!(
        complaints = collected.complaints.len(),
        sentiment_trends = collected.sentiment_trends.len(),
        min_strength,
        "Collected trending signals"
    );

    Ok(collected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::signal;

    #[test]
    fn strongest_picks_highest_strength_across_categories() {
        let collected = CollectedSignals {
            complaints: vec![signal(SignalCategory::Complaint, "Potholes", 0.7)],
            sentiment_trends: vec![signal(SignalCategory::SentimentTrend, "Fuel prices", 0.9)],
        };
        assert_eq!(collected.strongest().unwrap().topic, "Fuel prices");
    }

    #[test]
    fn tie_prefers_complaint() {
        let collected = CollectedSignals {
            complaints: vec![signal(SignalCategory::Complaint, "Power cuts", 0.8)],
            sentiment_trends: vec![signal(SignalCategory::SentimentTrend, "Exam results", 0.8)],
        };
        assert_eq!(collected.strongest().unwrap().category, SignalCategory::Complaint);
    }

    #[test]
    fn tie_within_category_keeps_store_order() {
        let collected = CollectedSignals {
            complaints: vec![
                signal(SignalCategory::Complaint, "Newest", 0.8),
                signal(SignalCategory::Complaint, "Older", 0.8),
            ],
            sentiment_trends: vec![],
        };
        assert_eq!(collected.strongest().unwrap().topic, "Newest");
    }

    #[test]
    fn empty_collection_has_no_strongest() {
        let collected = CollectedSignals::default();
        assert!(collected.is_empty());
        assert!(collected.strongest().is_none());
    }

    #[test]
    fn nan_strength_never_displaces_a_real_signal() {
        let collected = CollectedSignals {
            complaints: vec![
                signal(SignalCategory::Complaint, "Corrupted score", f64::NAN),
                signal(SignalCategory::Complaint, "Power cuts", 0.7),
            ],
            sentiment_trends: vec![signal(SignalCategory::SentimentTrend, "Fuel prices", 0.65)],
        };
        assert_eq!(collected.strongest().unwrap().topic, "Power cuts");

        let only_nan = CollectedSignals {
            complaints: vec![signal(SignalCategory::Complaint, "Corrupted score", f64::NAN)],
            sentiment_trends: vec![],
        };
        assert!(only_nan.strongest().is_none());
    }
}
