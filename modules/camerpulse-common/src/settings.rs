//! Runtime generation settings, loaded from the `autonomous_poll_config`
//! key/value table at the start of every run.
//!
//! Each key is parsed independently. A missing or malformed key falls back to
//! its default so that one bad row cannot take the whole pipeline down.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::StyleMapping;

pub const KEY_SYSTEM_ENABLED: &str = "system_enabled";
pub const KEY_SENTIMENT_THRESHOLDS: &str = "sentiment_thresholds";
pub const KEY_GENERATION_SCHEDULE: &str = "generation_schedule";
pub const KEY_STYLE_MAPPING: &str = "style_mapping";
pub const KEY_AUTO_PUBLISH: &str = "auto_publish";
pub const KEY_REGIONAL_BOOST: &str = "regional_boost";
pub const KEY_GENERATION_RETRY: &str = "generation_retry";

/// Accepted `poll_duration_days`, inclusive.
pub const POLL_DURATION_RANGE: std::ops::RangeInclusive<i64> = 1..=365;

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    /// Kill switch. A missing row means disabled.
    pub enabled: bool,
    /// Minimum signal strength considered trending.
    pub trending_threshold: f64,
    pub max_per_week: u32,
    pub poll_duration_days: i64,
    pub style_mapping: StyleMapping,
    pub require_admin_approval: bool,
    pub regional_boost: RegionalBoost,
    pub retry: RetrySettings,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            trending_threshold: 0.6,
            max_per_week: 2,
            poll_duration_days: 7,
            style_mapping: StyleMapping::default(),
            require_admin_approval: true,
            regional_boost: RegionalBoost::default(),
            retry: RetrySettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionalBoost {
    pub enabled: bool,
    pub boost_factor: f64,
}

impl Default for RegionalBoost {
    fn default() -> Self {
        Self {
            enabled: false,
            boost_factor: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts including the first. 1 = no retry.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 500,
        }
    }
}

// Wire shapes of the individual rows.

#[derive(Deserialize)]
struct EnabledRow {
    enabled: bool,
}

#[derive(Deserialize)]
struct ThresholdsRow {
    trending: f64,
}

#[derive(Deserialize)]
struct ScheduleRow {
    max_per_week: u32,
    #[serde(default)]
    poll_duration_days: Option<i64>,
}

#[derive(Deserialize)]
struct AutoPublishRow {
    require_admin_approval: bool,
}

impl GenerationSettings {
    /// Build settings from `(setting_key, setting_value)` rows. Unknown keys are ignored.
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        let mut settings = Self::default();

        for (key, value) in rows {
            match key.as_str() {
                KEY_SYSTEM_ENABLED => {
                    if let Some(row) = parse_row::<EnabledRow>(&key, value) {
                        settings.enabled = row.enabled;
                    }
                }
                KEY_SENTIMENT_THRESHOLDS => {
                    if let Some(row) = parse_row::<ThresholdsRow>(&key, value) {
                        settings.trending_threshold = row.trending.clamp(0.0, 1.0);
                    }
                }
                KEY_GENERATION_SCHEDULE => {
                    if let Some(row) = parse_row::<ScheduleRow>(&key, value) {
                        settings.max_per_week = row.max_per_week;
                        match row.poll_duration_days {
                            Some(days) if POLL_DURATION_RANGE.contains(&days) => {
                                settings.poll_duration_days = days;
                            }
                            Some(days) => warn!(
                                key,
                                days,
                                "Poll duration out of range, using default"
                            ),
                            None => {}
                        }
                    }
                }
                KEY_STYLE_MAPPING => {
                    if let Some(mapping) = parse_row::<StyleMapping>(&key, value) {
                        settings.style_mapping = mapping;
                    }
                }
                KEY_AUTO_PUBLISH => {
                    if let Some(row) = parse_row::<AutoPublishRow>(&key, value) {
                        settings.require_admin_approval = row.require_admin_approval;
                    }
                }
                KEY_REGIONAL_BOOST => {
                    if let Some(boost) = parse_row::<RegionalBoost>(&key, value) {
                        settings.regional_boost = boost;
                    }
                }
                KEY_GENERATION_RETRY => {
                    if let Some(retry) = parse_row::<RetrySettings>(&key, value) {
                        settings.retry = RetrySettings {
                            max_attempts: retry.max_attempts.max(1),
                            ..retry
                        };
                    }
                }
                _ => {}
            }
        }

        settings
    }
}

fn parse_row<T: DeserializeOwned>(key: &str, value: serde_json::Value) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(key, error = %e, "Malformed generation setting, using default");
            None
        }
    }
}
