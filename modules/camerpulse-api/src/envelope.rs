//! JSON envelopes returned for a generation run, shared by the HTTP handler
//! and the `generate-once` binary.

use axum::http::StatusCode;
use serde_json::{json, Value};

use camerpulse_common::PulseError;
use camerpulse_pipeline::RunOutcome;

/// Status and body for the result of one run.
pub fn run_envelope(result: &Result<RunOutcome, PulseError>) -> (StatusCode, Value) {
    match result {
        Ok(RunOutcome::Generated(report)) => (
            StatusCode::OK,
            json!({
                "success": true,
                "poll": report.poll,
                "metadata": {
                    "category": report.category,
                    "style": report.style,
                    "confidence_score": report.confidence_score,
                    "auto_published": report.auto_published,
                    "ai_reasoning": report.ai_reasoning,
                    "trigger_topic": report.trigger_topic,
                },
            }),
        ),
        Ok(outcome) => (StatusCode::OK, json!({ "message": outcome.message() })),
        Err(e) => error_envelope(e),
    }
}

pub fn error_envelope(err: &PulseError) -> (StatusCode, Value) {
    let error = match err {
        PulseError::Upstream { .. } | PulseError::Transport(_) => "Upstream generation failed",
        PulseError::MalformedResponse(_) => "Malformed generation response",
        PulseError::Persistence(_) => "Persistence failed",
        PulseError::Database(_) | PulseError::Config(_) | PulseError::Anyhow(_) => {
            "Internal error"
        }
    };
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "error": error, "details": err.to_string() }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use camerpulse_common::QuotaStatus;

    #[test]
    fn quota_outcome_is_a_plain_message() {
        let (status, body) = run_envelope(&Ok(RunOutcome::QuotaReached(QuotaStatus {
            used: 2,
            max_per_week: 2,
            window_days: 7,
        })));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "message": "Weekly poll generation limit reached" }));
    }

    #[test]
    fn upstream_details_carry_status() {
        let (status, body) = run_envelope(&Err(PulseError::Upstream {
            status: 502,
            body: "bad gateway".into(),
        }));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Upstream generation failed");
        assert!(body["details"].as_str().unwrap().contains("502"));
    }

    #[test]
    fn store_failures_are_internal() {
        let (_, body) = run_envelope(&Err(PulseError::Database("pool timed out".into())));
        assert_eq!(body["error"], "Internal error");

        let (_, body) = run_envelope(&Err(PulseError::Persistence("rolled back".into())));
        assert_eq!(body["error"], "Persistence failed");
    }
}
