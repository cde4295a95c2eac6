use std::sync::Arc;
use std::time::Duration;

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use ai_client::util::strip_code_blocks;
use ai_client::AiError;
use camerpulse_common::{
    GenerationSettings, PollStyle, PulseError, RetrySettings, Signal, SignalCategory,
};

use crate::traits::{GenerationRequest, TextGenerator};

const TEMPERATURE: f32 = 0.8;
const MAX_TOKENS: u32 = 800;
const MAX_OPTIONS: usize = 6;
const MIN_OPTIONS: usize = 2;
const MAX_BACKOFF: Duration = Duration::from_secs(30);

const SYSTEM_PROMPT: &str = "You are a civic engagement analyst for Cameroon. You turn trending \
    citizen concerns into neutral, non-partisan poll questions that any citizen can answer. \
    Respond only with a single JSON object, no prose and no markdown.";

/// Structured result the model must return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PollDraft {
    /// The poll question, phrased neutrally
    pub question: String,
    /// 3 to 5 mutually exclusive answer options
    pub options: Vec<String>,
    /// Why this topic deserves a poll right now
    #[serde(default)]
    pub reasoning: Option<String>,
}

impl PollDraft {
    pub fn reasoning(&self) -> &str {
        self.reasoning.as_deref().unwrap_or("")
    }
}

/// Everything the writer needs from one synthesis.
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub draft: PollDraft,
    pub prompt: String,
    pub style: PollStyle,
    pub confidence: f64,
}

// ---------------------------------------------------------------------------
// Pure helpers
// ---------------------------------------------------------------------------

fn category_label(category: SignalCategory) -> &'static str {
    match category {
        SignalCategory::Complaint => "citizen complaint",
        SignalCategory::SentimentTrend => "public sentiment trend",
    }
}

/// Build the user prompt for one signal.
pub fn build_prompt(signal: &Signal) -> String {
    let mut prompt = format!(
        "A {label} is trending in Cameroon.\n\nTopic: \"{topic}\"\n",
        label = category_label(signal.category),
        topic = signal.topic.trim(),
    );
    if let Some(description) = signal.description.as_deref().filter(|d| !d.trim().is_empty()) {
        prompt.push_str(&format!("Details: {}\n", description.trim()));
    }
    prompt.push_str(&format!(
        "Region: {}\nSignal strength: {:.2} (0 to 1)\n\n",
        signal.region.as_deref().unwrap_or("National"),
        signal.strength,
    ));
    prompt.push_str(
        "Write one poll question that lets citizens weigh in on this issue. \
         Provide 3 to 5 clear, balanced answer options and a short reasoning for \
         why this poll matters now.\n\n\
         Respond with JSON of the form {\"question\": string, \"options\": [string], \"reasoning\": string}.",
    );
    prompt
}

fn system_prompt() -> String {
    let schema = serde_json::to_string(&schema_for!(PollDraft)).unwrap_or_default();
    format!("{SYSTEM_PROMPT}\n\nJSON schema:\n{schema}")
}

/// Parse and validate model output. Anything that is not a usable poll is malformed.
pub fn parse_draft(text: &str) -> Result<PollDraft, PulseError> {
    let body = strip_code_blocks(text);
    let mut draft: PollDraft = serde_json::from_str(body)
        .map_err(|e| PulseError::MalformedResponse(format!("invalid JSON: {e}")))?;

    draft.question = draft.question.trim().to_string();
    if draft.question.is_empty() {
        return Err(PulseError::MalformedResponse("empty question".into()));
    }

    draft.options = draft
        .options
        .iter()
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .take(MAX_OPTIONS)
        .collect();
    if draft.options.len() < MIN_OPTIONS {
        return Err(PulseError::MalformedResponse(format!(
            "expected at least {MIN_OPTIONS} options, got {}",
            draft.options.len()
        )));
    }

    draft.reasoning = draft
        .reasoning
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());

    Ok(draft)
}

/// Bounded confidence: 0.5 base, up to 0.3 from signal strength, 0.1 for
/// four or more options, 0.1 for a non-empty reasoning; capped at 0.9.
pub fn confidence_score(strength: f64, option_count: usize, reasoning: &str) -> f64 {
    let strength = if strength.is_finite() { strength.clamp(0.0, 1.0) } else { 0.0 };
    let mut score = 0.5 + 0.3 * strength;
    if option_count >= 4 {
        score += 0.1;
    }
    if !reasoning.trim().is_empty() {
        score += 0.1;
    }
    score.min(0.9)
}

fn to_pulse_error(err: AiError) -> PulseError {
    match err {
        AiError::Api { status, message } => PulseError::Upstream {
            status,
            body: message,
        },
        AiError::Network(msg) => PulseError::Transport(msg),
        AiError::Parse(msg) => PulseError::MalformedResponse(msg),
        AiError::EmptyResponse => {
            PulseError::MalformedResponse("completion contained no message content".into())
        }
        AiError::Config(msg) => PulseError::Config(msg),
    }
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Attempts and exponential backoff for the completion call. Only transient
/// upstream failures are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1`, where `attempt` is 1-based.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// Synthesizer
// ---------------------------------------------------------------------------

pub struct Synthesizer {
    generator: Arc<dyn TextGenerator>,
}

impl Synthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Turn one signal into a validated poll draft.
    pub async fn synthesize(
        &self,
        signal: &Signal,
        settings: &GenerationSettings,
    ) -> Result<Synthesis, PulseError> {
        let request = GenerationRequest {
            system: system_prompt(),
            prompt: build_prompt(signal),
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let text = self
            .generate_with_retry(&request, RetryPolicy::from(&settings.retry))
            .await?;
        let draft = parse_draft(&text)?;

        let style = settings.style_mapping.style_for(signal.category);
        let confidence = confidence_score(signal.strength, draft.options.len(), draft.reasoning());

        info!(
            category = %signal.category,
            %style,
            confidence,
            options = draft.options.len(),
            "Poll draft synthesized"
        );

        Ok(Synthesis {
            draft,
            prompt: request.prompt,
            style,
            confidence,
        })
    }

    async fn generate_with_retry(
        &self,
        request: &GenerationRequest,
        policy: RetryPolicy,
    ) -> Result<String, PulseError> {
        let mut attempt = 1;
        loop {
            match self.generator.generate(request).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                    let delay = policy.backoff(attempt);
                    warn!(
                        error = %e,
                        attempt,
                        max_attempts = policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Generation call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(to_pulse_error(e)),
            }
        }
    }
}
