use thiserror::Error;

pub type Result<T> = std::result::Result<T, AiError>;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("No content in completion response")]
    EmptyResponse,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AiError {
    /// Transport failures, rate limiting and 5xx responses may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            AiError::Network(_) => true,
            AiError::Api { status, .. } => *status == 429 || *status >= 500,
            AiError::Parse(_) | AiError::EmptyResponse | AiError::Config(_) => false,
        }
    }

    /// HTTP status of an upstream rejection, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            AiError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        AiError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for AiError {
    fn from(err: serde_json::Error) -> Self {
        AiError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_and_rate_limits_are_transient() {
        assert!(AiError::Api { status: 503, message: String::new() }.is_transient());
        assert!(AiError::Api { status: 429, message: String::new() }.is_transient());
        assert!(AiError::Network("reset".into()).is_transient());
    }

    #[test]
    fn client_errors_are_not_transient() {
        assert!(!AiError::Api { status: 401, message: String::new() }.is_transient());
        assert!(!AiError::EmptyResponse.is_transient());
        assert!(!AiError::Parse("bad".into()).is_transient());
    }
}
