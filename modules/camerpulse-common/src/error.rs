use thiserror::Error;

#[derive(Error, Debug)]
pub enum PulseError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Upstream generation API returned status {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Upstream generation API unreachable: {0}")]
    Transport(String),

    #[error("Malformed generation response: {0}")]
    MalformedResponse(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
