use anyhow::{Context, Result};

const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Process configuration loaded from environment variables.
/// Contains only secrets and deployment values; generation behaviour lives in
/// the `autonomous_poll_config` table and is read per run.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,

    // Generative text API
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: Option<String>,

    // Web server
    pub web_host: String,
    pub web_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: required_env("DATABASE_URL")?,
            openai_api_key: required_env("OPENAI_API_KEY")?,
            openai_model: std::env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            openai_base_url: std::env::var("OPENAI_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty()),
            web_host: std::env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: std::env::var("WEB_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("WEB_PORT must be a number")?,
        };

        Ok(config)
    }

    pub fn log_redacted(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  DATABASE_URL: {}", redact_url(&self.database_url));
        tracing::info!("  OPENAI_API_KEY: {}", preview(&self.openai_api_key));
        tracing::info!("  OPENAI_MODEL: {}", self.openai_model);
        tracing::info!(
            "  OPENAI_BASE_URL: {}",
            self.openai_base_url.as_deref().unwrap_or("<default>")
        );
        tracing::info!("  WEB: {}:{}", self.web_host, self.web_port);
    }
}

fn required_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{key} environment variable is required"))
}

fn preview(val: &str) -> String {
    let n = val.chars().take(5).map(char::len_utf8).sum::<usize>();
    format!("{}...({} chars)", &val[..n], val.len())
}

/// Drop the userinfo section of a connection URL.
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}
