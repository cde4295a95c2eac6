pub mod config;
pub mod error;
pub mod settings;
pub mod types;

pub use config::Config;
pub use error::PulseError;
pub use settings::{GenerationSettings, RegionalBoost, RetrySettings};
pub use types::*;
