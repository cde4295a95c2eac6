pub mod error;
pub mod openai;
pub mod traits;
pub mod util;

pub use error::{AiError, Result};
pub use openai::{OpenAi, OpenAiPromptBuilder};
pub use traits::{Agent, PromptBuilder};
