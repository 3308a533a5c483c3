//! Concrete provider adapters.

mod mock;
mod openai;

pub use mock::MockLlmProvider;
pub use openai::{OpenAiCompatibleProvider, OpenAiConfig};
