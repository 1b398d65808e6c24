//! LLM client abstraction

mod client;
mod mock_client;
mod openai;
mod token_limit;

pub use client::{AskOutcome, LlmClient, ResponseFormat};
pub use mock_client::{MockLlmClient, MockStep, RecordedAsk};
pub use openai::OpenAiClient;
pub use token_limit::parse_token_limit;
