//! LLM integration crate for the Diligence research agent.
//!
//! Provider-agnostic chat completion behind the [`LlmClient`] trait, plus the
//! pieces every caller of a generative model needs: exponential backoff for
//! rate-limited services and a tolerant JSON extractor for model output.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//! - **OpenAI**: Any OpenAI-compatible `/v1/chat/completions` endpoint
//! - **Mock**: Scripted responses for tests
//!
//! # Example
//! ```no_run
//! use diligence_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("Summarize Apple's 2023 10-K", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod parse;
pub mod providers;
pub mod retry;

// Re-export main types
pub use client::{ChatMessage, ChatRole, LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use parse::{extract_json, extract_json_object, ParseError};
pub use providers::{MockLlmClient, MockReply, OllamaClient, OpenAiClient};
pub use retry::{RetryPolicy, RetryingClient};
