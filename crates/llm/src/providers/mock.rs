//! Mock LLM client for testing.
//!
//! Replies come from a FIFO script. When the script is empty the optional
//! responder closure is consulted, then the default reply. Every request is
//! recorded so tests can assert on prompts and call counts.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::client::{LlmClient, LlmRequest, LlmResponse};
use diligence_core::{AppError, AppResult};

/// A scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    Content(String),
    RateLimited,
    Timeout,
    Error(String),
}

impl MockReply {
    fn into_result(self, model: &str) -> AppResult<LlmResponse> {
        match self {
            MockReply::Content(text) => Ok(LlmResponse::new(text, model)),
            MockReply::RateLimited => Err(AppError::RateLimited("mock quota exhausted".into())),
            MockReply::Timeout => Err(AppError::Timeout("mock deadline exceeded".into())),
            MockReply::Error(msg) => Err(AppError::Llm(msg)),
        }
    }
}

type Responder = dyn Fn(&LlmRequest) -> AppResult<String> + Send + Sync;

/// Deterministic LLM client for tests.
#[derive(Clone, Default)]
pub struct MockLlmClient {
    script: Arc<Mutex<VecDeque<MockReply>>>,
    requests: Arc<Mutex<Vec<LlmRequest>>>,
    call_count: Arc<AtomicUsize>,
    responder: Option<Arc<Responder>>,
    default_reply: Option<String>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a client that answers every request from `responder`.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&LlmRequest) -> AppResult<String> + Send + Sync + 'static,
    {
        Self {
            responder: Some(Arc::new(responder)),
            ..Self::default()
        }
    }

    /// Reply used once the script is exhausted.
    pub fn with_default_reply(mut self, reply: impl Into<String>) -> Self {
        self.default_reply = Some(reply.into());
        self
    }

    /// Queue a text reply.
    pub fn push_response(&self, content: impl Into<String>) {
        self.push(MockReply::Content(content.into()));
    }

    /// Queue any scripted reply.
    pub fn push(&self, reply: MockReply) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(reply);
        }
    }

    /// Number of `complete` calls made so far.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Snapshot of every request received, in order.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl LlmClient for MockLlmClient {
    fn provider_name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let scripted = self.script.lock().ok().and_then(|mut s| s.pop_front());
        if let Some(reply) = scripted {
            return reply.into_result(&request.model);
        }

        if let Some(responder) = &self.responder {
            return responder(request).map(|text| LlmResponse::new(text, &request.model));
        }

        match &self.default_reply {
            Some(text) => Ok(LlmResponse::new(text.clone(), &request.model)),
            None => Err(AppError::Llm("mock client has no scripted reply".to_string())),
        }
    }
}
