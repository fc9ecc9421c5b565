use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use alice_core::{
    ChatMessage, FinishReason, LLMConfig, LLMError, LLMProvider, LLMResponse, TokenUsage,
};

/// Scripted LLM provider for tests.
///
/// Replies are consumed in the order they were queued; once the queue is
/// empty every call gets the fallback reply. Clones share the same script and
/// call history, so a test can keep a handle after registering the provider.
#[derive(Clone)]
pub struct MockLLMProvider {
    inner: Arc<RwLock<MockInner>>,
}

enum Scripted {
    Reply(String),
    Filtered,
    Fail(String),
}

struct MockInner {
    name: String,
    script: VecDeque<Scripted>,
    fallback: String,
    calls: Vec<MockCall>,
    latency: Duration,
}

#[derive(Debug, Clone)]
pub struct MockCall {
    pub messages: Vec<ChatMessage>,
    pub config: Option<LLMConfig>,
    pub timestamp: std::time::Instant,
}

impl MockCall {
    /// Concatenated content of every message sent in this call.
    pub fn prompt(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl MockLLMProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(MockInner {
                name: name.into(),
                script: VecDeque::new(),
                fallback: "Mock response".to_string(),
                calls: Vec::new(),
                latency: Duration::ZERO,
            })),
        }
    }

    pub fn with_responses<I, S>(name: impl Into<String>, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mock = Self::new(name);
        for response in responses {
            mock.push_response(response);
        }
        mock
    }

    pub fn push_response(&self, response: impl Into<String>) {
        self.inner
            .write()
            .script
            .push_back(Scripted::Reply(response.into()));
    }

    pub fn push_error(&self, message: impl Into<String>) {
        self.inner
            .write()
            .script
            .push_back(Scripted::Fail(message.into()));
    }

    /// Queue an empty reply cut off by the content filter.
    pub fn push_filtered(&self) {
        self.inner.write().script.push_back(Scripted::Filtered);
    }

    pub fn set_fallback(&self, response: impl Into<String>) {
        self.inner.write().fallback = response.into();
    }

    pub fn set_latency(&self, latency: Duration) {
        self.inner.write().latency = latency;
    }

    pub fn call_count(&self) -> usize {
        self.inner.read().calls.len()
    }

    pub fn call_history(&self) -> Vec<MockCall> {
        self.inner.read().calls.clone()
    }

    pub fn last_call(&self) -> Option<MockCall> {
        self.inner.read().calls.last().cloned()
    }

    pub fn remaining_script(&self) -> usize {
        self.inner.read().script.len()
    }

    fn record_call(&self, messages: &[ChatMessage], config: Option<&LLMConfig>) {
        self.inner.write().calls.push(MockCall {
            messages: messages.to_vec(),
            config: config.cloned(),
            timestamp: std::time::Instant::now(),
        });
    }

    async fn simulate_latency(&self) {
        let latency = self.inner.read().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn next_reply(&self) -> Result<(String, FinishReason), LLMError> {
        let mut inner = self.inner.write();
        match inner.script.pop_front() {
            Some(Scripted::Reply(content)) => Ok((content, FinishReason::Stop)),
            Some(Scripted::Filtered) => Ok((String::new(), FinishReason::ContentFilter)),
            Some(Scripted::Fail(message)) => Err(LLMError::Other(message)),
            None => Ok((inner.fallback.clone(), FinishReason::Stop)),
        }
    }

    fn estimate_tokens(messages: &[ChatMessage]) -> u32 {
        let total_chars: usize = messages.iter().map(|m| m.content.len()).sum();
        (total_chars / 4) as u32
    }
}

impl Default for MockLLMProvider {
    fn default() -> Self {
        Self::new("default")
    }
}

#[async_trait]
impl LLMProvider for MockLLMProvider {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        config: Option<&LLMConfig>,
    ) -> Result<LLMResponse, LLMError> {
        self.record_call(messages, config);
        self.simulate_latency().await;

        let (content, finish_reason) = self.next_reply()?;
        let usage = TokenUsage::new(
            Self::estimate_tokens(messages),
            (content.len() / 4) as u32,
        );

        Ok(LLMResponse::new(content, finish_reason)
            .with_usage(usage)
            .with_model("mock-model"))
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}

impl std::fmt::Debug for MockLLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("MockLLMProvider")
            .field("name", &inner.name)
            .field("queued", &inner.script.len())
            .field("calls", &inner.calls.len())
            .finish()
    }
}
