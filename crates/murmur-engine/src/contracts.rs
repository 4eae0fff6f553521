//! Seams to the external collaborators the engine consumes: the language
//! model, the memory system, and the voice renderer. Each is one trait
//! with the narrowest operation set the pipeline needs; implementations
//! are injected through the runner's constructor, never reached through
//! globals.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use murmur_types::{CouncilDecision, Episode, OpenThread, TokenUsage, UserFact};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Chat role for a model request message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One request message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Coarse reasoning depth for thinking-capable models, mapped to an
/// advisory token budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningEffort {
    Minimal,
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasoningEffort::Minimal => "minimal",
            ReasoningEffort::Low => "low",
            ReasoningEffort::Medium => "medium",
            ReasoningEffort::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<ReasoningEffort> {
        match s {
            "minimal" => Some(ReasoningEffort::Minimal),
            "low" => Some(ReasoningEffort::Low),
            "medium" => Some(ReasoningEffort::Medium),
            "high" => Some(ReasoningEffort::High),
            _ => None,
        }
    }

    /// Advisory token budget attached to the request.
    pub fn token_budget(&self) -> u32 {
        match self {
            ReasoningEffort::Minimal => 500,
            ReasoningEffort::Low => 2000,
            ReasoningEffort::Medium => 5000,
            ReasoningEffort::High => 10000,
        }
    }
}

/// A single completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    pub reasoning_effort: Option<ReasoningEffort>,
}

/// A completion result. Transport- and provider-level failures both
/// surface as [`crate::Error::Transport`]; callers treat them as assessment
/// failures, not crashes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    /// Dedicated reasoning channel, when the provider exposes one.
    pub reasoning: Option<String>,
    pub model: String,
    pub usage: TokenUsage,
    pub latency_ms: u64,
}

/// The language-model collaborator. The HTTP client behind it is out of
/// the engine's scope.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;
}

/// The memory collaborator. The engine consumes retrieval before agents
/// run and hands the terminating workspace back for asynchronous commit;
/// persistence internals are not specified here.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn retrieve_recent(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<Episode>>;

    async fn retrieve_similar(
        &self,
        query: &str,
        limit: usize,
        exclude_ids: &[String],
    ) -> Result<Vec<Episode>>;

    async fn get_relevant_facts(&self, context: &str, limit: usize) -> Result<Vec<UserFact>>;

    async fn get_open_threads(&self, limit: usize) -> Result<Vec<OpenThread>>;

    async fn commit_episodes(&self, episodes: Vec<Episode>) -> Result<usize>;

    async fn commit_facts(&self, facts: Vec<UserFact>) -> Result<usize>;
}

/// Result of rendering a speech act to natural language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceResult {
    pub text: String,
    pub latency_ms: u64,
}

/// The renderer collaborator: turns a structured decision into prose. It
/// adds no new claims or decisions of its own.
#[async_trait]
pub trait VoiceRenderer: Send + Sync {
    async fn render(
        &self,
        decision: &CouncilDecision,
        last_user_message: &str,
        self_model: &str,
    ) -> Result<VoiceResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effort_budgets() {
        assert_eq!(ReasoningEffort::Minimal.token_budget(), 500);
        assert_eq!(ReasoningEffort::Low.token_budget(), 2000);
        assert_eq!(ReasoningEffort::Medium.token_budget(), 5000);
        assert_eq!(ReasoningEffort::High.token_budget(), 10000);
    }

    #[test]
    fn test_effort_roundtrip() {
        for effort in [
            ReasoningEffort::Minimal,
            ReasoningEffort::Low,
            ReasoningEffort::Medium,
            ReasoningEffort::High,
        ] {
            assert_eq!(ReasoningEffort::parse(effort.as_str()), Some(effort));
        }
    }
}
