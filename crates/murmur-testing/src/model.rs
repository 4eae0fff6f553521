use std::sync::Mutex;

use async_trait::async_trait;
use murmur_engine::contracts::{CompletionRequest, CompletionResponse, LanguageModel};
use murmur_engine::{Error, Result};
use murmur_types::TokenUsage;

/// One scripted behavior: when any request message contains
/// `when_contains`, answer with `response` (or fail, if `fail` is set).
#[derive(Debug, Clone)]
pub struct ModelRule {
    pub when_contains: String,
    pub response: String,
    pub fail: bool,
}

impl ModelRule {
    pub fn respond(when_contains: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            when_contains: when_contains.into(),
            response: response.into(),
            fail: false,
        }
    }

    pub fn fail(when_contains: impl Into<String>) -> Self {
        Self {
            when_contains: when_contains.into(),
            response: String::new(),
            fail: true,
        }
    }
}

/// Rule-based fake model. First matching rule wins; unmatched requests get
/// the default response. Every request is captured for assertions.
pub struct ScriptedModel {
    rules: Vec<ModelRule>,
    default_response: String,
    calls: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    pub fn new(default_response: impl Into<String>) -> Self {
        Self {
            rules: Vec::new(),
            default_response: default_response.into(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A model where every agent stays quiet and the engagement
    /// classifier approves speaking.
    pub fn quiet() -> Self {
        Self::new("Quiet.").with_rule(ModelRule::respond("Answer YES or NO", "YES"))
    }

    pub fn with_rule(mut self, rule: ModelRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().unwrap().clone()
    }

    fn response_for(&self, request: &CompletionRequest) -> Result<String> {
        for rule in &self.rules {
            let hit = request
                .messages
                .iter()
                .any(|m| m.content.contains(&rule.when_contains));
            if hit {
                if rule.fail {
                    return Err(Error::Transport(format!(
                        "scripted failure for '{}'",
                        rule.when_contains
                    )));
                }
                return Ok(rule.response.clone());
            }
        }
        Ok(self.default_response.clone())
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let content = self.response_for(&request)?;
        let prompt_tokens: u64 = request
            .messages
            .iter()
            .map(|m| m.content.len() as u64 / 4)
            .sum();
        let completion_tokens = content.len() as u64 / 4;
        let model = request.model.clone();
        self.calls.lock().unwrap().push(request);

        Ok(CompletionResponse {
            content,
            reasoning: None,
            model,
            usage: TokenUsage {
                prompt_tokens,
                completion_tokens,
                reasoning_tokens: 0,
            },
            latency_ms: 1,
        })
    }
}
