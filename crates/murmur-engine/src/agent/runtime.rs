use std::sync::Arc;
use std::time::{Duration, Instant};

use murmur_types::{AgentAssessment, AgentTrace};
use tracing::warn;

use super::{AgentDef, WorkingMemoryView, build_prompt, extract_json_block, extract_thinking,
    load_system_prompt, parse_salience, parse_structured};
use crate::contracts::{CompletionRequest, LanguageModel, Message};
use crate::settings::{EngineSettings, is_thinking_model};

const ASSESS_TEMPERATURE: f64 = 0.3;

/// Runs single agents against the language model. All failure modes
/// (timeout, transport, contract) collapse into a zero-salience
/// placeholder so a wave never loses its siblings to one bad call.
pub struct AgentRuntime {
    model: Arc<dyn LanguageModel>,
    settings: Arc<EngineSettings>,
}

impl AgentRuntime {
    pub fn new(model: Arc<dyn LanguageModel>, settings: Arc<EngineSettings>) -> Self {
        Self { model, settings }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Assess one event from one agent's perspective. Never fails; errors
    /// surface in the assessment's `error` field.
    pub async fn assess(
        &self,
        agent: &AgentDef,
        event_text: &str,
        view: &WorkingMemoryView,
    ) -> AgentAssessment {
        let started = Instant::now();
        let deadline = Duration::from_millis(self.settings.agent_timeout_ms);

        let result = tokio::time::timeout(deadline, self.assess_inner(agent, event_text, view)).await;

        let mut assessment = match result {
            Ok(assessment) => assessment,
            Err(_) => {
                warn!(agent_id = %agent.agent_id(), "agent assess timed out");
                AgentAssessment::placeholder(
                    &agent.agent_id(),
                    &agent.agency_id,
                    format!("timed out after {}ms", self.settings.agent_timeout_ms),
                )
            }
        };
        assessment.processing_time_ms = started.elapsed().as_millis() as u64;
        assessment
    }

    async fn assess_inner(
        &self,
        agent: &AgentDef,
        event_text: &str,
        view: &WorkingMemoryView,
    ) -> AgentAssessment {
        let agent_id = agent.agent_id();
        let system_prompt = load_system_prompt(&self.settings.prompts_dir, agent);
        let full_prompt = build_prompt(&system_prompt, view);

        let deliberating = view.deliberation.is_some();
        let (model_id, effort) = self.model_for_assess(deliberating);

        let messages = vec![
            Message::system(full_prompt.clone()),
            Message::user(format!(
                "The user said: {event_text}\n\nWhat do you observe?"
            )),
        ];

        let request = CompletionRequest {
            messages: messages.clone(),
            model: model_id,
            temperature: ASSESS_TEMPERATURE,
            max_tokens: None,
            reasoning_effort: effort,
        };

        let mut trace = AgentTrace {
            system_prompt,
            full_prompt,
            request_messages: serde_json::to_value(&messages).ok(),
            ..Default::default()
        };

        let response = match self.model.complete(request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(agent_id = %agent_id, error = %err, "agent assess failed");
                let mut placeholder =
                    AgentAssessment::placeholder(&agent_id, &agent.agency_id, err.to_string());
                placeholder.trace = Some(trace);
                return placeholder;
            }
        };

        let raw_output = response.content.trim().to_string();

        // Prefer a dedicated reasoning channel; otherwise peel a
        // <thinking> prefix out of the content.
        let (thinking, output) = match &response.reasoning {
            Some(reasoning) => (Some(reasoning.clone()), raw_output),
            None => extract_thinking(&raw_output),
        };

        let (output, salience) = parse_salience(&output);
        let structured = parse_structured(extract_json_block(&output), &agent_id);

        trace.model = Some(response.model);
        trace.latency_ms = Some(response.latency_ms);
        trace.usage = Some(response.usage);
        trace.thinking = thinking;

        AgentAssessment {
            agent_id,
            agency_id: agent.agency_id.clone(),
            output,
            salience,
            structured,
            processing_time_ms: 0,
            error: None,
            trace: Some(trace),
        }
    }

    /// Model id and effort for an assess call. Deliberation rounds may use
    /// a thinking-capable variant of the small tier.
    fn model_for_assess(&self, deliberating: bool) -> (String, Option<crate::contracts::ReasoningEffort>) {
        let base = self.settings.models.small.clone();
        if deliberating && self.settings.deliberation_use_thinking {
            let model = if is_thinking_model(&base) {
                base
            } else {
                format!("{base}:thinking")
            };
            return (model, Some(self.settings.efforts.agent_assess));
        }
        (base, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Result;
    use crate::contracts::CompletionResponse;
    use async_trait::async_trait;
    use murmur_types::TokenUsage;

    struct CannedModel {
        content: String,
    }

    #[async_trait]
    impl LanguageModel for CannedModel {
        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse> {
            Ok(CompletionResponse {
                content: self.content.clone(),
                reasoning: None,
                model: "canned".to_string(),
                usage: TokenUsage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    reasoning_tokens: 0,
                },
                latency_ms: 3,
            })
        }
    }

    struct FailingModel;

    #[async_trait]
    impl LanguageModel for FailingModel {
        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse> {
            Err(crate::Error::Transport("connection reset".to_string()))
        }
    }

    struct HangingModel;

    #[async_trait]
    impl LanguageModel for HangingModel {
        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!()
        }
    }

    fn runtime(model: impl LanguageModel + 'static, timeout_ms: u64) -> AgentRuntime {
        let settings = EngineSettings {
            agent_timeout_ms: timeout_ms,
            ..Default::default()
        };
        AgentRuntime::new(Arc::new(model), Arc::new(settings))
    }

    #[tokio::test]
    async fn test_assess_parses_salience_and_trace() {
        let rt = runtime(
            CannedModel {
                content: "User sounds flat today. [U:2 C:2]".to_string(),
            },
            2000,
        );
        let agent = AgentDef::new("emotion", "stress");
        let assessment = rt
            .assess(&agent, "hi", &WorkingMemoryView::default())
            .await;

        assert_eq!(assessment.agent_id, "emotion.stress");
        assert_eq!(assessment.output, "User sounds flat today.");
        assert_eq!(assessment.urgency(), 2);
        assert!(assessment.error.is_none());
        let trace = assessment.trace.unwrap();
        assert_eq!(trace.model.as_deref(), Some("canned"));
        assert_eq!(trace.usage.unwrap().prompt_tokens, 10);
    }

    #[tokio::test]
    async fn test_transport_failure_becomes_placeholder() {
        let rt = runtime(FailingModel, 2000);
        let agent = AgentDef::new("social", "norms");
        let assessment = rt
            .assess(&agent, "hi", &WorkingMemoryView::default())
            .await;

        assert_eq!(assessment.urgency(), 0);
        assert!(assessment.error.unwrap().contains("connection reset"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_becomes_placeholder() {
        let rt = runtime(HangingModel, 50);
        let agent = AgentDef::new("self", "observer");
        let assessment = rt
            .assess(&agent, "hi", &WorkingMemoryView::default())
            .await;

        assert!(assessment.error.as_ref().unwrap().contains("timed out"));
        assert_eq!(assessment.urgency(), 0);
    }

    #[tokio::test]
    async fn test_thinking_prefix_extracted() {
        let rt = runtime(
            CannedModel {
                content: "<thinking>hmm</thinking>Steady state. [U:0 C:1]".to_string(),
            },
            2000,
        );
        let agent = AgentDef::new("self", "observer");
        let assessment = rt
            .assess(&agent, "hi", &WorkingMemoryView::default())
            .await;

        assert_eq!(assessment.output, "Steady state.");
        assert_eq!(assessment.trace.unwrap().thinking.as_deref(), Some("hmm"));
    }
}
