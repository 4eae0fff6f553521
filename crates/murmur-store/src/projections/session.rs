use murmur_types::{EngineEvent, EventKind};
use serde::{Deserialize, Serialize};

use super::Projection;

/// One message of the running conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// The conversation transcript as derived from the event stream: one user
/// message per `TURN_STARTED`, one assistant message per `VOICE_RENDERED`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionProjection {
    pub conversation: Vec<ChatMessage>,
}

impl SessionProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest_user(&self) -> Option<&ChatMessage> {
        self.conversation.iter().rev().find(|m| m.role == "user")
    }

    pub fn latest_assistant(&self) -> Option<&ChatMessage> {
        self.conversation.iter().rev().find(|m| m.role == "assistant")
    }

    /// Last `limit` messages as `{role, content}` pairs, oldest first.
    pub fn recent(&self, limit: usize) -> &[ChatMessage] {
        let start = self.conversation.len().saturating_sub(limit);
        &self.conversation[start..]
    }
}

impl Projection for SessionProjection {
    fn apply(&mut self, event: &EngineEvent) {
        match event.kind {
            EventKind::TurnStarted => {
                if let Some(user_input) = event.payload_str("user_input") {
                    self.conversation.push(ChatMessage {
                        role: "user".to_string(),
                        content: user_input.to_string(),
                    });
                }
            }
            EventKind::VoiceRendered => {
                if let Some(text) = event.payload_str("text") {
                    self.conversation.push(ChatMessage {
                        role: "assistant".to_string(),
                        content: text.to_string(),
                    });
                }
            }
            _ => {}
        }
    }

    fn reset(&mut self) {
        self.conversation.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_conversation_accumulates() {
        let mut session = SessionProjection::new();
        session.apply(&EngineEvent::new(
            "s1",
            1,
            0,
            0.0,
            EventKind::TurnStarted,
            json!({"user_input": "hi", "turn_id": 1}),
        ));
        session.apply(&EngineEvent::new(
            "s1",
            1,
            5,
            1.0,
            EventKind::VoiceRendered,
            json!({"text": "hello"}),
        ));

        assert_eq!(session.conversation.len(), 2);
        assert_eq!(session.latest_user().unwrap().content, "hi");
        assert_eq!(session.latest_assistant().unwrap().content, "hello");
    }

    #[test]
    fn test_recent_returns_tail() {
        let mut session = SessionProjection::new();
        for i in 0..8 {
            session.apply(&EngineEvent::new(
                "s1",
                i,
                0,
                i as f64,
                EventKind::TurnStarted,
                json!({"user_input": format!("msg {i}")}),
            ));
        }
        let tail = session.recent(3);
        assert_eq!(tail.len(), 3);
        assert_eq!(tail[0].content, "msg 5");
    }
}
