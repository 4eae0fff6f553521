use std::path::Path;

use super::{AgentDef, WorkingMemoryView};

/// Load the agent's system prompt from `{prompts_dir}/{agency}/{name}.md`.
/// A missing file falls back to a generated prompt naming the agency and
/// agent, with the salience-tag instruction the contract requires.
pub fn load_system_prompt(prompts_dir: &Path, agent: &AgentDef) -> String {
    let path = prompts_dir
        .join(&agent.agency_id)
        .join(format!("{}.md", agent.name));
    match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(_) => format!(
            "You are the {} agent for the {} agency. Observe the input from \
             your narrow perspective and report only what you notice. If \
             nothing arises, respond with \"Quiet.\" End your response with \
             salience metadata in the form [U:n C:n] where n is 0-3.",
            agent.name, agent.agency_id
        ),
    }
}

/// Build the full prompt: system prompt, formatted conversation context
/// (at most the last five messages), and an optional deliberation section.
pub fn build_prompt(system_prompt: &str, view: &WorkingMemoryView) -> String {
    let mut prompt = format!(
        "{system_prompt}\n\n## Current Context\nTime: {}\nRecent conversation:\n{}\n",
        view.current_time,
        format_history(view)
    );
    if let Some(delib) = &view.deliberation {
        prompt.push_str(&format!(
            "\n## Deliberation Context\n{}\n",
            delib.format_for_prompt()
        ));
    }
    prompt
}

fn format_history(view: &WorkingMemoryView) -> String {
    if view.conversation_history.is_empty() {
        return "(No recent messages)".to_string();
    }
    let start = view.conversation_history.len().saturating_sub(5);
    view.conversation_history[start..]
        .iter()
        .map(|message| {
            let content: String = message.content.chars().take(200).collect();
            format!("{}: {}", message.role.as_str(), content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::DeliberationContext;
    use crate::contracts::Message;

    #[test]
    fn test_fallback_prompt_names_agent_and_agency() {
        let agent = AgentDef::new("emotion", "stress");
        let prompt = load_system_prompt(Path::new("/nonexistent"), &agent);
        assert!(prompt.contains("stress agent"));
        assert!(prompt.contains("emotion agency"));
        assert!(prompt.contains("[U:n C:n]"));
    }

    #[test]
    fn test_history_limited_to_five() {
        let view = WorkingMemoryView {
            conversation_history: (0..8).map(|i| Message::user(format!("m{i}"))).collect(),
            current_time: "2026-08-01 10:00:00".to_string(),
            deliberation: None,
        };
        let prompt = build_prompt("SYSTEM", &view);
        assert!(!prompt.contains("m2"));
        assert!(prompt.contains("m3"));
        assert!(prompt.contains("m7"));
    }

    #[test]
    fn test_deliberation_section_included_when_present() {
        let view = WorkingMemoryView {
            conversation_history: vec![],
            current_time: String::new(),
            deliberation: Some(DeliberationContext {
                round: 1,
                max_rounds: 3,
                ..Default::default()
            }),
        };
        let prompt = build_prompt("SYSTEM", &view);
        assert!(prompt.contains("## Deliberation Context"));
        assert!(prompt.contains("Round 1 of 3"));
    }
}
