//! Prompt templates for Lekt.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub summary: SummaryPrompts,
    pub qa: QaPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}

/// Prompts for structured session summaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryPrompts {
    pub system: String,
    pub user: String,
    /// Condenses one part of a transcript too long for a single request.
    pub part_system: String,
    pub part_user: String,
}

impl Default for SummaryPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are an expert at summarizing educational content. You turn class transcripts and lecture documents into clear study notes.

Respond with a single JSON object and nothing else, using exactly these keys:
- "key_points": array of the most important ideas, each one sentence
- "details": array of supporting explanations, definitions and examples worth remembering
- "action_items": array of assignments, deadlines, readings or tasks the instructor mentioned
- "open_questions": array of questions raised but not resolved, or topics to review
- "vocabulary": array of "term: definition" strings for new terminology

Use an empty array for a section with nothing to report. Never invent content that is not in the material."#
                .to_string(),

            user: r#"Summarize this class session.

Session: {{title}}
{{#if truncated}}Note: the material below is condensed from a longer recording.{{/if}}

Material:
{{content}}"#
                .to_string(),

            part_system: r#"You condense one part of a long class transcript into dense notes.

Keep every concept, definition, example, assignment and open question. Drop filler, greetings and repetition. Write plain bullet points."#
                .to_string(),

            part_user: r#"Session: {{title}} (part {{part}} of {{parts}})

{{content}}"#
                .to_string(),
        }
    }
}

/// Prompts for question answering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QaPrompts {
    pub session_system: String,
    pub session_user: String,
    pub class_system: String,
    pub class_user: String,
}

impl Default for QaPrompts {
    fn default() -> Self {
        Self {
            session_system: r#"You are a helpful teaching assistant. Answer questions about class content based on the provided session material.

Guidelines:
- Be accurate and cite specific parts of the session when relevant
- If the material says it was truncated, mention that the answer may be incomplete
- Admit clearly when the information is not in the material"#
                .to_string(),

            session_user: r#"Context:
{{context}}

Question: {{question}}"#
                .to_string(),

            class_system: r#"You are a helpful teaching assistant. Answer questions by synthesizing information from multiple sessions of the same class.

Guidelines:
- Cite which session(s) you are drawing information from, by title and date
- Point out how topics developed across sessions when relevant
- If some sessions were omitted or truncated, say that the answer may be incomplete
- Admit clearly when the information is not in the material"#
                .to_string(),

            class_user: r#"Class: {{class_name}}

Available session material:

{{context}}

Question: {{question}}"#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let summary_path = custom_path.join("summary.toml");
            if summary_path.exists() {
                let content = std::fs::read_to_string(&summary_path)?;
                prompts.summary = toml::from_str(&content)?;
            }

            let qa_path = custom_path.join("qa.toml");
            if qa_path.exists() {
                let content = std::fs::read_to_string(&qa_path)?;
                prompts.qa = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    ///
    /// `{{#if name}}...{{/if}}` blocks are kept when `name` is set to a
    /// non-empty value other than "false", and removed otherwise.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        let mut result = Self::render_conditionals(template, vars);
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    fn render_conditionals(
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("{{#if ") {
            let Some(name_end) = rest[start..].find("}}") else {
                break;
            };
            let name = rest[start + 6..start + name_end].trim();
            let body_start = start + name_end + 2;
            let Some(body_len) = rest[body_start..].find("{{/if}}") else {
                break;
            };

            out.push_str(&rest[..start]);
            let enabled = vars
                .get(name)
                .is_some_and(|v| !v.is_empty() && v != "false");
            if enabled {
                out.push_str(&rest[body_start..body_start + body_len]);
            }
            rest = &rest[body_start + body_len + "{{/if}}".len()..];
        }

        out.push_str(rest);
        out
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(
        &self,
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(prompts.summary.system.contains("key_points"));
        assert!(!prompts.qa.session_system.is_empty());
        assert!(prompts.qa.class_user.contains("{{context}}"));
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} messages.";
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 messages.");
    }

    #[test]
    fn test_render_conditionals() {
        let template = "A{{#if flag}} shown{{/if}} B{{#if other}} hidden{{/if}}";
        let mut vars = HashMap::new();
        vars.insert("flag".to_string(), "true".to_string());
        vars.insert("other".to_string(), "false".to_string());

        assert_eq!(Prompts::render(template, &vars), "A shown B");
    }

    #[test]
    fn test_custom_variables_are_overridden_by_call_vars() {
        let mut prompts = Prompts::default();
        prompts
            .variables
            .insert("school".to_string(), "Default U".to_string());
        prompts
            .variables
            .insert("term".to_string(), "Fall".to_string());

        let mut vars = HashMap::new();
        vars.insert("school".to_string(), "MIT".to_string());

        let rendered = prompts.render_with_custom("{{school}} {{term}}", &vars);
        assert_eq!(rendered, "MIT Fall");
    }

    #[test]
    fn test_load_custom_qa_prompts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("qa.toml"),
            "session_system = \"Answer like a pirate.\"\n",
        )
        .unwrap();

        let prompts = Prompts::load(Some(&dir.path().to_string_lossy()), None).unwrap();
        assert_eq!(prompts.qa.session_system, "Answer like a pirate.");
        assert!(!prompts.qa.class_system.is_empty());
        assert!(prompts.summary.system.contains("key_points"));
    }
}
