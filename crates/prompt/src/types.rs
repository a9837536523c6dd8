//! Prompt types for the Diligence research agent.

use diligence_llm::{ChatMessage, LlmRequest};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A prompt definition loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Creator identifier
    #[serde(rename = "createdBy", default)]
    pub created_by: String,

    /// Sampling settings
    #[serde(default)]
    pub behavior: PromptBehavior,

    /// Optional system message template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Input specification
    #[serde(default)]
    pub input: PromptInputSpec,

    /// Template string with Handlebars syntax
    pub template: String,

    /// Output specification
    pub output: PromptOutputSpec,
}

/// Sampling settings applied to the request built from a prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PromptBehavior {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(rename = "maxTokens", default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Input specification for the prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptInputSpec {
    /// Variables that must be supplied when building
    #[serde(default)]
    pub variables: Vec<String>,
}

/// Output specification for the prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptOutputSpec {
    /// Output format (e.g., "text", "markdown", "json")
    pub format: String,
}

/// A fully built prompt ready for LLM execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// System message (optional)
    pub system: Option<String>,

    /// User message (required)
    pub user: String,

    /// Metadata about the built prompt
    pub metadata: BuiltPromptMetadata,
}

/// Metadata about a built prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPromptMetadata {
    /// Source prompt ID
    #[serde(rename = "sourcePromptId")]
    pub source_prompt_id: String,

    /// Sampling settings carried over from the definition
    pub behavior: PromptBehavior,

    /// Template variables that were resolved
    #[serde(rename = "resolvedVariables")]
    pub resolved_variables: HashMap<String, String>,
}

impl BuiltPrompt {
    /// Create a new built prompt.
    pub fn new(
        system: Option<String>,
        user: String,
        source_prompt_id: String,
        behavior: PromptBehavior,
        resolved_variables: HashMap<String, String>,
    ) -> Self {
        Self {
            system,
            user,
            metadata: BuiltPromptMetadata {
                source_prompt_id,
                behavior,
                resolved_variables,
            },
        }
    }

    /// Turn the prompt into a chat request for `model`.
    pub fn to_request(&self, model: &str) -> LlmRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.push(ChatMessage::user(self.user.clone()));

        let mut request = LlmRequest::from_messages(messages, model);
        if let Some(temperature) = self.metadata.behavior.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.metadata.behavior.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_definition_deserialization() {
        let yaml = r#"
id: test.prompt
title: Test Prompt
apiVersion: "1.0"
createdBy: test
behavior:
  temperature: 0.0
  maxTokens: 256
system: "You are terse."
input:
  variables: [query]
template: "{{query}}"
output:
  format: json
"#;

        let def: PromptDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.id, "test.prompt");
        assert_eq!(def.behavior.temperature, Some(0.0));
        assert_eq!(def.behavior.max_tokens, Some(256));
        assert_eq!(def.system.as_deref(), Some("You are terse."));
        assert_eq!(def.input.variables, vec!["query".to_string()]);
    }

    #[test]
    fn test_to_request_carries_behavior() {
        let built = BuiltPrompt::new(
            Some("System message".to_string()),
            "User message".to_string(),
            "test.prompt".to_string(),
            PromptBehavior {
                temperature: Some(0.0),
                max_tokens: Some(64),
            },
            HashMap::new(),
        );

        let request = built.to_request("llama3.2");
        assert_eq!(request.model, "llama3.2");
        assert_eq!(request.system(), Some("System message"));
        assert_eq!(request.user_text(), "User message");
        assert_eq!(request.temperature, Some(0.0));
        assert_eq!(request.max_tokens, Some(64));
    }

    #[test]
    fn test_to_request_without_system() {
        let built = BuiltPrompt::new(
            None,
            "only user".to_string(),
            "p".to_string(),
            PromptBehavior::default(),
            HashMap::new(),
        );

        let request = built.to_request("m");
        assert_eq!(request.messages.len(), 1);
        assert!(request.temperature.is_none());
    }
}
