//! Prompt builder for rendering templates.

use crate::types::{BuiltPrompt, PromptDefinition};
use diligence_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::collections::HashMap;

/// Build a prompt from a definition and input variables.
///
/// Every variable listed under `input.variables` must be present. Optional
/// variables referenced by the template (e.g. `{{#if feedback}}`) may be
/// omitted and render as empty.
///
/// # Example
/// ```no_run
/// use diligence_prompt::{build_prompt, PromptDefinition};
/// use std::collections::HashMap;
///
/// # fn example(def: PromptDefinition) -> Result<(), Box<dyn std::error::Error>> {
/// let mut vars = HashMap::new();
/// vars.insert("query".to_string(), "Compare Apple and Microsoft margins".to_string());
///
/// let built = build_prompt(&def, vars)?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    variables: HashMap<String, String>,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    if let Some(missing) = definition
        .input
        .variables
        .iter()
        .find(|name| !variables.contains_key(name.as_str()))
    {
        return Err(AppError::Prompt(format!(
            "Prompt {} requires variable '{}'",
            definition.id, missing
        )));
    }

    let user = render_template(&definition.template, &variables)?;
    let system = definition
        .system
        .as_deref()
        .map(|template| render_template(template, &variables))
        .transpose()?
        .map(|s| s.trim_end().to_string());

    Ok(BuiltPrompt::new(
        system,
        user,
        definition.id.clone(),
        definition.behavior.clone(),
        variables,
    ))
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Disable HTML escaping for plain text
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", &variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PromptBehavior, PromptInputSpec, PromptOutputSpec};

    fn create_test_definition() -> PromptDefinition {
        PromptDefinition {
            id: "test.prompt".to_string(),
            title: "Test".to_string(),
            api_version: "1.0".to_string(),
            created_by: "test".to_string(),
            behavior: PromptBehavior {
                temperature: Some(0.2),
                max_tokens: None,
            },
            system: Some("Analyst for {{company}}".to_string()),
            input: PromptInputSpec {
                variables: vec!["query".to_string()],
            },
            template: "Question: {{query}}{{#if feedback}} (fix: {{feedback}}){{/if}}".to_string(),
            output: PromptOutputSpec {
                format: "markdown".to_string(),
            },
        }
    }

    #[test]
    fn test_render_simple_template() {
        let mut vars = HashMap::new();
        vars.insert("query".to_string(), "R&D spend <2023>".to_string());

        let result = render_template("Question: {{query}}", &vars).unwrap();
        // No HTML escaping
        assert_eq!(result, "Question: R&D spend <2023>");
    }

    #[test]
    fn test_build_prompt_optional_block() {
        let def = create_test_definition();
        let mut vars = HashMap::new();
        vars.insert("query".to_string(), "Q".to_string());
        vars.insert("company".to_string(), "Apple".to_string());

        let built = build_prompt(&def, vars.clone()).unwrap();
        assert_eq!(built.user, "Question: Q");
        assert_eq!(built.system.as_deref(), Some("Analyst for Apple"));
        assert_eq!(built.metadata.behavior.temperature, Some(0.2));

        vars.insert("feedback".to_string(), "cite 10-K".to_string());
        let built = build_prompt(&def, vars).unwrap();
        assert_eq!(built.user, "Question: Q (fix: cite 10-K)");
    }

    #[test]
    fn test_build_prompt_missing_required_variable() {
        let def = create_test_definition();
        let err = build_prompt(&def, HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("requires variable 'query'"));
    }

    #[test]
    fn test_render_template_invalid_syntax() {
        let result = render_template("{{#if}}unclosed", &HashMap::new());
        assert!(result.is_err());
    }
}
