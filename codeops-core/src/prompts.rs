//! Prompt templates for the reasoning stages and the critic
//!
//! Templates are embedded markdown files with `{{VARIABLE}}` placeholders.
//! Substitution is single-pass, so placeholder-looking text inside a value
//! (a plan quoting a template, say) is left alone.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

const SYSTEM_PROMPT: &str = include_str!("prompts/system.md");
const ANALYSIS_PROMPT: &str = include_str!("prompts/analysis.md");
const PLANNING_PROMPT: &str = include_str!("prompts/planning.md");
const REFLECTION_PROMPT: &str = include_str!("prompts/reflection.md");
const CRITIC_SYSTEM_PROMPT: &str = include_str!("prompts/critic_system.md");
const CRITIQUE_PROMPT: &str = include_str!("prompts/critique.md");
const QUICK_REVIEW_SYSTEM_PROMPT: &str = include_str!("prompts/quick_review_system.md");
const QUICK_REVIEW_PROMPT: &str = include_str!("prompts/quick_review.md");

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([A-Z_]+)\}\}").unwrap());

/// The templates known to the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Template {
    /// Shared system instructions for the primary stages
    System,
    /// Context analysis stage
    Analysis,
    /// Action planning stage
    Planning,
    /// Plan reflection stage
    Reflection,
    /// System instructions for the critic
    CriticSystem,
    /// Full critique of plan and reflection
    Critique,
    /// System instructions for the quick review
    QuickReviewSystem,
    /// Plan-only quick review
    QuickReview,
}

impl Template {
    /// Get the raw template text
    pub fn raw(&self) -> &'static str {
        match self {
            Template::System => SYSTEM_PROMPT,
            Template::Analysis => ANALYSIS_PROMPT,
            Template::Planning => PLANNING_PROMPT,
            Template::Reflection => REFLECTION_PROMPT,
            Template::CriticSystem => CRITIC_SYSTEM_PROMPT,
            Template::Critique => CRITIQUE_PROMPT,
            Template::QuickReviewSystem => QUICK_REVIEW_SYSTEM_PROMPT,
            Template::QuickReview => QUICK_REVIEW_PROMPT,
        }
    }
}

/// Variables for rendering a template
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    variables: HashMap<String, String>,
}

impl PromptContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// Set a variable value (builder pattern)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Set the context block shown to the model
    pub fn with_context(self, context: impl Into<String>) -> Self {
        self.with("CONTEXT", context)
    }

    /// Set the analysis text
    pub fn with_analysis(self, analysis: impl Into<String>) -> Self {
        self.with("ANALYSIS", analysis)
    }

    /// Set the plan text
    pub fn with_plan(self, plan: impl Into<String>) -> Self {
        self.with("PLAN", plan)
    }

    /// Set the reflection text
    pub fn with_reflection(self, reflection: impl Into<String>) -> Self {
        self.with("REFLECTION", reflection)
    }
}

/// Render a template with the given context
pub fn render(template: Template, context: &PromptContext) -> String {
    render_template(template.raw(), context)
}

/// Keep the first `max_chars` characters of `text`, marking the cut with `...`
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn render_template(template: &str, context: &PromptContext) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            context
                .variables
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| "(not specified)".to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_have_headings() {
        assert!(Template::Analysis.raw().contains("# Context Analysis"));
        assert!(Template::Planning.raw().contains("# Action Planning"));
        assert!(Template::Reflection.raw().contains("# Plan Reflection"));
        assert!(Template::Critique.raw().contains("# Critic Review"));
        assert!(Template::QuickReview.raw().contains("# Quick Review"));
    }

    #[test]
    fn test_render_with_variables() {
        let context = PromptContext::new()
            .with_plan("1. Set ENV_VAR")
            .with_context("Build failed");

        let rendered = render(Template::Reflection, &context);
        assert!(rendered.contains("1. Set ENV_VAR"));
        assert!(rendered.contains("Build failed"));
        assert!(!rendered.contains("{{"));
    }

    #[test]
    fn test_render_unset_placeholder() {
        let rendered = render(Template::Planning, &PromptContext::new());
        assert!(rendered.contains("(not specified)"));
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let context = PromptContext::new().with_plan("literal {{CONTEXT}} in plan");
        let rendered = render(Template::QuickReview, &context);
        assert!(rendered.contains("literal {{CONTEXT}} in plan"));
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("abcdef", 3), "abc...");
        assert_eq!(preview("héllo wörld", 5), "héllo...");
        assert_eq!(preview("exact", 5), "exact");
    }

    #[test]
    fn test_system_prompts_are_static() {
        let context = PromptContext::new();
        assert_eq!(render(Template::System, &context), Template::System.raw());
        assert!(Template::CriticSystem.raw().contains("confidence score (0-100)"));
    }
}
