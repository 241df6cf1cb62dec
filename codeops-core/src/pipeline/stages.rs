//! The completion-backed reasoning stages
//!
//! Each stage renders its template from earlier outputs on the [`RunState`],
//! makes one completion call and stores the result. A failed call is reported
//! as [`Error::StageFailed`](crate::Error::StageFailed) for that stage.

use chrono::Utc;
use tracing::{debug, info};

use super::record::{ContextAnalysis, RunState};
use super::state::StageName;
use crate::completion::CompletionClient;
use crate::prompts::{preview, render, PromptContext, Template};
use crate::{Error, Result};

/// Shown to the model in place of context when retrieval found nothing
pub const NO_CONTEXT_PLACEHOLDER: &str = "(no context available)";

/// Number each snippet so the model can refer back to it
pub fn join_snippets(snippets: &[String]) -> String {
    snippets
        .iter()
        .enumerate()
        .map(|(i, snippet)| format!("Snippet {}: {}", i + 1, snippet))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Analysis, planning and reflection over a shared completion client
#[derive(Debug, Clone)]
pub struct ReasoningStages {
    client: CompletionClient,
    context_preview_chars: usize,
}

impl ReasoningStages {
    pub fn new(client: CompletionClient, context_preview_chars: usize) -> Self {
        Self {
            client,
            context_preview_chars,
        }
    }

    async fn call(&self, stage: StageName, prompt: &str, run: &mut RunState) -> Result<String> {
        debug!(stage = %stage, prompt_chars = prompt.len(), "Calling completion service");
        let completion = self
            .client
            .complete(prompt, Template::System.raw())
            .await
            .map_err(|e| e.in_stage(stage))?;
        run.add_tokens(completion.tokens_used);
        Ok(completion.text)
    }

    /// Analyze the retrieved snippets; an empty list is analyzed as "no context"
    pub async fn analyze(&self, run: &mut RunState) -> Result<()> {
        let joined = join_snippets(&run.context_snippets);
        let context = if joined.is_empty() {
            NO_CONTEXT_PLACEHOLDER
        } else {
            joined.as_str()
        };

        let prompt = render(Template::Analysis, &PromptContext::new().with_context(context));
        let analysis = self.call(StageName::Analysis, &prompt, run).await?;

        info!(snippets = run.context_snippets.len(), "Context analyzed");
        run.analysis = Some(ContextAnalysis {
            analysis,
            snippet_count: run.context_snippets.len(),
            context_preview: preview(&joined, self.context_preview_chars),
            timestamp: Utc::now(),
        });
        run.advance(StageName::Analysis);
        Ok(())
    }

    /// Turn the analysis into a numbered action plan
    pub async fn plan(&self, run: &mut RunState) -> Result<()> {
        let analysis = run
            .analysis
            .as_ref()
            .ok_or_else(|| missing_input(StageName::Planning, "analysis"))?;

        let prompt = render(
            Template::Planning,
            &PromptContext::new()
                .with_analysis(analysis.analysis.as_str())
                .with_context(prompt_context(analysis)),
        );
        let plan = self.call(StageName::Planning, &prompt, run).await?;

        info!(plan_chars = plan.len(), "Plan created");
        run.plan = Some(plan);
        run.advance(StageName::Planning);
        Ok(())
    }

    /// Reflect on the plan against the original context
    pub async fn reflect(&self, run: &mut RunState) -> Result<()> {
        let plan = run
            .plan
            .as_deref()
            .ok_or_else(|| missing_input(StageName::Reflection, "plan"))?;
        let context = run
            .analysis
            .as_ref()
            .map(prompt_context)
            .unwrap_or(NO_CONTEXT_PLACEHOLDER);

        let prompt = render(
            Template::Reflection,
            &PromptContext::new().with_plan(plan).with_context(context),
        );
        let reflection = self.call(StageName::Reflection, &prompt, run).await?;

        info!(reflection_chars = reflection.len(), "Plan reflected");
        run.reflection = Some(reflection);
        run.advance(StageName::Reflection);
        Ok(())
    }
}

fn prompt_context(analysis: &ContextAnalysis) -> &str {
    if analysis.context_preview.is_empty() {
        NO_CONTEXT_PLACEHOLDER
    } else {
        &analysis.context_preview
    }
}

fn missing_input(stage: StageName, what: &str) -> Error {
    Error::InvalidInput(format!("no {} available", what)).in_stage(stage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::RetryPolicy;
    use crate::pipeline::PipelineState;
    use crate::testing::ScriptedService;
    use std::sync::Arc;
    use std::time::Duration;

    fn stages(service: Arc<ScriptedService>, max_attempts: u32) -> ReasoningStages {
        let client = CompletionClient::new(service).with_policy(
            RetryPolicy::new(max_attempts).with_base_delay(Duration::from_millis(1)),
        );
        ReasoningStages::new(client, 500)
    }

    #[test]
    fn test_join_snippets() {
        let joined = join_snippets(&["a".to_string(), "b".to_string()]);
        assert_eq!(joined, "Snippet 1: a\nSnippet 2: b");
        assert_eq!(join_snippets(&[]), "");
    }

    #[tokio::test]
    async fn test_analyze_empty_context() {
        let service = Arc::new(ScriptedService::always("nothing to see"));
        let mut run = RunState::new(None);

        stages(service.clone(), 3).analyze(&mut run).await.unwrap();

        let analysis = run.analysis.unwrap();
        assert_eq!(analysis.snippet_count, 0);
        assert_eq!(analysis.context_preview, "");
        assert_eq!(run.state, PipelineState::Analyzed);
        assert!(service
            .last_request()
            .unwrap()
            .prompt
            .contains(NO_CONTEXT_PLACEHOLDER));
    }

    #[tokio::test]
    async fn test_analyze_truncates_preview() {
        let service = Arc::new(ScriptedService::always("analysis").with_tokens(12));
        let mut run = RunState::new(None);
        run.context_snippets = vec!["x".repeat(600)];

        stages(service, 3).analyze(&mut run).await.unwrap();

        let analysis = run.analysis.unwrap();
        assert_eq!(analysis.snippet_count, 1);
        assert_eq!(analysis.context_preview.chars().count(), 503);
        assert!(analysis.context_preview.starts_with("Snippet 1: "));
        assert_eq!(run.tokens_used, 12);
    }

    #[tokio::test]
    async fn test_plan_and_reflect_use_earlier_outputs() {
        let service = Arc::new(ScriptedService::new(vec![
            Ok("the analysis".to_string()),
            Ok("1. the plan".to_string()),
            Ok("the reflection".to_string()),
        ]));
        let stages = stages(service.clone(), 3);
        let mut run = RunState::new(None);
        run.context_snippets = vec!["Build failed".to_string()];

        stages.analyze(&mut run).await.unwrap();
        stages.plan(&mut run).await.unwrap();
        let planning_prompt = service.last_request().unwrap().prompt;
        assert!(planning_prompt.contains("the analysis"));
        assert!(planning_prompt.contains("Snippet 1: Build failed"));

        stages.reflect(&mut run).await.unwrap();
        assert!(service.last_request().unwrap().prompt.contains("1. the plan"));
        assert_eq!(run.reflection.as_deref(), Some("the reflection"));
        assert_eq!(run.state, PipelineState::Reflected);
    }

    #[tokio::test]
    async fn test_retry_bound_within_stage() {
        let service = Arc::new(ScriptedService::failing_then("analysis", 2));
        let mut run = RunState::new(None);
        stages(service.clone(), 3).analyze(&mut run).await.unwrap();
        assert_eq!(service.calls(), 3);

        let service = Arc::new(ScriptedService::failing_then("analysis", 2));
        let mut run = RunState::new(None);
        let err = stages(service.clone(), 2).analyze(&mut run).await.unwrap_err();
        assert_eq!(service.calls(), 2);
        assert!(err.is_completion_unavailable());
        assert!(matches!(
            err,
            Error::StageFailed {
                stage: StageName::Analysis,
                ..
            }
        ));
        assert!(run.analysis.is_none());
    }

    #[tokio::test]
    async fn test_plan_requires_analysis() {
        let service = Arc::new(ScriptedService::always("unused"));
        let mut run = RunState::new(None);

        let err = stages(service.clone(), 3).plan(&mut run).await.unwrap_err();
        assert!(matches!(
            err,
            Error::StageFailed {
                stage: StageName::Planning,
                ..
            }
        ));
        assert_eq!(service.calls(), 0);
    }
}
