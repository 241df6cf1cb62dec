//! Critic agent: a second opinion on the primary stages' output
//!
//! The critic uses its own prompts and sampling settings, and scores every
//! review with [`confidence::extract`], so a result always carries a
//! confidence even when the model never states one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::completion::CompletionClient;
use crate::confidence;
use crate::prompts::{preview, render, PromptContext, Template};
use crate::Result;

const CRITIQUE_TEMPERATURE: f32 = 0.2;
const CRITIQUE_MAX_TOKENS: u32 = 800;
const QUICK_REVIEW_TEMPERATURE: f32 = 0.3;
const QUICK_REVIEW_MAX_TOKENS: u32 = 400;

/// Lines mentioning these words are promoted into the summary
const KEY_POINT_MARKERS: [&str; 4] = ["strength", "weakness", "risk", "improvement"];
const MAX_KEY_POINTS: usize = 3;
const SUMMARY_FALLBACK_CHARS: usize = 200;

/// Which review produced a [`CritiqueResult`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReviewKind {
    /// Plan, reflection and context
    #[default]
    Full,
    /// Plan only
    QuickReview,
}

/// A critic review with its confidence score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CritiqueResult {
    pub text: String,
    /// Always in `0..=100`
    pub confidence: u8,
    pub plan_length: usize,
    pub reflection_length: usize,
    pub kind: ReviewKind,
    #[serde(default)]
    pub tokens_used: u64,
    pub timestamp: DateTime<Utc>,
}

/// Independent reviewer of plans and reflections
#[derive(Debug, Clone)]
pub struct CriticAgent {
    critique_client: CompletionClient,
    quick_client: CompletionClient,
}

impl CriticAgent {
    /// Create a critic on top of a completion client
    ///
    /// The client's retry policy is kept; sampling settings are the critic's own.
    pub fn new(client: CompletionClient) -> Self {
        Self {
            critique_client: client
                .clone()
                .with_temperature(CRITIQUE_TEMPERATURE)
                .with_max_tokens(CRITIQUE_MAX_TOKENS),
            quick_client: client
                .with_temperature(QUICK_REVIEW_TEMPERATURE)
                .with_max_tokens(QUICK_REVIEW_MAX_TOKENS),
        }
    }

    /// Review a plan and its reflection, with optional extra context
    pub async fn critique(
        &self,
        plan: &str,
        reflection: &str,
        context: &str,
    ) -> Result<CritiqueResult> {
        let context_section = if context.trim().is_empty() {
            String::new()
        } else {
            format!("=== ADDITIONAL CONTEXT ===\n{}\n\n", context)
        };

        let prompt = render(
            Template::Critique,
            &PromptContext::new()
                .with_plan(plan)
                .with_reflection(reflection)
                .with("CONTEXT_SECTION", context_section),
        );

        let completion = self
            .critique_client
            .complete(&prompt, Template::CriticSystem.raw())
            .await?;
        let confidence = confidence::extract(&completion.text);

        info!(confidence, tokens = completion.tokens_used, "Critique completed");

        Ok(CritiqueResult {
            text: completion.text,
            confidence,
            plan_length: plan.chars().count(),
            reflection_length: reflection.chars().count(),
            kind: ReviewKind::Full,
            tokens_used: completion.tokens_used,
            timestamp: Utc::now(),
        })
    }

    /// Lighter plan-only review for use outside the pipeline
    pub async fn quick_review(&self, plan: &str) -> Result<CritiqueResult> {
        let prompt = render(Template::QuickReview, &PromptContext::new().with_plan(plan));

        let completion = self
            .quick_client
            .complete(&prompt, Template::QuickReviewSystem.raw())
            .await?;
        let confidence = confidence::extract(&completion.text);

        info!(confidence, tokens = completion.tokens_used, "Quick review completed");

        Ok(CritiqueResult {
            text: completion.text,
            confidence,
            plan_length: plan.chars().count(),
            reflection_length: 0,
            kind: ReviewKind::QuickReview,
            tokens_used: completion.tokens_used,
            timestamp: Utc::now(),
        })
    }

    /// Short fixed-format summary for notifications
    ///
    /// Shows the confidence and up to three key lines; falls back to the
    /// opening of the critique when no line mentions a key point.
    pub fn critique_summary(result: &CritiqueResult) -> String {
        let key_points: Vec<String> = result
            .text
            .lines()
            .map(str::trim)
            .filter(|line| {
                let lower = line.to_lowercase();
                !line.is_empty() && KEY_POINT_MARKERS.iter().any(|m| lower.contains(m))
            })
            .take(MAX_KEY_POINTS)
            .map(|line| format!("• {}", line))
            .collect();

        let body = if key_points.is_empty() {
            preview(&result.text, SUMMARY_FALLBACK_CHARS)
        } else {
            key_points.join("\n")
        };

        format!(
            "🧠 **Critic Review** (Confidence: {}/100)\n\n{}",
            result.confidence, body
        )
    }
}
