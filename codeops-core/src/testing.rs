//! Deterministic fakes for the collaborator traits
//!
//! Compiled for this crate's tests and, through the `test-support` feature,
//! for integration tests and downstream crates. None of them touch the network.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::completion::{Completion, CompletionError, CompletionRequest, CompletionService};
use crate::context::{ContextSnippet, ContextStore};
use crate::notify::Notifier;
use crate::pipeline::RunRecord;
use crate::prompts::Template;
use crate::repository::{PullRequest, RepositoryHost};
use crate::store::{RunStore, StoredRun};
use crate::{Error, Result};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn transient() -> CompletionError {
    CompletionError::Server {
        status: 503,
        message: "scripted outage".to_string(),
    }
}

/// Completion service that replays a fixed script
///
/// Once the script runs out it answers with the fallback text, or with a
/// malformed-response error when there is none.
#[derive(Debug, Default)]
pub struct ScriptedService {
    script: Mutex<VecDeque<std::result::Result<String, CompletionError>>>,
    fallback: Option<String>,
    latency: Option<Duration>,
    tokens_per_call: u64,
    calls: AtomicU32,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedService {
    /// Replay `script` in order
    pub fn new(script: Vec<std::result::Result<String, CompletionError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    /// Always answer with `text`
    pub fn always(text: impl Into<String>) -> Self {
        Self {
            fallback: Some(text.into()),
            ..Self::default()
        }
    }

    /// Fail `failures` times with a transient error, then answer with `text`
    pub fn failing_then(text: impl Into<String>, failures: usize) -> Self {
        Self {
            script: Mutex::new((0..failures).map(|_| Err(transient())).collect()),
            fallback: Some(text.into()),
            ..Self::default()
        }
    }

    /// Sleep before every answer
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Report this many tokens on every successful answer
    pub fn with_tokens(mut self, tokens: u64) -> Self {
        self.tokens_per_call = tokens;
        self
    }

    /// Number of attempts made against the service
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.requests).clone()
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        lock(&self.requests).last().cloned()
    }
}

#[async_trait]
impl CompletionService for ScriptedService {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> std::result::Result<Completion, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.requests).push(request.clone());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let next = lock(&self.script).pop_front();
        let text = match next {
            Some(step) => step?,
            None => self
                .fallback
                .clone()
                .ok_or_else(|| CompletionError::Malformed("script exhausted".to_string()))?,
        };

        Ok(Completion::new(text).with_tokens(self.tokens_per_call))
    }
}

/// Completion service answering each prompt template with canned text
#[derive(Debug)]
pub struct CannedService {
    responses: HashMap<Template, String>,
    failing: HashSet<Template>,
    tokens_per_call: u64,
    calls: Mutex<Vec<Template>>,
}

impl Default for CannedService {
    fn default() -> Self {
        Self::new()
    }
}

impl CannedService {
    pub const ANALYSIS: &'static str =
        "Primary failure: the build cannot find ENV_VAR.\nRoot cause: the CI secret is missing.";
    pub const PLAN: &'static str = "1. Add ENV_VAR to the CI environment\n\
         2. Re-run the failed build\n\
         3. Validate the deploy step";
    pub const REFLECTION: &'static str =
        "Risk: the value may differ per environment. Likelihood of success is high.";
    pub const CRITIQUE: &'static str = "**Key Strengths**: focused fix\n\
         **Weaknesses & Risks**: no rollback step\n\
         **Confidence Assessment**: confidence: 85\n\
         **Improvement Suggestions**: document the variable";
    pub const QUICK_REVIEW: &'static str = "Feasible plan. Confidence: 75";

    /// Canned answers for every stage prompt
    pub fn new() -> Self {
        let responses = [
            (Template::Analysis, Self::ANALYSIS),
            (Template::Planning, Self::PLAN),
            (Template::Reflection, Self::REFLECTION),
            (Template::Critique, Self::CRITIQUE),
            (Template::QuickReview, Self::QUICK_REVIEW),
        ]
        .into_iter()
        .map(|(t, text)| (t, text.to_string()))
        .collect();

        Self {
            responses,
            failing: HashSet::new(),
            tokens_per_call: 0,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Replace the answer for one template
    pub fn with_response(mut self, template: Template, text: impl Into<String>) -> Self {
        self.responses.insert(template, text.into());
        self
    }

    /// Fail every prompt rendered from `template` with a transient error
    pub fn failing_on(mut self, template: Template) -> Self {
        self.failing.insert(template);
        self
    }

    pub fn with_tokens(mut self, tokens: u64) -> Self {
        self.tokens_per_call = tokens;
        self
    }

    /// Attempts made for prompts rendered from `template`
    pub fn calls_for(&self, template: Template) -> usize {
        lock(&self.calls).iter().filter(|t| **t == template).count()
    }

    pub fn total_calls(&self) -> usize {
        lock(&self.calls).len()
    }

    fn identify(prompt: &str) -> Option<Template> {
        let heading = prompt.lines().next()?;
        [
            Template::Analysis,
            Template::Planning,
            Template::Reflection,
            Template::Critique,
            Template::QuickReview,
        ]
        .into_iter()
        .find(|t| t.raw().lines().next() == Some(heading))
    }
}

#[async_trait]
impl CompletionService for CannedService {
    fn name(&self) -> &'static str {
        "canned"
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> std::result::Result<Completion, CompletionError> {
        let template = Self::identify(&request.prompt)
            .ok_or_else(|| CompletionError::Malformed("unrecognized prompt".to_string()))?;
        lock(&self.calls).push(template);

        if self.failing.contains(&template) {
            return Err(transient());
        }

        let text = self
            .responses
            .get(&template)
            .cloned()
            .ok_or_else(|| CompletionError::Malformed("no canned response".to_string()))?;
        Ok(Completion::new(text).with_tokens(self.tokens_per_call))
    }
}

/// Notifier that keeps every message
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        lock(&self.messages).clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn push(&self, text: &str) -> Result<()> {
        lock(&self.messages).push(text.to_string());
        Ok(())
    }
}

/// Notifier whose every push fails
#[derive(Debug, Default)]
pub struct FailingNotifier {
    attempts: AtomicU32,
}

impl FailingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for FailingNotifier {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn push(&self, _text: &str) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(Error::NotificationFailed("webhook unreachable".to_string()))
    }
}

/// Context store that cannot be reached
#[derive(Debug, Default)]
pub struct UnreachableContextStore;

#[async_trait]
impl ContextStore for UnreachableContextStore {
    fn name(&self) -> &'static str {
        "unreachable"
    }

    async fn retrieve(&self, _query: &str, _top_k: usize) -> Result<Vec<ContextSnippet>> {
        Err(Error::ContextRetrievalDegraded(
            "connection refused".to_string(),
        ))
    }
}

/// Run store kept in memory
#[derive(Debug, Default)]
pub struct MemoryRunStore {
    runs: Mutex<Vec<StoredRun>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<RunRecord> {
        lock(&self.runs).iter().map(|r| r.record.clone()).collect()
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn save(&self, record: &RunRecord) -> Result<i64> {
        let mut runs = lock(&self.runs);
        let id = runs.len() as i64 + 1;
        runs.push(StoredRun {
            id,
            created_at: Utc::now(),
            record: record.clone(),
        });
        Ok(id)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<StoredRun>> {
        Ok(lock(&self.runs).iter().rev().take(limit).cloned().collect())
    }
}

/// Run store whose writes always fail
#[derive(Debug, Default)]
pub struct FailingRunStore;

#[async_trait]
impl RunStore for FailingRunStore {
    async fn save(&self, _record: &RunRecord) -> Result<i64> {
        Err(Error::PersistenceFailed("disk full".to_string()))
    }

    async fn recent(&self, _limit: usize) -> Result<Vec<StoredRun>> {
        Err(Error::PersistenceFailed("disk full".to_string()))
    }
}

/// Repository host that records operations instead of performing them
#[derive(Debug, Default)]
pub struct RecordingRepository {
    operations: Mutex<Vec<String>>,
    failing: HashSet<String>,
}

impl RecordingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the named operation (`create_branch`, `commit_file`, ...)
    pub fn failing_on(mut self, operation: &str) -> Self {
        self.failing.insert(operation.to_string());
        self
    }

    pub fn operations(&self) -> Vec<String> {
        lock(&self.operations).clone()
    }

    fn check(&self, operation: &str) -> Result<()> {
        if self.failing.contains(operation) {
            Err(Error::RepositoryOperationFailed(format!(
                "{} rejected",
                operation
            )))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RepositoryHost for RecordingRepository {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn create_branch(&self, branch: &str, from: &str) -> Result<()> {
        self.check("create_branch")?;
        lock(&self.operations).push(format!("create_branch {} from {}", branch, from));
        Ok(())
    }

    async fn commit_file(
        &self,
        branch: &str,
        path: &str,
        _content: &str,
        _message: &str,
    ) -> Result<String> {
        self.check("commit_file")?;
        lock(&self.operations).push(format!("commit_file {} {}", branch, path));
        Ok("0000000".to_string())
    }

    async fn open_pull_request(
        &self,
        head: &str,
        base: &str,
        _title: &str,
        _body: &str,
    ) -> Result<PullRequest> {
        self.check("open_pull_request")?;
        lock(&self.operations).push(format!("open_pull_request {} -> {}", head, base));
        Ok(PullRequest {
            number: 1,
            url: "https://example.test/pull/1".to_string(),
        })
    }

    async fn comment(&self, number: u64, _body: &str) -> Result<()> {
        self.check("comment")?;
        lock(&self.operations).push(format!("comment #{}", number));
        Ok(())
    }
}
