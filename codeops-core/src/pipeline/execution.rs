//! Plan execution stage
//!
//! By default nothing outside the process changes: the plan is broken into
//! action descriptions and the run is marked `simulated_success`. With
//! repository actions enabled and a [`RepositoryHost`] configured, keywords
//! in the plan trigger branch, pull request and comment operations.
//!
//! Keyword matching on free text is coarse. A plan that merely mentions a
//! "branch" will cut one.

use std::sync::{Arc, LazyLock};
use std::time::Instant;

use chrono::Utc;
use regex::Regex;
use tracing::{info, warn};

use super::record::{ExecutionResult, ExecutionStatus, ToolOutcome};
use crate::repository::RepositoryHost;
use crate::Result;

pub const TOOL_CREATE_BRANCH: &str = "create_branch";
pub const TOOL_COMMIT_FILE: &str = "commit_file";
pub const TOOL_OPEN_PULL_REQUEST: &str = "open_pull_request";
pub const TOOL_COMMENT: &str = "comment";

/// Actions reported when the plan has no list items
pub const DEFAULT_ACTIONS: [&str; 4] = [
    "Analyzed build logs",
    "Identified configuration issue",
    "Prepared fix implementation",
    "Validated solution approach",
];

static LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d+[.)]|[-*•])\s+(.+)$").unwrap());

static PR_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bprs?\b").unwrap());

/// Extract action descriptions from numbered or bulleted plan lines
pub fn parse_actions(plan: &str) -> Vec<String> {
    let actions: Vec<String> = plan
        .lines()
        .filter_map(|line| LIST_ITEM.captures(line.trim()))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().replace("**", "").replace('`', "").trim().to_string())
        .filter(|action| !action.is_empty())
        .collect();

    if actions.is_empty() {
        DEFAULT_ACTIONS.iter().map(|s| s.to_string()).collect()
    } else {
        actions
    }
}

/// Repository operations requested by a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestedOperations {
    pub branch: bool,
    pub pull_request: bool,
    pub comment: bool,
}

impl RequestedOperations {
    /// Scan plan text for action keywords
    pub fn detect(plan: &str) -> Self {
        let lower = plan.to_lowercase();
        Self {
            branch: lower.contains("branch"),
            pull_request: lower.contains("pull request") || PR_WORD.is_match(&lower),
            comment: lower.contains("comment"),
        }
    }

    pub fn any(&self) -> bool {
        self.branch || self.pull_request || self.comment
    }
}

/// Name of the branch a run's changes go on
pub fn fix_branch_name(commit_ref: &str) -> String {
    format!("codeops/fix-{}", short_ref(commit_ref))
}

fn short_ref(commit_ref: &str) -> String {
    let cleaned: String = commit_ref
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .take(12)
        .collect();
    if cleaned.is_empty() {
        "latest".to_string()
    } else {
        cleaned
    }
}

/// Runs the execution stage for a plan
#[derive(Clone, Default)]
pub struct PlanExecutor {
    repository: Option<Arc<dyn RepositoryHost>>,
    repository_actions: bool,
    base_branch: String,
}

impl std::fmt::Debug for PlanExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanExecutor")
            .field("repository", &self.repository.as_ref().map(|r| r.name()))
            .field("repository_actions", &self.repository_actions)
            .field("base_branch", &self.base_branch)
            .finish()
    }
}

impl PlanExecutor {
    /// Create an executor that only simulates
    pub fn simulated() -> Self {
        Self {
            base_branch: "main".to_string(),
            ..Self::default()
        }
    }

    /// Create an executor that may act on a repository
    ///
    /// Operations run only when `repository_actions` is set.
    pub fn with_repository(
        repository: Arc<dyn RepositoryHost>,
        repository_actions: bool,
        base_branch: impl Into<String>,
    ) -> Self {
        Self {
            repository: Some(repository),
            repository_actions,
            base_branch: base_branch.into(),
        }
    }

    /// Execute a plan; repository failures are recorded, never returned
    pub async fn execute(&self, plan: &str, commit_ref: &str) -> ExecutionResult {
        let started = Instant::now();
        let actions = parse_actions(plan);

        let tool_results = match (&self.repository, self.repository_actions) {
            (Some(repository), true) => {
                let requested = RequestedOperations::detect(plan);
                self.run_operations(repository.as_ref(), requested, plan, &actions, commit_ref)
                    .await
            }
            _ => Vec::new(),
        };

        let status = if tool_results.is_empty() {
            ExecutionStatus::SimulatedSuccess
        } else if tool_results.iter().all(|t| t.ok) {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::CompletedWithErrors
        };

        info!(
            status = %status,
            actions = actions.len(),
            operations = tool_results.len(),
            "Plan executed"
        );

        ExecutionResult {
            status,
            actions_taken: actions,
            execution_time: started.elapsed().as_secs_f64(),
            tool_results,
            timestamp: Utc::now(),
        }
    }

    async fn run_operations(
        &self,
        repository: &dyn RepositoryHost,
        requested: RequestedOperations,
        plan: &str,
        actions: &[String],
        commit_ref: &str,
    ) -> Vec<ToolOutcome> {
        let mut outcomes = Vec::new();
        if !requested.any() {
            return outcomes;
        }

        let branch = fix_branch_name(commit_ref);
        let mut branch_ready = false;

        if requested.branch || requested.pull_request {
            let result = repository.create_branch(&branch, &self.base_branch).await;
            branch_ready = result.is_ok();
            outcomes.push(outcome(TOOL_CREATE_BRANCH, result.map(|_| branch.clone())));
        }

        let mut pull_request = None;
        if requested.pull_request {
            if branch_ready {
                let path = format!(".codeops/plans/{}.md", short_ref(commit_ref));
                let message = format!("Add CodeOps plan for {}", commit_ref);
                let committed = repository
                    .commit_file(&branch, &path, plan, &message)
                    .await;
                let committed_ok = committed.is_ok();
                outcomes.push(outcome(TOOL_COMMIT_FILE, committed));

                if committed_ok {
                    let title = format!("CodeOps: proposed fix for {}", commit_ref);
                    let body = action_list(actions);
                    let opened = repository
                        .open_pull_request(&branch, &self.base_branch, &title, &body)
                        .await;
                    if let Ok(pr) = &opened {
                        pull_request = Some(pr.number);
                    }
                    outcomes.push(outcome(TOOL_OPEN_PULL_REQUEST, opened.map(|pr| pr.url)));
                }
            } else {
                outcomes.push(ToolOutcome {
                    tool: TOOL_OPEN_PULL_REQUEST.to_string(),
                    ok: false,
                    detail: format!("skipped: branch {} unavailable", branch),
                });
            }
        }

        if requested.comment {
            match pull_request {
                Some(number) => {
                    let body = format!("CodeOps agent actions:\n\n{}", action_list(actions));
                    let commented = repository.comment(number, &body).await;
                    outcomes.push(outcome(TOOL_COMMENT, commented.map(|_| format!("#{}", number))));
                }
                None => warn!("Plan asks for a comment but no pull request was opened"),
            }
        }

        outcomes
    }
}

fn action_list(actions: &[String]) -> String {
    actions
        .iter()
        .map(|a| format!("- {}", a))
        .collect::<Vec<_>>()
        .join("\n")
}

fn outcome(tool: &str, result: Result<String>) -> ToolOutcome {
    match result {
        Ok(detail) => ToolOutcome {
            tool: tool.to_string(),
            ok: true,
            detail,
        },
        Err(e) => {
            warn!(tool, error = %e, "Repository operation failed");
            ToolOutcome {
                tool: tool.to_string(),
                ok: false,
                detail: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingRepository;

    #[test]
    fn test_parse_numbered_and_bulleted() {
        let plan = "Here is the plan:\n1. **Set** ENV_VAR in CI\n2) Re-run `build`\n- Notify team\n• Close ticket";
        assert_eq!(
            parse_actions(plan),
            vec!["Set ENV_VAR in CI", "Re-run build", "Notify team", "Close ticket"]
        );
    }

    #[test]
    fn test_parse_falls_back_to_defaults() {
        let actions = parse_actions("Just fix it.");
        assert_eq!(actions.len(), 4);
        assert_eq!(actions[0], "Analyzed build logs");
    }

    #[test]
    fn test_detect_keywords() {
        let ops = RequestedOperations::detect("Create a branch, open a PR and comment on it");
        assert!(ops.branch && ops.pull_request && ops.comment);

        let ops = RequestedOperations::detect("Improve the process");
        assert!(!ops.any());

        assert!(RequestedOperations::detect("Open a pull request").pull_request);
    }

    #[test]
    fn test_fix_branch_name() {
        assert_eq!(fix_branch_name("abc123def4567890"), "codeops/fix-abc123def456");
        assert_eq!(fix_branch_name("latest"), "codeops/fix-latest");
        assert_eq!(fix_branch_name("../"), "codeops/fix-latest");
        assert_eq!(fix_branch_name("~^"), "codeops/fix-latest");
    }

    #[tokio::test]
    async fn test_simulated_by_default() {
        let result = PlanExecutor::simulated()
            .execute("1. Create a branch\n2. Open a PR", "abc")
            .await;
        assert_eq!(result.status, ExecutionStatus::SimulatedSuccess);
        assert!(result.tool_results.is_empty());
        assert_eq!(result.actions_taken.len(), 2);
    }

    #[tokio::test]
    async fn test_actions_disabled_keeps_repository_untouched() {
        let repo = Arc::new(RecordingRepository::new());
        let executor = PlanExecutor::with_repository(repo.clone(), false, "main");

        let result = executor.execute("1. Create a branch", "abc").await;
        assert_eq!(result.status, ExecutionStatus::SimulatedSuccess);
        assert!(repo.operations().is_empty());
    }

    #[tokio::test]
    async fn test_full_repository_flow() {
        let repo = Arc::new(RecordingRepository::new());
        let executor = PlanExecutor::with_repository(repo.clone(), true, "main");

        let result = executor
            .execute("1. Create a branch\n2. Open a pull request\n3. Comment with results", "abc123")
            .await;

        assert_eq!(result.status, ExecutionStatus::Completed);
        let tools: Vec<_> = result.tool_results.iter().map(|t| t.tool.as_str()).collect();
        assert_eq!(
            tools,
            vec![TOOL_CREATE_BRANCH, TOOL_COMMIT_FILE, TOOL_OPEN_PULL_REQUEST, TOOL_COMMENT]
        );
        assert_eq!(result.pull_request_url(), Some("https://example.test/pull/1"));
        assert_eq!(
            repo.operations(),
            vec![
                "create_branch codeops/fix-abc123 from main",
                "commit_file codeops/fix-abc123 .codeops/plans/abc123.md",
                "open_pull_request codeops/fix-abc123 -> main",
                "comment #1",
            ]
        );
    }

    #[tokio::test]
    async fn test_repository_failure_is_recorded() {
        let repo = Arc::new(RecordingRepository::new().failing_on(TOOL_CREATE_BRANCH));
        let executor = PlanExecutor::with_repository(repo.clone(), true, "main");

        let result = executor.execute("1. Open a PR", "abc").await;

        assert_eq!(result.status, ExecutionStatus::CompletedWithErrors);
        assert_eq!(result.tool_results.len(), 2);
        assert!(!result.tool_results[0].ok);
        assert!(result.tool_results[1].detail.starts_with("skipped"));
        assert_eq!(result.pull_request_url(), None);
    }

    #[tokio::test]
    async fn test_comment_without_pull_request_is_skipped() {
        let repo = Arc::new(RecordingRepository::new());
        let executor = PlanExecutor::with_repository(repo.clone(), true, "main");

        let result = executor.execute("1. Leave a comment", "abc").await;
        assert_eq!(result.status, ExecutionStatus::SimulatedSuccess);
        assert!(repo.operations().is_empty());
    }
}
