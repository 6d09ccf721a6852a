//! Core data models used throughout the readiness audit.
//!
//! These types represent the repositories, metrics, and violations that flow
//! through the acquisition → collection → evaluation → report pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Org-scoped repository name (e.g. `payments-api`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepoId(String);

impl RepoId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A repository to audit, as produced by a scope resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoTarget {
    pub id: RepoId,
    pub clone_url: String,
}

/// The set of repositories an audit covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Every repository a team has access to, resolved via the hosting API.
    Team(String),
    /// An explicit list of repository names in the configured org.
    Repos(Vec<String>),
}

impl Scope {
    /// Label stored in the report's `scope` field.
    pub fn label(&self) -> &str {
        match self {
            Scope::Team(team) => team,
            Scope::Repos(_) => "individual_repos",
        }
    }

    /// Subdirectory of the base path that clones for this scope live under.
    pub fn clone_subdir(&self) -> Option<&str> {
        match self {
            Scope::Team(team) => Some(team),
            Scope::Repos(_) => None,
        }
    }
}

/// Structural snapshot of one repository, as reported by `git-sizer --json`.
///
/// Every field is optional: `None` means the tool did not report it, which
/// is distinct from a reported zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_blob_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_commit_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_tree_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_blob_size: Option<u64>,
    #[serde(
        default,
        rename = "max_blob_size_blob",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_blob_size_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_commit_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_path_name_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_path_name_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_commit_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_history_depth: Option<u64>,
}

impl RepoMetrics {
    /// Commit plus tree bytes. A missing half counts as zero; `None` only
    /// when neither was reported.
    pub fn metadata_size(&self) -> Option<u64> {
        match (self.unique_commit_size, self.unique_tree_size) {
            (None, None) => None,
            (commits, trees) => Some(commits.unwrap_or(0).saturating_add(trees.unwrap_or(0))),
        }
    }

    /// True when the analysis tool reported nothing at all.
    pub fn is_empty(&self) -> bool {
        *self == RepoMetrics::default()
    }
}

/// How much a rule violation matters for migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocks migration until remediated.
    Hard,
    /// A warning; migration is still possible.
    Advisory,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Hard => f.write_str("hard"),
            Severity::Advisory => f.write_str("advisory"),
        }
    }
}

/// A single rule that a repository's metrics exceeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub rule_id: String,
    pub description: String,
    pub severity: Severity,
    pub observed: u64,
    pub message: String,
}

/// Audit result for one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoEntry {
    pub repo: RepoId,
    pub metrics: RepoMetrics,
    pub violations: Vec<Violation>,
    /// Set when the analysis tool failed; the limits were never checked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_error: Option<String>,
}

impl RepoEntry {
    /// True when metrics were collected and checked against the limits.
    pub fn is_evaluated(&self) -> bool {
        self.analysis_error.is_none()
    }

    pub fn hard_violations(&self) -> impl Iterator<Item = &Violation> {
        self.violations
            .iter()
            .filter(|v| v.severity == Severity::Hard)
    }

    pub fn advisories(&self) -> impl Iterator<Item = &Violation> {
        self.violations
            .iter()
            .filter(|v| v.severity == Severity::Advisory)
    }
}

/// The full result of one audit run.
///
/// Entries keep the order repositories were resolved in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub scope: String,
    pub analysis_date: DateTime<Utc>,
    pub repositories: Vec<RepoEntry>,
}

impl AnalysisReport {
    pub fn new(scope: impl Into<String>, analysis_date: DateTime<Utc>) -> Self {
        Self {
            scope: scope.into(),
            analysis_date,
            repositories: Vec::new(),
        }
    }

    pub fn entry(&self, repo: &str) -> Option<&RepoEntry> {
        self.repositories.iter().find(|e| e.repo.as_str() == repo)
    }

    /// Number of repositories with at least one hard violation.
    pub fn blocked_count(&self) -> usize {
        self.repositories
            .iter()
            .filter(|e| e.hard_violations().next().is_some())
            .count()
    }

    /// Number of repositories whose analysis failed.
    pub fn not_evaluated_count(&self) -> usize {
        self.repositories
            .iter()
            .filter(|e| !e.is_evaluated())
            .count()
    }
}

/// A repository that was skipped or degraded during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoFailure {
    pub repo: RepoId,
    pub stage: FailureStage,
    pub cause: String,
}

/// Pipeline stage in which a per-repository failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// The repository could not be cloned; it is absent from the report.
    Acquisition,
    /// The analysis tool failed; the repository is reported with empty metrics.
    Collection,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureStage::Acquisition => f.write_str("skipped"),
            FailureStage::Collection => f.write_str("no metrics"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_parse_flat_sizer_output() {
        let raw = r#"{
            "unique_blob_size": 2048,
            "max_blob_size": 1024,
            "max_blob_size_blob": "abc123 (assets/logo.png)",
            "unique_commit_count": 12,
            "reference_count": 4
        }"#;
        let metrics: RepoMetrics = serde_json::from_str(raw).unwrap();
        assert_eq!(metrics.unique_blob_size, Some(2048));
        assert_eq!(metrics.max_blob_size, Some(1024));
        assert_eq!(
            metrics.max_blob_size_path.as_deref(),
            Some("abc123 (assets/logo.png)")
        );
        assert_eq!(metrics.unique_commit_count, Some(12));
        assert_eq!(metrics.max_commit_size, None);
    }

    #[test]
    fn absent_fields_are_not_serialized() {
        let metrics = RepoMetrics {
            max_history_depth: Some(7),
            ..Default::default()
        };
        let json = serde_json::to_string(&metrics).unwrap();
        assert_eq!(json, r#"{"max_history_depth":7}"#);
    }

    #[test]
    fn analysis_error_only_serialized_when_set() {
        let mut entry = RepoEntry {
            repo: RepoId::new("web"),
            metrics: RepoMetrics::default(),
            violations: vec![],
            analysis_error: None,
        };
        let clean = serde_json::to_string(&entry).unwrap();
        assert!(!clean.contains("analysis_error"));
        assert!(entry.is_evaluated());

        entry.analysis_error = Some("git-sizer timed out".into());
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains(r#""analysis_error":"git-sizer timed out""#));
        let back: RepoEntry = serde_json::from_str(&json).unwrap();
        assert!(!back.is_evaluated());

        let legacy: RepoEntry =
            serde_json::from_str(r#"{"repo":"web","metrics":{},"violations":[]}"#).unwrap();
        assert_eq!(legacy.analysis_error, None);
    }

    #[test]
    fn scope_labels() {
        assert_eq!(Scope::Team("platform".into()).label(), "platform");
        assert_eq!(Scope::Repos(vec!["a".into()]).label(), "individual_repos");
        assert_eq!(Scope::Repos(vec![]).clone_subdir(), None);
    }
}
