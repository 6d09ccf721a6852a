//! Migration-readiness limits.
//!
//! Limits are data: each [`Rule`] pairs an extractor over [`RepoMetrics`]
//! with a threshold and severity, and [`evaluate_with`] walks any rule table
//! the same way. A rule fires only when the observed value is strictly
//! greater than its limit; a metric the analysis tool did not report never
//! fires.

use crate::models::{RepoMetrics, Severity, Violation};
use crate::report::format_size;

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

/// How an observed value is rendered in a violation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    /// Binary-prefixed size (`500.00 MB`).
    Size,
    /// Plain byte count (`312 bytes`).
    Bytes,
}

#[derive(Clone, Copy)]
pub struct Rule {
    pub id: &'static str,
    pub description: &'static str,
    pub severity: Severity,
    pub limit: u64,
    pub unit: Unit,
    /// Word introducing the observed value: "Current", "Largest", ...
    pub observed_label: &'static str,
    pub extract: fn(&RepoMetrics) -> Option<u64>,
    /// Where the offending object lives, for rules that can point at one.
    pub locate: Option<fn(&RepoMetrics) -> Option<&str>>,
}

impl Rule {
    /// Check one repository against this rule.
    pub fn check(&self, metrics: &RepoMetrics) -> Option<Violation> {
        let observed = (self.extract)(metrics)?;
        if observed <= self.limit {
            return None;
        }
        Some(Violation {
            rule_id: self.id.to_string(),
            description: self.description.to_string(),
            severity: self.severity,
            observed,
            message: self.message(metrics, observed),
        })
    }

    fn message(&self, metrics: &RepoMetrics, observed: u64) -> String {
        let value = match self.unit {
            Unit::Size => format_size(observed),
            Unit::Bytes => format!("{} bytes", observed),
        };
        match self.locate {
            Some(locate) => format!(
                "{} ({}: {} - {})",
                self.description,
                self.observed_label,
                value,
                locate(metrics).unwrap_or("unknown")
            ),
            None => format!("{} ({}: {})", self.description, self.observed_label, value),
        }
    }

    pub fn limit_display(&self) -> String {
        match self.unit {
            Unit::Size => format_size(self.limit),
            Unit::Bytes => format!("{} bytes", self.limit),
        }
    }
}

fn unique_blob_size(m: &RepoMetrics) -> Option<u64> {
    m.unique_blob_size
}

fn metadata_size(m: &RepoMetrics) -> Option<u64> {
    m.metadata_size()
}

fn max_blob_size(m: &RepoMetrics) -> Option<u64> {
    m.max_blob_size
}

fn max_blob_path(m: &RepoMetrics) -> Option<&str> {
    m.max_blob_size_path.as_deref()
}

fn max_path_name_bytes(m: &RepoMetrics) -> Option<u64> {
    m.max_path_name_bytes
}

fn max_path_name_path(m: &RepoMetrics) -> Option<&str> {
    m.max_path_name_path.as_deref()
}

fn max_commit_size(m: &RepoMetrics) -> Option<u64> {
    m.max_commit_size
}

/// Limits enforced by the migration target, in report order.
pub static MIGRATION_RULES: [Rule; 6] = [
    Rule {
        id: "total-content-size",
        description: "Repository exceeds 20GB size limit",
        severity: Severity::Hard,
        limit: 20 * GIB,
        unit: Unit::Size,
        observed_label: "Current",
        extract: unique_blob_size,
        locate: None,
    },
    Rule {
        id: "total-metadata-size",
        description: "Metadata exceeds 20GB limit",
        severity: Severity::Hard,
        limit: 20 * GIB,
        unit: Unit::Size,
        observed_label: "Current",
        extract: metadata_size,
        locate: None,
    },
    Rule {
        id: "max-file-size-hard",
        description: "Contains files larger than 400MB limit",
        severity: Severity::Hard,
        limit: 400 * MIB,
        unit: Unit::Size,
        observed_label: "Largest",
        extract: max_blob_size,
        locate: Some(max_blob_path),
    },
    Rule {
        id: "max-path-length",
        description: "Contains paths longer than 255 bytes",
        severity: Severity::Hard,
        limit: 255,
        unit: Unit::Bytes,
        observed_label: "Longest",
        extract: max_path_name_bytes,
        locate: Some(max_path_name_path),
    },
    Rule {
        id: "max-file-size-advisory",
        description: "Contains files larger than recommended 100MB",
        severity: Severity::Advisory,
        limit: 100 * MIB,
        unit: Unit::Size,
        observed_label: "Largest",
        extract: max_blob_size,
        locate: Some(max_blob_path),
    },
    Rule {
        id: "max-commit-size",
        description: "Contains commits larger than 2GB limit",
        severity: Severity::Hard,
        limit: 2 * GIB,
        unit: Unit::Size,
        observed_label: "Largest",
        extract: max_commit_size,
        locate: None,
    },
];

/// Evaluate `metrics` against the built-in migration rules.
pub fn evaluate(metrics: &RepoMetrics) -> Vec<Violation> {
    evaluate_with(&MIGRATION_RULES, metrics)
}

/// Evaluate `metrics` against an arbitrary rule table, preserving table order.
pub fn evaluate_with(rules: &[Rule], metrics: &RepoMetrics) -> Vec<Violation> {
    rules.iter().filter_map(|rule| rule.check(metrics)).collect()
}
