//! Report persistence and rendering.
//!
//! Reports are written as pretty-printed JSON through a temporary file in
//! the destination directory that is renamed into place, so a reader sees
//! either the previous file or the complete new one.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;

use crate::models::{AnalysisReport, RepoEntry, RepoFailure};

/// Format a byte count with binary prefixes and two decimals.
///
/// `1023` → `"1023.00 B"`, `1024` → `"1.00 KB"`.
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{:.2} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.2} TB", size)
}

/// Atomically write `value` as pretty JSON to `path`.
pub fn write_json_atomic<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let dir = parent_dir(path);
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Fail early if a report could not be written to `path`.
pub fn check_writable(path: &Path) -> Result<()> {
    if path.is_dir() {
        anyhow::bail!("Output path is a directory: {}", path.display());
    }
    let dir = parent_dir(path);
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Output directory is not writable: {}", dir.display()))?;
    Ok(())
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

pub fn persist(report: &AnalysisReport, path: &Path) -> Result<()> {
    write_json_atomic(report, path)
}

pub fn load(path: &Path) -> Result<AnalysisReport> {
    read_json(path)
}

/// Human-readable summary of a report.
pub fn render(report: &AnalysisReport) -> String {
    let mut out = String::new();
    let not_evaluated = report.not_evaluated_count();
    let _ = writeln!(out, "Migration Readiness Summary: {}", report.scope);
    let _ = writeln!(out, "Analysis Date: {}", report.analysis_date.to_rfc3339());
    let _ = write!(
        out,
        "Repositories: {} analyzed, {} blocked",
        report.repositories.len() - not_evaluated,
        report.blocked_count()
    );
    if not_evaluated > 0 {
        let _ = write!(out, ", {} not evaluated", not_evaluated);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", "-".repeat(60));

    for entry in &report.repositories {
        render_entry(&mut out, entry);
    }
    out
}

fn render_entry(out: &mut String, entry: &RepoEntry) {
    let m = &entry.metrics;
    let size = |v: Option<u64>| v.map(format_size).unwrap_or_else(not_reported);
    let count = |v: Option<u64>| v.map(|n| n.to_string()).unwrap_or_else(not_reported);

    let _ = writeln!(out);
    let _ = writeln!(out, "Repository: {}", entry.repo);
    let _ = writeln!(out, "  Git Repository Stats:");
    if m.is_empty() {
        let _ = writeln!(out, "    (no metrics reported)");
    } else {
        let _ = writeln!(out, "    Total Blob Size:   {}", size(m.unique_blob_size));
        let _ = writeln!(out, "    Metadata Size:     {}", size(m.metadata_size()));
        let _ = writeln!(out, "    Largest File Size: {}", size(m.max_blob_size));
        if let Some(path) = &m.max_blob_size_path {
            let _ = writeln!(out, "    Largest File:      {}", path);
        }
        let _ = writeln!(out, "    Longest Path:      {}", path_bytes(m.max_path_name_bytes));
        let _ = writeln!(out, "    Largest Commit:    {}", size(m.max_commit_size));
        let _ = writeln!(out, "    Total Commits:     {}", count(m.unique_commit_count));
        let _ = writeln!(out, "    History Depth:     {}", count(m.max_history_depth));
    }

    let _ = writeln!(out, "  Migration Status:");
    if let Some(cause) = &entry.analysis_error {
        let _ = writeln!(out, "    ❓ Not evaluated: {}", cause);
        return;
    }
    if entry.violations.is_empty() {
        let _ = writeln!(out, "    ✅ All checks passed");
        return;
    }

    let blockers: Vec<_> = entry.hard_violations().collect();
    if !blockers.is_empty() {
        let _ = writeln!(out, "    ⚠️  Migration blockers:");
        for v in blockers {
            let _ = writeln!(out, "       - [{}] {}", v.rule_id, v.message);
        }
    }
    let advisories: Vec<_> = entry.advisories().collect();
    if !advisories.is_empty() {
        let _ = writeln!(out, "    ℹ️  Advisories:");
        for v in advisories {
            let _ = writeln!(out, "       - [{}] {}", v.rule_id, v.message);
        }
    }
}

fn path_bytes(v: Option<u64>) -> String {
    v.map(|n| format!("{} bytes", n)).unwrap_or_else(not_reported)
}

fn not_reported() -> String {
    "not reported".to_string()
}

/// Operator-facing list of repositories that were skipped or degraded.
pub fn render_failures(failures: &[RepoFailure]) -> String {
    let mut out = String::new();
    if failures.is_empty() {
        return out;
    }
    let _ = writeln!(out, "\nRepositories with problems ({}):", failures.len());
    for f in failures {
        let _ = writeln!(out, "  {:<32} {:<12} {}", f.repo, f.stage, f.cause);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RepoId, RepoMetrics};
    use crate::rules::evaluate;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn sample_report() -> AnalysisReport {
        let mut report =
            AnalysisReport::new("platform", Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap());
        let big = RepoMetrics {
            unique_blob_size: Some(3 * 1024 * 1024 * 1024),
            max_blob_size: Some(500 * 1024 * 1024),
            max_blob_size_path: Some("media/intro.mov".into()),
            unique_commit_count: Some(420),
            ..Default::default()
        };
        report.repositories.push(RepoEntry {
            repo: RepoId::new("media"),
            violations: evaluate(&big),
            metrics: big,
            analysis_error: None,
        });
        let small = RepoMetrics {
            unique_blob_size: Some(4096),
            unique_commit_size: Some(1000),
            unique_tree_size: Some(24),
            max_path_name_bytes: Some(48),
            ..Default::default()
        };
        report.repositories.push(RepoEntry {
            repo: RepoId::new("docs"),
            violations: evaluate(&small),
            metrics: small,
            analysis_error: None,
        });
        report.repositories.push(RepoEntry {
            repo: RepoId::new("vendor"),
            metrics: RepoMetrics::default(),
            violations: vec![],
            analysis_error: Some("git-sizer exited with status 1: not a git repository".into()),
        });
        report
    }

    #[test]
    fn format_size_boundaries() {
        assert_eq!(format_size(0), "0.00 B");
        assert_eq!(format_size(1023), "1023.00 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1_073_741_824), "1.00 GB");
        assert_eq!(format_size(5 * 1024u64.pow(4)), "5.00 TB");
        assert_eq!(format_size(2048 * 1024u64.pow(4)), "2048.00 TB");
    }

    #[test]
    fn persist_then_load_round_trips() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out").join("report.json");
        let report = sample_report();

        persist(&report, &path).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded, report);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"analysis_date\": \"2024-05-01T09:30:00"));
        assert!(raw.contains("\"max_blob_size_blob\": \"media/intro.mov\""));
    }

    #[test]
    fn persist_replaces_existing_file_without_leftovers() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("report.json");
        std::fs::write(&path, "stale").unwrap();

        persist(&sample_report(), &path).unwrap();
        assert!(load(&path).is_ok());
        let names: Vec<_> = std::fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn check_writable_rejects_directories() {
        let tmp = TempDir::new().unwrap();
        assert!(check_writable(tmp.path()).is_err());
        assert!(check_writable(&tmp.path().join("ok.json")).is_ok());
    }

    #[test]
    fn render_marks_blockers_and_clean_repos() {
        let text = render(&sample_report());
        assert!(text.contains("Repositories: 2 analyzed, 1 blocked, 1 not evaluated"));
        assert!(text.contains("Repository: media"));
        assert!(text.contains("Migration blockers:"));
        assert!(text.contains("[max-file-size-hard]"));
        assert!(text.contains("Advisories:"));
        assert!(text.contains("[max-file-size-advisory]"));
        assert!(text.contains("Largest Commit:    not reported"));

        let docs = text.split("Repository: docs").nth(1).unwrap();
        let docs = docs.split("Repository: vendor").next().unwrap();
        assert!(docs.contains("All checks passed"));
    }

    #[test]
    fn failed_analysis_is_not_rendered_as_passing() {
        let text = render(&sample_report());
        let vendor = text.split("Repository: vendor").nth(1).unwrap();
        assert!(vendor.contains("(no metrics reported)"));
        assert!(vendor.contains("Not evaluated: git-sizer exited with status 1"));
        assert!(!vendor.contains("All checks passed"));
    }

    #[test]
    fn stats_include_metadata_and_path_length() {
        let text = render(&sample_report());
        let media = text.split("Repository: media").nth(1).unwrap();
        let media = media.split("Repository: docs").next().unwrap();
        assert!(media.contains("Metadata Size:     not reported"));
        assert!(media.contains("Longest Path:      not reported"));

        let docs = text.split("Repository: docs").nth(1).unwrap();
        assert!(docs.contains("Metadata Size:     1.00 KB"));
        assert!(docs.contains("Longest Path:      48 bytes"));
    }

    #[test]
    fn failures_render_nothing_when_empty() {
        assert_eq!(render_failures(&[]), "");
    }
}
