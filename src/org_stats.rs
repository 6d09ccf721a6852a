//! Organization-wide repository statistics.
//!
//! A separate reporting path from the readiness audit: runs the
//! `gh repo-stats` extension for the whole organization, parses its CSV
//! output, and stores it as JSON. No limits are evaluated here.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::Config;
use crate::process::{run_with_timeout, stderr_summary};
use crate::report::{read_json, write_json_atomic};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgStatsReport {
    pub analysis_date: DateTime<Utc>,
    pub organization: String,
    /// Column names in the order `gh repo-stats` printed them.
    pub columns: Vec<String>,
    pub repositories: Vec<BTreeMap<String, String>>,
}

/// Parse `gh repo-stats --output csv` output.
///
/// Blank lines are ignored; rows whose width differs from the header are
/// skipped with a warning.
pub fn parse_csv(raw: &str) -> Result<(Vec<String>, Vec<BTreeMap<String, String>>)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(raw.as_bytes());

    let columns: Vec<String> = reader
        .headers()
        .context("Failed to read CSV header")?
        .iter()
        .map(str::to_string)
        .collect();
    if columns.is_empty() || columns.iter().all(String::is_empty) {
        bail!("gh repo-stats produced no output");
    }

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.context("Failed to parse CSV record")?;
        if record.len() != columns.len() {
            warn!(
                row = line + 1,
                expected = columns.len(),
                found = record.len(),
                "skipping malformed repo-stats row"
            );
            continue;
        }
        rows.push(
            columns
                .iter()
                .cloned()
                .zip(record.iter().map(str::to_string))
                .collect(),
        );
    }
    Ok((columns, rows))
}

/// Run `gh repo-stats` for the configured organization.
pub async fn collect(config: &Config) -> Result<OrgStatsReport> {
    let org = config.org()?;
    let token = config.require_token()?;

    let mut cmd = Command::new(&config.org_stats.gh_bin);
    cmd.args(["repo-stats", "--org", org, "--output", "csv"])
        .env("GH_TOKEN", token);

    info!(org, "running gh repo-stats");
    let output = run_with_timeout(
        cmd,
        "gh repo-stats",
        Duration::from_secs(config.org_stats.timeout_secs),
    )
    .await?;
    if !output.status.success() {
        bail!(
            "gh repo-stats failed with status {}: {}",
            output.status.code().unwrap_or(-1),
            stderr_summary(&output)
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let (columns, repositories) = parse_csv(&stdout)?;
    info!(org, repos = repositories.len(), "parsed repo-stats output");

    Ok(OrgStatsReport {
        analysis_date: Utc::now(),
        organization: org.to_string(),
        columns,
        repositories,
    })
}

pub fn render(report: &OrgStatsReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Repository Statistics Summary");
    let _ = writeln!(out, "{}", "=".repeat(50));
    let _ = writeln!(out, "Organization: {}", report.organization);
    let _ = writeln!(out, "Analysis Date: {}", report.analysis_date.to_rfc3339());
    let _ = writeln!(out, "Repositories Analyzed: {}", report.repositories.len());

    let name_col = report
        .columns
        .iter()
        .find(|c| c.eq_ignore_ascii_case("Repo_Name") || c.eq_ignore_ascii_case("name"));

    for repo in &report.repositories {
        let _ = writeln!(out);
        match name_col.and_then(|c| repo.get(c)) {
            Some(name) => {
                let _ = writeln!(out, "Repository: {}", name);
            }
            None => {
                let _ = writeln!(out, "Repository:");
            }
        }
        for col in &report.columns {
            if Some(col) == name_col {
                continue;
            }
            if let Some(value) = repo.get(col) {
                let _ = writeln!(out, "  {}: {}", col, value);
            }
        }
    }
    out
}

/// `readiness org-stats`: collect, persist, and print.
pub async fn run_org_stats(config: &Config) -> Result<()> {
    crate::report::check_writable(&config.org_stats.output)?;
    let report = collect(config).await?;
    write_json_atomic(&report, &config.org_stats.output)?;
    print!("{}", render(&report));
    println!(
        "\nDetailed results have been saved to {}",
        config.org_stats.output.display()
    );
    Ok(())
}

pub fn load(path: &std::path::Path) -> Result<OrgStatsReport> {
    read_json(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Org_Name,Repo_Name,Is_Empty,Repo_Size_mb,Commit_Comment_Count
acme,web,false,12,3

acme,api,false,40,0
acme,broken,false
";

    #[test]
    fn parses_rows_and_skips_ragged_ones() {
        let (columns, rows) = parse_csv(SAMPLE).unwrap();
        assert_eq!(columns.len(), 5);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["Repo_Name"], "web");
        assert_eq!(rows[1]["Repo_Size_mb"], "40");
    }

    #[test]
    fn empty_output_is_an_error() {
        assert!(parse_csv("").is_err());
    }

    #[test]
    fn render_uses_repo_name_column() {
        let (columns, repositories) = parse_csv(SAMPLE).unwrap();
        let report = OrgStatsReport {
            analysis_date: Utc::now(),
            organization: "acme".into(),
            columns,
            repositories,
        };
        let text = render(&report);
        assert!(text.contains("Repositories Analyzed: 2"));
        assert!(text.contains("Repository: web"));
        assert!(text.contains("  Repo_Size_mb: 12"));
        assert!(!text.contains("  Repo_Name:"));
    }

    #[test]
    fn report_round_trips_through_disk() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("org_stats.json");
        let (columns, repositories) = parse_csv(SAMPLE).unwrap();
        let report = OrgStatsReport {
            analysis_date: Utc::now(),
            organization: "acme".into(),
            columns,
            repositories,
        };
        write_json_atomic(&report, &path).unwrap();
        assert_eq!(load(&path).unwrap(), report);
    }
}
