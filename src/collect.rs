//! Metrics collection.
//!
//! Runs the size-analysis tool (`git-sizer`) inside a local clone and parses
//! its JSON output into [`RepoMetrics`]. Each repository gets exactly one
//! invocation per run; failures are returned to the caller, never retried.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::models::RepoMetrics;
use crate::process::{run_with_timeout, stderr_summary};

/// External tool that reports repository size metrics.
#[async_trait]
pub trait SizeAnalyzer: Send + Sync {
    /// Name used in diagnostics.
    fn tool_name(&self) -> &str;

    /// Run the tool against `repo_path` and return its raw stdout.
    async fn analyze(&self, repo_path: &Path) -> PipelineResult<String>;
}

/// [`SizeAnalyzer`] that shells out to `git-sizer`.
pub struct GitSizer {
    bin: String,
    args: Vec<String>,
    timeout: Duration,
}

impl GitSizer {
    pub fn new(bin: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            args,
            timeout,
        }
    }
}

#[async_trait]
impl SizeAnalyzer for GitSizer {
    fn tool_name(&self) -> &str {
        &self.bin
    }

    async fn analyze(&self, repo_path: &Path) -> PipelineResult<String> {
        let mut cmd = Command::new(&self.bin);
        cmd.args(&self.args).current_dir(repo_path);

        let output = run_with_timeout(cmd, &self.bin, self.timeout).await?;
        if !output.status.success() {
            return Err(PipelineError::AnalysisFailed {
                tool: self.bin.clone(),
                status: output.status.code().unwrap_or(-1),
                stderr: stderr_summary(&output),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

pub struct MetricsCollector {
    analyzer: Arc<dyn SizeAnalyzer>,
}

impl MetricsCollector {
    pub fn new(analyzer: Arc<dyn SizeAnalyzer>) -> Self {
        Self { analyzer }
    }

    pub async fn collect(&self, repo_path: &Path) -> PipelineResult<RepoMetrics> {
        let raw = self.analyzer.analyze(repo_path).await?;
        let metrics = parse_metrics(self.analyzer.tool_name(), &raw)?;
        debug!(path = %repo_path.display(), ?metrics, "collected metrics");
        Ok(metrics)
    }
}

/// Parse `git-sizer --json` output.
pub fn parse_metrics(tool: &str, raw: &str) -> PipelineResult<RepoMetrics> {
    serde_json::from_str(raw.trim()).map_err(|source| PipelineError::MalformedOutput {
        tool: tool.to_string(),
        source,
    })
}
