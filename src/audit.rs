//! `readiness analyze`: the end-to-end audit command.
//!
//! Resolve scope → run the pipeline → persist → print. Setup problems
//! (missing org, unwritable output, failed resolution) abort before any
//! repository is touched; per-repository problems only show up as
//! diagnostics after the summary.

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::acquire::{AcquisitionManager, GitCli, VcsClient};
use crate::aggregate::{ReportAggregator, RunOutcome};
use crate::collect::{GitSizer, MetricsCollector, SizeAnalyzer};
use crate::config::Config;
use crate::models::Scope;
use crate::progress::{AuditProgressEvent, AuditProgressReporter};
use crate::report;
use crate::resolve::{GithubResolver, ScopeResolver};
use crate::store::RepositoryStore;

/// External collaborators of an audit run.
pub struct AuditDeps {
    pub resolver: Arc<dyn ScopeResolver>,
    pub vcs: Arc<dyn VcsClient>,
    pub analyzer: Arc<dyn SizeAnalyzer>,
}

impl AuditDeps {
    /// Production collaborators: GitHub API, `git`, `git-sizer`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let org = config.org()?;
        let resolver = GithubResolver::new(
            &config.github.api_base,
            &config.github.web_base,
            org,
            config.token().map(str::to_string),
            Duration::from_secs(config.github.timeout_secs),
        )?;
        Ok(Self {
            resolver: Arc::new(resolver),
            vcs: Arc::new(GitCli::new(
                &config.analysis.git_bin,
                Duration::from_secs(config.analysis.clone_timeout_secs),
            )),
            analyzer: Arc::new(GitSizer::new(
                &config.analysis.sizer_bin,
                config.analysis.sizer_args.clone(),
                Duration::from_secs(config.analysis.timeout_secs),
            )),
        })
    }
}

/// Resolve `scope` and audit every repository in it.
pub async fn audit(
    config: &Config,
    scope: &Scope,
    deps: AuditDeps,
    progress: Arc<dyn AuditProgressReporter>,
) -> Result<RunOutcome> {
    progress.report(AuditProgressEvent::Resolving {
        scope: scope.label().to_string(),
    });
    let targets = deps
        .resolver
        .resolve(scope)
        .await
        .with_context(|| format!("Failed to resolve repositories for '{}'", scope.label()))?;
    info!(scope = scope.label(), repos = targets.len(), "resolved scope");

    let acquisition = AcquisitionManager::new(
        RepositoryStore::new(&config.workspace.base_path),
        deps.vcs,
        config.token().map(str::to_string),
    );
    let aggregator = ReportAggregator::new(
        acquisition,
        MetricsCollector::new(deps.analyzer),
        config.analysis.concurrency,
        progress,
    );
    Ok(aggregator.run(scope, targets, Utc::now()).await)
}

/// The `analyze` command: audit, persist, and print the summary.
pub async fn run_analyze(
    config: &Config,
    scope: &Scope,
    progress: Arc<dyn AuditProgressReporter>,
) -> Result<()> {
    config.org()?;
    if matches!(scope, Scope::Team(_)) {
        config.require_token()?;
    }
    let output = &config.report.output;
    report::check_writable(output)?;

    let deps = AuditDeps::from_config(config)?;
    let outcome = audit(config, scope, deps, progress).await?;

    report::persist(&outcome.report, output)?;
    print!("{}", report::render(&outcome.report));
    print!("{}", report::render_failures(&outcome.failures));
    println!("\nDetailed results have been saved to {}", output.display());
    Ok(())
}
