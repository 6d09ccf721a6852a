//! Audit pipeline driver.
//!
//! Runs every target repository through acquisition → collection →
//! evaluation and assembles the results into a single [`AnalysisReport`].
//!
//! Per-repository failures never abort the run:
//!
//! | Failure | Effect on report |
//! |---------|------------------|
//! | clone failed | repository absent |
//! | analysis tool failed / bad output | repository present, empty metrics, `analysis_error` set |
//!
//! Both are returned as [`RepoFailure`]s next to the report.
//!
//! With `concurrency > 1` repositories are processed by a bounded pool of
//! tasks. Each task returns its own result tagged with the input index and
//! the driver merges them afterwards, so report order always equals
//! resolution order.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::acquire::AcquisitionManager;
use crate::collect::MetricsCollector;
use crate::models::{
    AnalysisReport, FailureStage, RepoEntry, RepoFailure, RepoMetrics, RepoTarget, Scope,
};
use crate::progress::{AuditProgressEvent, AuditProgressReporter};
use crate::rules;

/// Report plus the diagnostics gathered while producing it.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: AnalysisReport,
    pub failures: Vec<RepoFailure>,
}

/// What happened to one repository.
enum RepoOutcome {
    Analyzed(RepoEntry),
    Degraded(RepoEntry, RepoFailure),
    Skipped(RepoFailure),
}

impl RepoOutcome {
    fn violation_count(&self) -> usize {
        match self {
            RepoOutcome::Analyzed(e) | RepoOutcome::Degraded(e, _) => e.violations.len(),
            RepoOutcome::Skipped(_) => 0,
        }
    }

    fn is_ok(&self) -> bool {
        matches!(self, RepoOutcome::Analyzed(_))
    }
}

pub struct ReportAggregator {
    acquisition: Arc<AcquisitionManager>,
    collector: Arc<MetricsCollector>,
    concurrency: usize,
    progress: Arc<dyn AuditProgressReporter>,
}

impl ReportAggregator {
    pub fn new(
        acquisition: AcquisitionManager,
        collector: MetricsCollector,
        concurrency: usize,
        progress: Arc<dyn AuditProgressReporter>,
    ) -> Self {
        Self {
            acquisition: Arc::new(acquisition),
            collector: Arc::new(collector),
            concurrency: concurrency.max(1),
            progress,
        }
    }

    /// Audit `targets` and build the report for `scope`.
    pub async fn run(
        &self,
        scope: &Scope,
        targets: Vec<RepoTarget>,
        analysis_date: DateTime<Utc>,
    ) -> RunOutcome {
        let total = targets.len() as u64;
        let scope_dir = scope.clone_subdir().map(str::to_string);
        info!(scope = scope.label(), repos = total, concurrency = self.concurrency, "starting audit");

        let outcomes = if self.concurrency == 1 {
            self.run_sequential(&targets, scope_dir).await
        } else {
            self.run_pooled(&targets, scope_dir).await
        };

        let mut report = AnalysisReport::new(scope.label(), analysis_date);
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                RepoOutcome::Analyzed(entry) => report.repositories.push(entry),
                RepoOutcome::Degraded(entry, failure) => {
                    report.repositories.push(entry);
                    failures.push(failure);
                }
                RepoOutcome::Skipped(failure) => failures.push(failure),
            }
        }

        info!(
            analyzed = report.repositories.len(),
            failed = failures.len(),
            blocked = report.blocked_count(),
            "audit finished"
        );
        RunOutcome { report, failures }
    }

    async fn run_sequential(
        &self,
        targets: &[RepoTarget],
        scope_dir: Option<String>,
    ) -> Vec<RepoOutcome> {
        let total = targets.len() as u64;
        let mut outcomes = Vec::with_capacity(targets.len());
        for (idx, target) in targets.iter().enumerate() {
            let n = idx as u64 + 1;
            self.progress.report(AuditProgressEvent::Started {
                repo: target.id.to_string(),
                n,
                total,
            });
            let outcome = process_repo(
                &self.acquisition,
                &self.collector,
                target,
                scope_dir.as_deref(),
            )
            .await;
            self.report_finished(target, &outcome, n, total);
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn run_pooled(
        &self,
        targets: &[RepoTarget],
        scope_dir: Option<String>,
    ) -> Vec<RepoOutcome> {
        let total = targets.len() as u64;
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let finished = Arc::new(AtomicU64::new(0));
        let mut join_set = JoinSet::new();

        for (idx, target) in targets.iter().cloned().enumerate() {
            let acquisition = Arc::clone(&self.acquisition);
            let collector = Arc::clone(&self.collector);
            let progress = Arc::clone(&self.progress);
            let permits = Arc::clone(&permits);
            let finished = Arc::clone(&finished);
            let scope_dir = scope_dir.clone();

            join_set.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                progress.report(AuditProgressEvent::Started {
                    repo: target.id.to_string(),
                    n: idx as u64 + 1,
                    total,
                });
                let outcome =
                    process_repo(&acquisition, &collector, &target, scope_dir.as_deref()).await;
                let n = finished.fetch_add(1, Ordering::SeqCst) + 1;
                progress.report(AuditProgressEvent::Finished {
                    repo: target.id.to_string(),
                    n,
                    total,
                    violations: outcome.violation_count(),
                    ok: outcome.is_ok(),
                });
                (idx, outcome)
            });
        }

        let mut slots: Vec<Option<RepoOutcome>> = targets.iter().map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((idx, outcome)) => slots[idx] = Some(outcome),
                Err(e) => error!(error = %e, "audit worker task failed"),
            }
        }

        targets
            .iter()
            .zip(slots)
            .map(|(target, slot)| {
                slot.unwrap_or_else(|| {
                    RepoOutcome::Skipped(RepoFailure {
                        repo: target.id.clone(),
                        stage: FailureStage::Acquisition,
                        cause: "worker task aborted".to_string(),
                    })
                })
            })
            .collect()
    }

    fn report_finished(&self, target: &RepoTarget, outcome: &RepoOutcome, n: u64, total: u64) {
        self.progress.report(AuditProgressEvent::Finished {
            repo: target.id.to_string(),
            n,
            total,
            violations: outcome.violation_count(),
            ok: outcome.is_ok(),
        });
    }
}

async fn process_repo(
    acquisition: &AcquisitionManager,
    collector: &MetricsCollector,
    target: &RepoTarget,
    scope_dir: Option<&str>,
) -> RepoOutcome {
    let path = match acquisition.ensure(target, scope_dir).await {
        Ok(path) => path,
        Err(e) => {
            warn!(repo = %target.id, error = %e, "skipping repository");
            return RepoOutcome::Skipped(RepoFailure {
                repo: target.id.clone(),
                stage: FailureStage::Acquisition,
                cause: e.to_string(),
            });
        }
    };

    match collector.collect(&path).await {
        Ok(metrics) => {
            let violations = rules::evaluate(&metrics);
            RepoOutcome::Analyzed(RepoEntry {
                repo: target.id.clone(),
                metrics,
                violations,
                analysis_error: None,
            })
        }
        Err(e) => {
            warn!(repo = %target.id, error = %e, "analysis failed; repository not evaluated");
            let cause = e.to_string();
            RepoOutcome::Degraded(
                RepoEntry {
                    repo: target.id.clone(),
                    metrics: RepoMetrics::default(),
                    violations: Vec::new(),
                    analysis_error: Some(cause.clone()),
                },
                RepoFailure {
                    repo: target.id.clone(),
                    stage: FailureStage::Collection,
                    cause,
                },
            )
        }
    }
}
