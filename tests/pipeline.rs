//! Library-level audit runs with in-process fakes for the resolver, the
//! version-control client, and the size-analysis tool.

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use repo_readiness::acquire::VcsClient;
use repo_readiness::audit::{audit, AuditDeps};
use repo_readiness::collect::SizeAnalyzer;
use repo_readiness::config::Config;
use repo_readiness::error::PipelineResult;
use repo_readiness::models::{FailureStage, RepoId, RepoTarget, Scope};
use repo_readiness::progress::NoProgress;
use repo_readiness::report;
use repo_readiness::resolve::{direct_targets, ScopeResolver};

const MIB: u64 = 1024 * 1024;

struct FixedResolver {
    targets: Vec<RepoTarget>,
    fail: bool,
}

#[async_trait]
impl ScopeResolver for FixedResolver {
    async fn resolve(&self, _scope: &Scope) -> Result<Vec<RepoTarget>> {
        if self.fail {
            anyhow::bail!("Team 'ghosts' not found in organization 'acme'");
        }
        Ok(self.targets.clone())
    }
}

#[derive(Default)]
struct CountingVcs {
    clones: AtomicUsize,
}

#[async_trait]
impl VcsClient for CountingVcs {
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        self.clones.fetch_add(1, Ordering::SeqCst);
        if url.contains("unreachable") {
            anyhow::bail!("fatal: repository '{}' not found", url);
        }
        std::fs::create_dir_all(dest)?;
        Ok(())
    }
}

/// `assets` holds a 500 MiB file; everything else is tiny.
struct FakeSizer;

#[async_trait]
impl SizeAnalyzer for FakeSizer {
    fn tool_name(&self) -> &str {
        "git-sizer"
    }

    async fn analyze(&self, repo_path: &Path) -> PipelineResult<String> {
        let name = repo_path.file_name().unwrap().to_string_lossy();
        let json = if name == "assets" {
            format!(
                r#"{{"max_blob_size": {}, "max_blob_size_blob": "textures/atlas.psd"}}"#,
                500 * MIB
            )
        } else {
            r#"{"unique_blob_size": 10240, "max_blob_size": 2048, "max_commit_size": 4096,
                "max_path_name_bytes": 40, "unique_commit_size": 100, "unique_tree_size": 100}"#
                .to_string()
        };
        Ok(json)
    }
}

fn config_for(tmp: &TempDir) -> Config {
    let mut cfg = Config::default();
    cfg.github.org = Some("acme".into());
    cfg.github.token = Some("ghp_test".into());
    cfg.workspace.base_path = tmp.path().join("repos");
    cfg.report.output = tmp.path().join("report.json");
    cfg
}

fn deps(targets: Vec<RepoTarget>, vcs: Arc<CountingVcs>) -> AuditDeps {
    AuditDeps {
        resolver: Arc::new(FixedResolver {
            targets,
            fail: false,
        }),
        vcs,
        analyzer: Arc::new(FakeSizer),
    }
}

fn targets(names: &[&str]) -> Vec<RepoTarget> {
    let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    direct_targets("https://github.com", "acme", &names)
}

#[tokio::test]
async fn oversized_blob_fires_both_file_rules() {
    let tmp = TempDir::new().unwrap();
    let cfg = config_for(&tmp);
    let vcs = Arc::new(CountingVcs::default());

    let outcome = audit(
        &cfg,
        &Scope::Team("games".into()),
        deps(targets(&["assets", "engine"]), vcs.clone()),
        Arc::new(NoProgress),
    )
    .await
    .unwrap();

    let report = &outcome.report;
    assert_eq!(report.scope, "games");
    let assets = report.entry("assets").unwrap();
    let ids: Vec<_> = assets.violations.iter().map(|v| v.rule_id.as_str()).collect();
    assert_eq!(ids, vec!["max-file-size-hard", "max-file-size-advisory"]);
    assert!(assets.violations[0].message.contains("textures/atlas.psd"));
    assert!(report.entry("engine").unwrap().violations.is_empty());

    let text = report::render(report);
    let engine = text.split("Repository: engine").nth(1).unwrap();
    assert!(engine.contains("All checks passed"));

    assert!(tmp.path().join("repos/games/assets").is_dir());
    assert_eq!(vcs.clones.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn second_run_reuses_clones() {
    let tmp = TempDir::new().unwrap();
    let cfg = config_for(&tmp);
    let vcs = Arc::new(CountingVcs::default());
    let scope = Scope::Repos(vec!["engine".into()]);

    for _ in 0..2 {
        audit(
            &cfg,
            &scope,
            deps(targets(&["engine"]), vcs.clone()),
            Arc::new(NoProgress),
        )
        .await
        .unwrap();
    }
    assert_eq!(vcs.clones.load(Ordering::SeqCst), 1);
    assert!(tmp.path().join("repos/engine").is_dir());
}

#[tokio::test]
async fn unreachable_repo_is_absent_and_report_persists() {
    let tmp = TempDir::new().unwrap();
    let cfg = config_for(&tmp);
    let vcs = Arc::new(CountingVcs::default());

    let mut list = targets(&["engine"]);
    list.insert(
        0,
        RepoTarget {
            id: RepoId::new("legacy"),
            clone_url: "https://github.com/acme/unreachable.git".into(),
        },
    );

    let outcome = audit(
        &cfg,
        &Scope::Repos(vec!["legacy".into(), "engine".into()]),
        deps(list, vcs),
        Arc::new(NoProgress),
    )
    .await
    .unwrap();

    assert!(outcome.report.entry("legacy").is_none());
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].stage, FailureStage::Acquisition);
    assert!(
        !outcome.failures[0].cause.contains("ghp_test"),
        "token leaked into diagnostics"
    );

    report::persist(&outcome.report, &cfg.report.output).unwrap();
    let reloaded = report::load(&cfg.report.output).unwrap();
    assert_eq!(reloaded, outcome.report);
}

#[tokio::test]
async fn resolution_failure_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let cfg = config_for(&tmp);
    let deps = AuditDeps {
        resolver: Arc::new(FixedResolver {
            targets: vec![],
            fail: true,
        }),
        vcs: Arc::new(CountingVcs::default()),
        analyzer: Arc::new(FakeSizer),
    };

    let err = audit(&cfg, &Scope::Team("ghosts".into()), deps, Arc::new(NoProgress))
        .await
        .unwrap_err();
    assert!(format!("{:#}", err).contains("not found"));
    assert!(!cfg.report.output.exists());
}

#[tokio::test]
async fn concurrent_run_matches_sequential_run() {
    let tmp = TempDir::new().unwrap();
    let names = ["a", "assets", "b", "c", "d", "e", "f"];
    let scope = Scope::Repos(names.iter().map(|n| n.to_string()).collect());

    let mut sequential = config_for(&tmp);
    sequential.workspace.base_path = tmp.path().join("seq");
    let mut pooled = config_for(&tmp);
    pooled.workspace.base_path = tmp.path().join("pool");
    pooled.analysis.concurrency = 3;

    let a = audit(
        &sequential,
        &scope,
        deps(targets(&names), Arc::new(CountingVcs::default())),
        Arc::new(NoProgress),
    )
    .await
    .unwrap();
    let b = audit(
        &pooled,
        &scope,
        deps(targets(&names), Arc::new(CountingVcs::default())),
        Arc::new(NoProgress),
    )
    .await
    .unwrap();

    assert_eq!(a.report.repositories, b.report.repositories);
    let order: Vec<_> = b.report.repositories.iter().map(|e| e.repo.to_string()).collect();
    assert_eq!(order, names);
}
