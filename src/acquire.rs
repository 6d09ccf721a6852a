//! Repository acquisition.
//!
//! Makes sure each repository exists locally before it is analyzed. A clone
//! that already exists at its expected path is reused as-is; otherwise the
//! repository is cloned with the access token injected into the clone URL.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{PipelineError, PipelineResult};
use crate::models::RepoTarget;
use crate::process::{run_with_timeout, stderr_summary};
use crate::store::RepositoryStore;

/// Version-control client capable of cloning a repository.
#[async_trait]
pub trait VcsClient: Send + Sync {
    /// Clone `url` into `dest`. `dest` does not exist when this is called.
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<()>;
}

/// [`VcsClient`] backed by the `git` command-line client.
pub struct GitCli {
    git_bin: String,
    timeout: Duration,
}

impl GitCli {
    pub fn new(git_bin: impl Into<String>, timeout: Duration) -> Self {
        Self {
            git_bin: git_bin.into(),
            timeout,
        }
    }
}

#[async_trait]
impl VcsClient for GitCli {
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        let mut cmd = Command::new(&self.git_bin);
        cmd.arg("clone").arg("--quiet").arg(url).arg(dest);
        // Never block on a credential prompt.
        cmd.env("GIT_TERMINAL_PROMPT", "0");

        let output = run_with_timeout(cmd, "git clone", self.timeout).await?;
        if !output.status.success() {
            bail!("git clone failed: {}", stderr_summary(&output));
        }
        Ok(())
    }
}

/// Ensures repositories are present under the [`RepositoryStore`].
pub struct AcquisitionManager {
    store: RepositoryStore,
    vcs: Arc<dyn VcsClient>,
    token: Option<String>,
}

impl AcquisitionManager {
    pub fn new(store: RepositoryStore, vcs: Arc<dyn VcsClient>, token: Option<String>) -> Self {
        Self { store, vcs, token }
    }

    pub fn store(&self) -> &RepositoryStore {
        &self.store
    }

    /// Return the local path of `target`, cloning it first if needed.
    pub async fn ensure(
        &self,
        target: &RepoTarget,
        scope_dir: Option<&str>,
    ) -> PipelineResult<PathBuf> {
        let dest = self.store.expected_path(scope_dir, &target.id);
        if dest.is_dir() {
            debug!(repo = %target.id, path = %dest.display(), "reusing existing clone");
            return Ok(dest);
        }

        let failed = |cause: String| PipelineError::AcquisitionFailed {
            repo: target.id.clone(),
            cause: self.redact(&cause),
        };

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| failed(format!("create {}: {}", parent.display(), e)))?;
        }

        let url = inject_credential(&target.clone_url, self.token.as_deref());
        info!(repo = %target.id, "cloning");
        if let Err(e) = self.vcs.clone_repo(&url, &dest).await {
            // A half-written clone would be mistaken for a good one next run.
            if dest.exists() {
                let _ = std::fs::remove_dir_all(&dest);
            }
            return Err(failed(format!("{:#}", e)));
        }
        info!(repo = %target.id, path = %dest.display(), "cloned");
        Ok(dest)
    }

    fn redact(&self, text: &str) -> String {
        match self.token.as_deref() {
            Some(token) if !token.is_empty() => text.replace(token, "***"),
            _ => text.to_string(),
        }
    }
}

/// Rewrite an `https://` clone URL to carry an access token.
///
/// URLs with any other scheme, or calls without a token, are returned
/// unchanged.
pub fn inject_credential(clone_url: &str, token: Option<&str>) -> String {
    match (token, clone_url.strip_prefix("https://")) {
        (Some(token), Some(rest)) if !token.is_empty() => {
            format!("https://x-access-token:{}@{}", token, rest)
        }
        _ => clone_url.to_string(),
    }
}
