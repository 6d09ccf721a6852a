//! Scope resolution.
//!
//! Turns a [`Scope`] into the list of repositories to audit. Team scopes are
//! resolved through the GitHub REST API; explicit repository lists need no
//! network access. Any resolution failure is fatal to the run.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::models::{RepoId, RepoTarget, Scope};

const PAGE_SIZE: usize = 100;

#[async_trait]
pub trait ScopeResolver: Send + Sync {
    async fn resolve(&self, scope: &Scope) -> Result<Vec<RepoTarget>>;
}

#[derive(Debug, Deserialize)]
struct ApiRepo {
    name: String,
    clone_url: String,
}

/// [`ScopeResolver`] backed by the GitHub REST API.
pub struct GithubResolver {
    client: reqwest::Client,
    api_base: String,
    web_base: String,
    org: String,
    token: Option<String>,
}

impl GithubResolver {
    pub fn new(
        api_base: &str,
        web_base: &str,
        org: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("repo-readiness/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            web_base: web_base.trim_end_matches('/').to_string(),
            org: org.to_string(),
            token,
        })
    }

    async fn team_repos(&self, team: &str) -> Result<Vec<RepoTarget>> {
        let token = self
            .token
            .as_deref()
            .context("A GitHub token is required to resolve team repositories")?;

        let mut targets = Vec::new();
        for page in 1.. {
            let url = format!(
                "{}/orgs/{}/teams/{}/repos?per_page={}&page={}",
                self.api_base, self.org, team, PAGE_SIZE, page
            );
            debug!(%url, "fetching team repositories");
            let resp = self
                .client
                .get(&url)
                .header("Authorization", format!("token {}", token))
                .header("Accept", "application/vnd.github.v3+json")
                .send()
                .await
                .with_context(|| format!("Request to {} failed", self.api_base))?;

            let status = resp.status();
            if status == StatusCode::NOT_FOUND {
                bail!("Team '{}' not found in organization '{}'", team, self.org);
            }
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                bail!(
                    "GitHub rejected the token while listing repositories for team '{}' ({})",
                    team,
                    status
                );
            }
            if !status.is_success() {
                bail!("GitHub API error listing team '{}': {}", team, status);
            }

            let repos: Vec<ApiRepo> = resp
                .json()
                .await
                .context("Failed to parse GitHub team repository list")?;
            let short_page = repos.len() < PAGE_SIZE;
            targets.extend(repos.into_iter().map(|r| RepoTarget {
                id: RepoId::new(r.name),
                clone_url: r.clone_url,
            }));
            if short_page {
                break;
            }
        }
        Ok(targets)
    }
}

#[async_trait]
impl ScopeResolver for GithubResolver {
    async fn resolve(&self, scope: &Scope) -> Result<Vec<RepoTarget>> {
        match scope {
            Scope::Team(team) => self.team_repos(team).await,
            Scope::Repos(names) => Ok(direct_targets(&self.web_base, &self.org, names)),
        }
    }
}

/// Targets for explicitly named repositories, in the order given.
///
/// Duplicate names are dropped after their first occurrence.
pub fn direct_targets(web_base: &str, org: &str, names: &[String]) -> Vec<RepoTarget> {
    let mut seen = std::collections::HashSet::new();
    names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty() && seen.insert(n.to_string()))
        .map(|name| RepoTarget {
            id: RepoId::new(name),
            clone_url: format!(
                "{}/{}/{}.git",
                web_base.trim_end_matches('/'),
                org,
                name
            ),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_targets_keep_order_and_dedupe() {
        let names = vec![
            "web".to_string(),
            "api".to_string(),
            "web".to_string(),
            " ".to_string(),
        ];
        let targets = direct_targets("https://github.com/", "acme", &names);
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].id.as_str(), "web");
        assert_eq!(targets[0].clone_url, "https://github.com/acme/web.git");
        assert_eq!(targets[1].id.as_str(), "api");
    }

    #[tokio::test]
    async fn repo_scope_needs_no_network() {
        let resolver = GithubResolver::new(
            "http://127.0.0.1:9",
            "https://github.example.com",
            "acme",
            None,
            Duration::from_secs(1),
        )
        .unwrap();
        let targets = resolver
            .resolve(&Scope::Repos(vec!["tools".into()]))
            .await
            .unwrap();
        assert_eq!(
            targets[0].clone_url,
            "https://github.example.com/acme/tools.git"
        );
    }

    #[tokio::test]
    async fn team_scope_requires_token() {
        let resolver = GithubResolver::new(
            "http://127.0.0.1:9",
            "https://github.com",
            "acme",
            None,
            Duration::from_secs(1),
        )
        .unwrap();
        let err = resolver
            .resolve(&Scope::Team("platform".into()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("token"));
    }
}
