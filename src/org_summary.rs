//! Organization inventory via the GitHub GraphQL API.
//!
//! Complements the readiness audit with what a migration has to carry over
//! besides git data: org-level counts (projects, teams, members,
//! discussions) and, for every repository, disk usage, branch protection,
//! rulesets, pull requests, issues, releases and fork/archive state.
//!
//! Repositories are fetched 100 per request and followed by cursor until
//! `hasNextPage` is false. Each request is retried with exponential backoff;
//! running out of retries fails the command.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::report::{check_writable, format_size, read_json, write_json_atomic};

const ORGANIZATION_QUERY: &str = r#"
query($org: String!) {
  organization(login: $org) {
    login
    name
    url
    projectsV2 { totalCount }
    teams { totalCount }
    membersWithRole { totalCount }
    repositoryDiscussions { totalCount }
  }
}
"#;

const REPOSITORIES_QUERY: &str = r#"
query($org: String!, $cursor: String, $isFork: Boolean, $isArchived: Boolean) {
  organization(login: $org) {
    repositories(
      first: 100
      after: $cursor
      isFork: $isFork
      isArchived: $isArchived
      orderBy: {field: CREATED_AT, direction: DESC}
    ) {
      totalCount
      pageInfo { hasNextPage endCursor }
      nodes {
        name
        description
        diskUsage
        isFork
        archivedAt
        branchProtectionRules(first: 100) {
          totalCount
          nodes { requiredStatusChecks { app { name } } }
        }
        rulesets { totalCount }
        pullRequests { totalCount }
        issues { totalCount }
        milestones { totalCount }
        releases { totalCount }
        deployments { totalCount }
        packages { totalCount }
        watchers { totalCount }
        commitComments { totalCount }
        stargazerCount
        hasWikiEnabled
        hasProjectsEnabled
        hasVulnerabilityAlertsEnabled
      }
    }
  }
}
"#;

/// Executes one GraphQL request and returns its `data` object.
#[async_trait]
pub trait GraphqlClient: Send + Sync {
    async fn query(&self, query: &str, variables: Value) -> Result<Value>;
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

/// [`GraphqlClient`] for the GitHub GraphQL endpoint.
pub struct GithubGraphql {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl GithubGraphql {
    pub fn new(api_base: &str, token: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("repo-readiness/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: graphql_endpoint(api_base),
            token: token.to_string(),
        })
    }
}

/// `https://api.github.com` → `/graphql`; Enterprise `https://host/api/v3` → `https://host/api/graphql`.
fn graphql_endpoint(api_base: &str) -> String {
    let base = api_base.trim_end_matches('/');
    let base = base.strip_suffix("/v3").unwrap_or(base);
    format!("{}/graphql", base)
}

#[async_trait]
impl GraphqlClient for GithubGraphql {
    async fn query(&self, query: &str, variables: Value) -> Result<Value> {
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .with_context(|| format!("Request to {} failed", self.endpoint))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            bail!("GitHub rejected the token for the GraphQL API ({})", status);
        }
        if !status.is_success() {
            bail!("GitHub GraphQL API error: {}", status);
        }

        let body: GraphqlResponse = resp
            .json()
            .await
            .context("Failed to parse GraphQL response")?;
        if !body.errors.is_empty() {
            let messages: Vec<_> = body.errors.into_iter().map(|e| e.message).collect();
            bail!("GraphQL query failed: {}", messages.join("; "));
        }
        body.data.context("GraphQL response contained no data")
    }
}

#[derive(Debug, Default, Deserialize)]
struct Count {
    #[serde(rename = "totalCount")]
    total_count: u64,
}

#[derive(Debug, Deserialize)]
struct OrganizationData<T> {
    organization: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrgNode {
    login: String,
    name: Option<String>,
    url: String,
    projects_v2: Count,
    teams: Count,
    members_with_role: Count,
    repository_discussions: Count,
}

#[derive(Debug, Deserialize)]
struct RepositoriesNode {
    repositories: RepoConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepoConnection {
    total_count: u64,
    page_info: PageInfo,
    nodes: Vec<RepoNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepoNode {
    name: String,
    description: Option<String>,
    disk_usage: Option<u64>,
    is_fork: bool,
    archived_at: Option<DateTime<Utc>>,
    branch_protection_rules: ProtectionRules,
    #[serde(default)]
    rulesets: Option<Count>,
    pull_requests: Count,
    issues: Count,
    milestones: Count,
    releases: Count,
    deployments: Count,
    packages: Count,
    watchers: Count,
    commit_comments: Count,
    stargazer_count: u64,
    has_wiki_enabled: bool,
    has_projects_enabled: bool,
    #[serde(default)]
    has_vulnerability_alerts_enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProtectionRules {
    total_count: u64,
    #[serde(default)]
    nodes: Vec<ProtectionRule>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProtectionRule {
    #[serde(default)]
    required_status_checks: Option<Vec<StatusCheck>>,
}

#[derive(Debug, Deserialize)]
struct StatusCheck {
    app: Option<CheckApp>,
}

#[derive(Debug, Deserialize)]
struct CheckApp {
    name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgInfo {
    pub login: String,
    pub name: Option<String>,
    pub url: String,
    pub projects: u64,
    pub teams: u64,
    pub members: u64,
    pub discussions: u64,
}

impl From<OrgNode> for OrgInfo {
    fn from(n: OrgNode) -> Self {
        Self {
            login: n.login,
            name: n.name,
            url: n.url,
            projects: n.projects_v2.total_count,
            teams: n.teams.total_count,
            members: n.members_with_role.total_count,
            discussions: n.repository_discussions.total_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSummary {
    pub name: String,
    pub description: Option<String>,
    /// As reported by GitHub, in kilobytes.
    pub disk_usage_kb: Option<u64>,
    pub is_fork: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub branch_protection_rules: u64,
    /// Apps behind required status checks, deduplicated, in first-seen order.
    pub required_check_apps: Vec<String>,
    pub rulesets: u64,
    pub pull_requests: u64,
    pub issues: u64,
    pub milestones: u64,
    pub releases: u64,
    pub deployments: u64,
    pub packages: u64,
    pub watchers: u64,
    pub commit_comments: u64,
    pub stargazers: u64,
    pub has_wiki_enabled: bool,
    pub has_projects_enabled: bool,
    pub has_vulnerability_alerts_enabled: bool,
}

impl RepoSummary {
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }
}

impl From<RepoNode> for RepoSummary {
    fn from(n: RepoNode) -> Self {
        let mut apps: Vec<String> = Vec::new();
        for check in n
            .branch_protection_rules
            .nodes
            .iter()
            .filter_map(|r| r.required_status_checks.as_ref())
            .flatten()
        {
            if let Some(app) = &check.app {
                if !apps.contains(&app.name) {
                    apps.push(app.name.clone());
                }
            }
        }
        Self {
            name: n.name,
            description: n.description.filter(|d| !d.is_empty()),
            disk_usage_kb: n.disk_usage,
            is_fork: n.is_fork,
            archived_at: n.archived_at,
            branch_protection_rules: n.branch_protection_rules.total_count,
            required_check_apps: apps,
            rulesets: n.rulesets.map_or(0, |c| c.total_count),
            pull_requests: n.pull_requests.total_count,
            issues: n.issues.total_count,
            milestones: n.milestones.total_count,
            releases: n.releases.total_count,
            deployments: n.deployments.total_count,
            packages: n.packages.total_count,
            watchers: n.watchers.total_count,
            commit_comments: n.commit_comments.total_count,
            stargazers: n.stargazer_count,
            has_wiki_enabled: n.has_wiki_enabled,
            has_projects_enabled: n.has_projects_enabled,
            has_vulnerability_alerts_enabled: n.has_vulnerability_alerts_enabled.unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgSummary {
    pub analysis_date: DateTime<Utc>,
    pub organization: OrgInfo,
    /// Count GitHub reported for the (filtered) repository connection.
    pub total_repositories: u64,
    pub repositories: Vec<RepoSummary>,
}

impl OrgSummary {
    /// Sum of repository disk usage in bytes.
    pub fn disk_usage_bytes(&self) -> u64 {
        self.repositories
            .iter()
            .filter_map(|r| r.disk_usage_kb)
            .fold(0u64, |acc, kb| acc.saturating_add(kb.saturating_mul(1024)))
    }
}

#[derive(Debug, Clone)]
pub struct SummaryOptions {
    pub skip_forks: bool,
    pub skip_archived: bool,
    /// Pause between repository pages.
    pub page_delay: Duration,
    /// Attempts per request, including the first.
    pub max_attempts: u32,
    /// First retry waits twice this; waits double up to eight times it.
    pub retry_base: Duration,
}

impl SummaryOptions {
    pub fn from_config(config: &Config) -> Self {
        let c = &config.org_summary;
        Self {
            skip_forks: c.skip_forks,
            skip_archived: c.skip_archived,
            page_delay: Duration::from_millis(c.page_delay_ms),
            max_attempts: c.max_retries,
            retry_base: Duration::from_secs(1),
        }
    }
}

pub struct OrgSummaryCollector {
    client: Arc<dyn GraphqlClient>,
    options: SummaryOptions,
}

impl OrgSummaryCollector {
    pub fn new(client: Arc<dyn GraphqlClient>, options: SummaryOptions) -> Self {
        Self { client, options }
    }

    pub async fn collect(&self, org: &str) -> Result<OrgSummary> {
        let organization: OrgNode = self
            .organization(ORGANIZATION_QUERY, json!({ "org": org }), org, "organization info")
            .await?;

        let mut repositories = Vec::new();
        let mut total_repositories = 0;
        let mut cursor: Option<String> = None;
        for page in 1u32.. {
            let variables = json!({
                "org": org,
                "cursor": cursor,
                "isFork": self.options.skip_forks.then_some(false),
                "isArchived": self.options.skip_archived.then_some(false),
            });
            let label = format!("repository page {}", page);
            let node: RepositoriesNode = self
                .organization(REPOSITORIES_QUERY, variables, org, &label)
                .await?;
            let conn = node.repositories;

            if page == 1 {
                total_repositories = conn.total_count;
                info!(org, total = total_repositories, "listing repositories");
            }
            debug!(org, page, received = conn.nodes.len(), "repository page");
            repositories.extend(conn.nodes.into_iter().map(RepoSummary::from));

            if !conn.page_info.has_next_page {
                break;
            }
            cursor = match conn.page_info.end_cursor {
                Some(c) => Some(c),
                None => bail!("GitHub reported more repositories but no cursor after page {}", page),
            };
            if !self.options.page_delay.is_zero() {
                tokio::time::sleep(self.options.page_delay).await;
            }
        }

        info!(org, repos = repositories.len(), "organization summary collected");
        Ok(OrgSummary {
            analysis_date: Utc::now(),
            organization: organization.into(),
            total_repositories,
            repositories,
        })
    }

    /// Run `query` with retries and decode its `organization` field.
    async fn organization<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
        org: &str,
        label: &str,
    ) -> Result<T> {
        let data = self.query_with_retry(query, variables, label).await?;
        let wrapper: OrganizationData<T> = serde_json::from_value(data)
            .with_context(|| format!("Unexpected GraphQL response shape for {}", label))?;
        wrapper
            .organization
            .with_context(|| format!("Organization '{}' not found", org))
    }

    async fn query_with_retry(&self, query: &str, variables: Value, label: &str) -> Result<Value> {
        let attempts = self.options.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.client.query(query, variables.clone()).await {
                Ok(data) => return Ok(data),
                Err(e) if attempt >= attempts => {
                    return Err(e.context(format!(
                        "Failed to fetch {} after {} attempts",
                        label, attempts
                    )));
                }
                Err(e) => {
                    let wait = (self.options.retry_base * 2u32.pow(attempt))
                        .min(self.options.retry_base * 8);
                    warn!(
                        label,
                        attempt,
                        attempts,
                        error = %format!("{:#}", e),
                        wait_ms = wait.as_millis() as u64,
                        "GraphQL request failed; retrying"
                    );
                    if !wait.is_zero() {
                        tokio::time::sleep(wait).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}

pub fn render(summary: &OrgSummary) -> String {
    let org = &summary.organization;
    let forks = summary.repositories.iter().filter(|r| r.is_fork).count();
    let archived = summary.repositories.iter().filter(|r| r.is_archived()).count();

    let mut out = String::new();
    let _ = writeln!(out, "Organization Summary: {}", org.login);
    let _ = writeln!(out, "{}", "=".repeat(50));
    if let Some(name) = &org.name {
        let _ = writeln!(out, "Name: {}", name);
    }
    let _ = writeln!(out, "URL: {}", org.url);
    let _ = writeln!(out, "Analysis Date: {}", summary.analysis_date.to_rfc3339());
    let _ = writeln!(
        out,
        "Projects: {}  Teams: {}  Members: {}  Discussions: {}",
        org.projects, org.teams, org.members, org.discussions
    );
    let _ = writeln!(
        out,
        "Repositories: {} of {} ({} forks, {} archived)",
        summary.repositories.len(),
        summary.total_repositories,
        forks,
        archived
    );
    let _ = writeln!(out, "Total Disk Usage: {}", format_size(summary.disk_usage_bytes()));
    let _ = writeln!(out, "{}", "-".repeat(50));

    for repo in &summary.repositories {
        let disk = repo
            .disk_usage_kb
            .map(|kb| format_size(kb.saturating_mul(1024)))
            .unwrap_or_else(|| "not reported".to_string());
        let mut flags = String::new();
        if repo.is_fork {
            flags.push_str(" [fork]");
        }
        if repo.is_archived() {
            flags.push_str(" [archived]");
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "Repository: {}{}", repo.name, flags);
        let _ = writeln!(out, "  Disk Usage:        {}", disk);
        let _ = writeln!(
            out,
            "  Pull Requests: {}  Issues: {}  Releases: {}",
            repo.pull_requests, repo.issues, repo.releases
        );
        let _ = writeln!(
            out,
            "  Branch Protections: {}  Rulesets: {}",
            repo.branch_protection_rules, repo.rulesets
        );
        if !repo.required_check_apps.is_empty() {
            let _ = writeln!(
                out,
                "  Required Check Apps: {}",
                repo.required_check_apps.join(", ")
            );
        }
    }
    out
}

/// `readiness org-summary`: fetch, persist, and print.
pub async fn run_org_summary(config: &Config) -> Result<()> {
    let org = config.org()?;
    let token = config.require_token()?;
    let output = &config.org_summary.output;
    check_writable(output)?;

    let client = GithubGraphql::new(
        &config.github.api_base,
        token,
        Duration::from_secs(config.github.timeout_secs),
    )?;
    let collector = OrgSummaryCollector::new(Arc::new(client), SummaryOptions::from_config(config));
    let summary = collector.collect(org).await?;

    write_json_atomic(&summary, output)?;
    print!("{}", render(&summary));
    println!("\nDetailed results have been saved to {}", output.display());
    Ok(())
}

pub fn load(path: &std::path::Path) -> Result<OrgSummary> {
    read_json(path)
}
