use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub org_stats: OrgStatsConfig,
    #[serde(default)]
    pub org_summary: OrgSummaryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GithubConfig {
    #[serde(default)]
    pub org: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_web_base")]
    pub web_base: String,
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            org: None,
            token: None,
            api_base: default_api_base(),
            web_base: default_web_base(),
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}
fn default_web_base() -> String {
    "https://github.com".to_string()
}
fn default_http_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkspaceConfig {
    #[serde(default = "default_base_path")]
    pub base_path: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
        }
    }
}

fn default_base_path() -> PathBuf {
    PathBuf::from("~/repos")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    #[serde(default = "default_report_output")]
    pub output: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output: default_report_output(),
        }
    }
}

fn default_report_output() -> PathBuf {
    PathBuf::from("repo_analysis.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    #[serde(default = "default_git_bin")]
    pub git_bin: String,
    #[serde(default = "default_sizer_bin")]
    pub sizer_bin: String,
    #[serde(default = "default_sizer_args")]
    pub sizer_args: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_clone_timeout_secs")]
    pub clone_timeout_secs: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            git_bin: default_git_bin(),
            sizer_bin: default_sizer_bin(),
            sizer_args: default_sizer_args(),
            timeout_secs: default_timeout_secs(),
            clone_timeout_secs: default_clone_timeout_secs(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_git_bin() -> String {
    "git".to_string()
}
fn default_sizer_bin() -> String {
    "git-sizer".to_string()
}
fn default_sizer_args() -> Vec<String> {
    vec!["--json".to_string()]
}
fn default_timeout_secs() -> u64 {
    600
}
fn default_clone_timeout_secs() -> u64 {
    1800
}
fn default_concurrency() -> usize {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct OrgStatsConfig {
    #[serde(default = "default_gh_bin")]
    pub gh_bin: String,
    #[serde(default = "default_org_stats_output")]
    pub output: PathBuf,
    #[serde(default = "default_org_stats_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OrgStatsConfig {
    fn default() -> Self {
        Self {
            gh_bin: default_gh_bin(),
            output: default_org_stats_output(),
            timeout_secs: default_org_stats_timeout_secs(),
        }
    }
}

fn default_gh_bin() -> String {
    "gh".to_string()
}
fn default_org_stats_output() -> PathBuf {
    PathBuf::from("org_stats.json")
}
fn default_org_stats_timeout_secs() -> u64 {
    3600
}

#[derive(Debug, Deserialize, Clone)]
pub struct OrgSummaryConfig {
    #[serde(default = "default_org_summary_output")]
    pub output: PathBuf,
    #[serde(default)]
    pub skip_forks: bool,
    #[serde(default)]
    pub skip_archived: bool,
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
    /// Attempts per GraphQL request, including the first.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for OrgSummaryConfig {
    fn default() -> Self {
        Self {
            output: default_org_summary_output(),
            skip_forks: false,
            skip_archived: false,
            page_delay_ms: default_page_delay_ms(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_org_summary_output() -> PathBuf {
    PathBuf::from("org_summary.json")
}
fn default_page_delay_ms() -> u64 {
    1000
}
fn default_max_retries() -> u32 {
    3
}

impl Config {
    /// The configured organization, or an error naming how to set it.
    pub fn org(&self) -> Result<&str> {
        self.github
            .org
            .as_deref()
            .filter(|o| !o.is_empty())
            .context("GitHub organization is not set (use --org, GITHUB_ORG, or [github].org)")
    }

    pub fn token(&self) -> Option<&str> {
        self.github.token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn require_token(&self) -> Result<&str> {
        self.token()
            .context("GitHub token is not set (use --token, GITHUB_TOKEN, or [github].token)")
    }

    /// Check values that are independent of which command runs.
    pub fn validate(&self) -> Result<()> {
        if self.analysis.concurrency == 0 {
            anyhow::bail!("analysis.concurrency must be >= 1");
        }
        if self.analysis.timeout_secs == 0 || self.analysis.clone_timeout_secs == 0 {
            anyhow::bail!("analysis timeouts must be > 0");
        }
        if self.org_stats.timeout_secs == 0 || self.github.timeout_secs == 0 {
            anyhow::bail!("timeouts must be > 0");
        }
        if self.analysis.git_bin.trim().is_empty() || self.analysis.sizer_bin.trim().is_empty() {
            anyhow::bail!("analysis.git_bin and analysis.sizer_bin must not be empty");
        }
        if self.org_stats.gh_bin.trim().is_empty() {
            anyhow::bail!("org_stats.gh_bin must not be empty");
        }
        if self.org_summary.max_retries == 0 {
            anyhow::bail!("org_summary.max_retries must be >= 1");
        }
        Ok(())
    }

    /// Expand a leading `~` in configured paths.
    pub fn expand_paths(&mut self) {
        self.workspace.base_path = expand_home(&self.workspace.base_path);
        self.report.output = expand_home(&self.report.output);
        self.org_stats.output = expand_home(&self.org_stats.output);
        self.org_summary.output = expand_home(&self.org_summary.output);
    }
}

pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

/// Load `path` if it exists; a missing file at the default location means
/// built-in defaults.
pub fn load_or_default(path: &Path, explicit: bool) -> Result<Config> {
    if !explicit && !path.exists() {
        return Ok(Config::default());
    }
    load_config(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.analysis.sizer_args, vec!["--json"]);
        assert_eq!(cfg.analysis.concurrency, 1);
        assert_eq!(cfg.report.output, PathBuf::from("repo_analysis.json"));
        assert!(cfg.validate().is_ok());
        assert!(cfg.org().is_err());
        assert!(cfg.token().is_none());
    }

    #[test]
    fn parses_partial_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("readiness.toml");
        std::fs::write(
            &path,
            r#"
[github]
org = "acme"

[analysis]
concurrency = 4
sizer_bin = "/opt/bin/git-sizer"
"#,
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.org().unwrap(), "acme");
        assert_eq!(cfg.analysis.concurrency, 4);
        assert_eq!(cfg.analysis.sizer_bin, "/opt/bin/git-sizer");
        assert_eq!(cfg.analysis.git_bin, "git");
        assert_eq!(cfg.github.api_base, "https://api.github.com");
    }

    #[test]
    fn rejects_zero_concurrency() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("readiness.toml");
        std::fs::write(&path, "[analysis]\nconcurrency = 0\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn org_summary_section() {
        let cfg = Config::default();
        assert_eq!(cfg.org_summary.output, PathBuf::from("org_summary.json"));
        assert_eq!(cfg.org_summary.max_retries, 3);
        assert_eq!(cfg.org_summary.page_delay_ms, 1000);

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("readiness.toml");
        std::fs::write(&path, "[org_summary]
skip_forks = true
max_retries = 0
").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("max_retries"));
    }

    #[test]
    fn missing_default_file_falls_back() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("absent.toml");
        assert!(load_or_default(&path, false).is_ok());
        assert!(load_or_default(&path, true).is_err());
    }

    #[test]
    fn expands_home_prefix() {
        let expanded = expand_home(Path::new("~/repos"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("repos"));
        }
        assert_eq!(expand_home(Path::new("/abs")), PathBuf::from("/abs"));
    }
}
