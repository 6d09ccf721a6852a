//! Local clone layout.
//!
//! Clones live at `base_path/[scope/]name` so that repeated runs find and
//! reuse earlier clones. Nothing here ever deletes or refreshes a clone.

use std::path::{Path, PathBuf};

use crate::models::RepoId;

#[derive(Debug, Clone)]
pub struct RepositoryStore {
    base_path: PathBuf,
}

impl RepositoryStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Deterministic location for a repository's clone.
    pub fn expected_path(&self, scope_dir: Option<&str>, repo: &RepoId) -> PathBuf {
        match scope_dir {
            Some(dir) => self.base_path.join(dir).join(repo.as_str()),
            None => self.base_path.join(repo.as_str()),
        }
    }

    pub fn exists(&self, scope_dir: Option<&str>, repo: &RepoId) -> bool {
        self.expected_path(scope_dir, repo).is_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn path_includes_scope_dir() {
        let store = RepositoryStore::new("/srv/repos");
        let repo = RepoId::new("billing");
        assert_eq!(
            store.expected_path(Some("platform"), &repo),
            PathBuf::from("/srv/repos/platform/billing")
        );
        assert_eq!(
            store.expected_path(None, &repo),
            PathBuf::from("/srv/repos/billing")
        );
    }

    #[test]
    fn exists_only_for_directories() {
        let tmp = TempDir::new().unwrap();
        let store = RepositoryStore::new(tmp.path());
        let repo = RepoId::new("web");
        assert!(!store.exists(None, &repo));

        std::fs::write(tmp.path().join("web"), "not a clone").unwrap();
        assert!(!store.exists(None, &repo));

        std::fs::remove_file(tmp.path().join("web")).unwrap();
        std::fs::create_dir(tmp.path().join("web")).unwrap();
        assert!(store.exists(None, &repo));
    }
}
