//! Local-filesystem dependency resolution.
//!
//! Used when no remote repository access is available: a folder on disk holds
//! one checkout per tracked repository, and a (repository, commit) pair is
//! resolved to a checkout either through an explicit remotes map or by asking
//! git which checkout's history contains the commit. The dependency manifest
//! is then read out of that commit with `git show`.
//!
//! The remotes map is owned by the resolver instance and scoped to it; there
//! is no process-wide mapping state.

use crate::error::{Error, Result};
use crate::models::{DependencyDetail, GitDiff};
use crate::remote::RepoRemote;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, warn};

/// File name of the dependency manifest read from each commit.
pub const DEPENDENCY_MANIFEST: &str = "dependencies.json";

enum Layout {
    /// Explicit repository-URI → checkout-path mapping.
    RemotesMap(HashMap<String, PathBuf>),
    /// Folder with one checkout subfolder per repository; the checkout whose
    /// git history contains the commit wins.
    ReposFolder(PathBuf),
    /// Unit-test layout: `{root}/{repo}/{commit}/dependencies.json` read
    /// directly from disk, no git involved.
    TestLayout(PathBuf),
}

/// Filesystem-backed implementation of [`RepoRemote`].
///
/// `git_diff` always reports an unknown diff; node diffing is a remote-only
/// feature and the graph builder rejects it for local builds before asking.
pub struct LocalDependencyResolver {
    layout: Layout,
    git_executable: String,
}

impl LocalDependencyResolver {
    /// Resolve commits by scanning the checkouts under `repos_folder`.
    #[must_use]
    pub fn from_repos_folder(repos_folder: impl Into<PathBuf>) -> Self {
        LocalDependencyResolver {
            layout: Layout::ReposFolder(repos_folder.into()),
            git_executable: "git".to_string(),
        }
    }

    /// Resolve repositories through an explicit URI → checkout-path map.
    #[must_use]
    pub fn from_remotes_map(remotes_map: HashMap<String, PathBuf>) -> Self {
        let normalized = remotes_map
            .into_iter()
            .map(|(uri, path)| (uri.to_lowercase(), path))
            .collect();
        LocalDependencyResolver {
            layout: Layout::RemotesMap(normalized),
            git_executable: "git".to_string(),
        }
    }

    /// Resolve `{root}/{repo}/{commit}/dependencies.json` directly from disk.
    #[must_use]
    pub fn from_test_layout(root: impl Into<PathBuf>) -> Self {
        LocalDependencyResolver {
            layout: Layout::TestLayout(root.into()),
            git_executable: "git".to_string(),
        }
    }

    /// Override the git executable used for history lookups.
    #[must_use]
    pub fn with_git_executable(mut self, git_executable: impl Into<String>) -> Self {
        self.git_executable = git_executable.into();
        self
    }

    /// Find the checkout whose history contains `commit`.
    async fn resolve_repo_path(&self, repo_uri: &str, commit: &str) -> Result<PathBuf> {
        match &self.layout {
            Layout::RemotesMap(map) => {
                map.get(&repo_uri.to_lowercase()).cloned().ok_or_else(|| {
                    Error::Config(format!(
                        "a key matching '{repo_uri}' was not found in the remotes map"
                    ))
                })
            }
            Layout::ReposFolder(folder) => {
                let mut entries = tokio::fs::read_dir(folder).await?;
                while let Some(entry) = entries.next_entry().await? {
                    if !entry.file_type().await?.is_dir() {
                        continue;
                    }
                    if self.history_contains(&entry.path(), commit).await? {
                        return Ok(entry.path());
                    }
                }
                Err(Error::Config(format!(
                    "commit '{commit}' was not found in any folder under '{}'; \
                     make sure a checkout for '{repo_uri}' exists and is up to date",
                    folder.display()
                )))
            }
            Layout::TestLayout(_) => unreachable!("test layout does not resolve checkouts"),
        }
    }

    /// Whether any branch of the checkout at `path` contains `commit`.
    async fn history_contains(&self, path: &Path, commit: &str) -> Result<bool> {
        let output = Command::new(&self.git_executable)
            .args(["branch", "--contains", commit])
            .current_dir(path)
            .output()
            .await?;
        Ok(output.status.success() && !output.stdout.is_empty())
    }

    /// Read the manifest out of `commit` with `git show`.
    async fn git_show_manifest(&self, repo_path: &Path, commit: &str) -> Result<Option<String>> {
        let output = Command::new(&self.git_executable)
            .args(["show", &format!("{commit}:{DEPENDENCY_MANIFEST}")])
            .current_dir(repo_path)
            .output()
            .await?;
        if !output.status.success() || output.stdout.is_empty() {
            // The commit exists here but carries no manifest; the caller
            // treats this the same as a missing manifest on a remote.
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()))
    }

    fn parse_manifest(contents: &str) -> Result<Vec<DependencyDetail>> {
        serde_json::from_str(contents).map_err(|e| Error::MalformedManifest(e.to_string()))
    }
}

#[async_trait]
impl RepoRemote for LocalDependencyResolver {
    async fn get_dependencies(
        &self,
        repo_uri: &str,
        commit: &str,
    ) -> Result<Vec<DependencyDetail>> {
        if let Layout::TestLayout(root) = &self.layout {
            let manifest = root.join(repo_uri).join(commit).join(DEPENDENCY_MANIFEST);
            debug!(path = %manifest.display(), "reading dependency manifest");
            return match tokio::fs::read_to_string(&manifest).await {
                Ok(contents) => Self::parse_manifest(&contents),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    Err(Error::DependencyFileNotFound {
                        repo: repo_uri.to_string(),
                        commit: commit.to_string(),
                    })
                }
                Err(e) => Err(e.into()),
            };
        }

        let repo_path = self.resolve_repo_path(repo_uri, commit).await?;
        debug!(repo = repo_uri, commit, path = %repo_path.display(), "resolved local checkout");
        match self.git_show_manifest(&repo_path, commit).await? {
            Some(contents) => Self::parse_manifest(&contents),
            None => {
                warn!(repo = repo_uri, commit, "no dependency manifest at commit");
                Err(Error::DependencyFileNotFound {
                    repo: repo_uri.to_string(),
                    commit: commit.to_string(),
                })
            }
        }
    }

    async fn git_diff(
        &self,
        _repo_uri: &str,
        _from_commit: &str,
        _to_commit: &str,
    ) -> Result<GitDiff> {
        Ok(GitDiff::unknown())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DependencyKind;
    use tempfile::tempdir;

    fn manifest_json() -> String {
        serde_json::to_string(&vec![DependencyDetail {
            name: "Foo.Bar".to_string(),
            version: "1.2.3".to_string(),
            commit: "childsha".to_string(),
            repo_uri: "https://github.com/org/child".to_string(),
            kind: DependencyKind::Product,
        }])
        .unwrap()
    }

    #[tokio::test]
    async fn test_layout_reads_manifest_from_disk() {
        let root = tempdir().unwrap();
        let commit_dir = root.path().join("repo-a").join("sha1");
        std::fs::create_dir_all(&commit_dir).unwrap();
        std::fs::write(commit_dir.join(DEPENDENCY_MANIFEST), manifest_json()).unwrap();

        let resolver = LocalDependencyResolver::from_test_layout(root.path());
        let deps = resolver.get_dependencies("repo-a", "sha1").await.unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "Foo.Bar");
        assert_eq!(deps[0].kind, DependencyKind::Product);
    }

    #[tokio::test]
    async fn test_layout_missing_manifest_is_file_not_found() {
        let root = tempdir().unwrap();
        let resolver = LocalDependencyResolver::from_test_layout(root.path());
        let err = resolver
            .get_dependencies("repo-a", "missing")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DependencyFileNotFound { .. }));
    }

    #[tokio::test]
    async fn test_layout_malformed_manifest_is_fatal() {
        let root = tempdir().unwrap();
        let commit_dir = root.path().join("repo-a").join("sha1");
        std::fs::create_dir_all(&commit_dir).unwrap();
        std::fs::write(commit_dir.join(DEPENDENCY_MANIFEST), "not json").unwrap();

        let resolver = LocalDependencyResolver::from_test_layout(root.path());
        let err = resolver
            .get_dependencies("repo-a", "sha1")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedManifest(_)));
    }

    #[tokio::test]
    async fn remotes_map_rejects_unknown_repo_before_running_git() {
        let resolver = LocalDependencyResolver::from_remotes_map(HashMap::new());
        let err = resolver
            .get_dependencies("https://github.com/org/repo", "sha1")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn empty_repos_folder_reports_commit_not_found() {
        let root = tempdir().unwrap();
        let resolver = LocalDependencyResolver::from_repos_folder(root.path());
        let err = resolver
            .get_dependencies("https://github.com/org/repo", "sha1")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn git_diff_is_always_unknown() {
        let resolver = LocalDependencyResolver::from_test_layout("/nonexistent");
        let diff = resolver.git_diff("r", "a", "b").await.unwrap();
        assert!(!diff.valid);
    }
}
