//! Local Git repository inspection through the `git` CLI

use opskit_core::{OpsError, OpsResult};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::common::execute_command;

/// Commit log format: short hash, refs, subject, relative date, author
const LOG_FORMAT: &str = "--pretty=format:%h -%d %s (%cr) <%an>";

/// A working tree with a `.git` directory
#[derive(Debug, Clone)]
pub struct GitRepo {
    path: PathBuf,
}

impl GitRepo {
    /// Open a repository; fails when `path` has no `.git` entry
    pub fn open(path: impl AsRef<Path>) -> OpsResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !is_git_repo(&path) {
            return Err(OpsError::connection(
                "git",
                format!("{} is not a git repository", path.display()),
            ));
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn git_dir(&self) -> PathBuf {
        self.path.join(".git")
    }

    /// Directory name of the working tree
    pub fn name(&self) -> Option<String> {
        self.path
            .canonicalize()
            .ok()
            .as_deref()
            .unwrap_or(&self.path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
    }

    async fn git(&self, args: &[&str]) -> OpsResult<String> {
        let dir = self.path.to_string_lossy();
        debug!(repo = %dir, args = ?args, "Running git");
        let output = execute_command("git", args, Some(&dir), None)
            .await?
            .into_result()?;
        Ok(output.stdout)
    }

    pub async fn current_branch(&self) -> OpsResult<String> {
        Ok(self
            .git(&["rev-parse", "--abbrev-ref", "HEAD"])
            .await?
            .trim()
            .to_string())
    }

    pub async fn head_commit(&self, short: bool) -> OpsResult<String> {
        let args: &[&str] = if short {
            &["rev-parse", "--short", "HEAD"]
        } else {
            &["rev-parse", "HEAD"]
        };
        Ok(self.git(args).await?.trim().to_string())
    }

    /// Most recent commits, newest first, one formatted line each
    pub async fn log(&self, limit: usize) -> OpsResult<Vec<String>> {
        let limit = limit.to_string();
        let stdout = self
            .git(&["log", "--abbrev-commit", LOG_FORMAT, "-n", &limit])
            .await?;
        Ok(stdout
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(str::to_string)
            .collect())
    }
}

pub fn is_git_repo(path: &Path) -> bool {
    path.join(".git").exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_requires_git_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = GitRepo::open(dir.path()).unwrap_err();
        assert!(err.to_string().contains("not a git repository"));

        std::fs::create_dir(dir.path().join(".git")).unwrap();
        let repo = GitRepo::open(dir.path()).unwrap();
        assert_eq!(repo.git_dir(), dir.path().join(".git"));
        assert!(repo.name().is_some());
    }
}
