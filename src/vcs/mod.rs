//! The VCS driver contract: typed operations over an external `git`,
//! plus a production implementation and a test double.
//!
//! Every operation takes an explicit working-directory argument. None of
//! them mutate the process's current directory — safe for concurrent
//! fan-out across many projects at once.

mod git_driver;
mod mock;

pub use git_driver::GitDriver;
pub use mock::MockDriver;

use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GitError {
    #[error("git {args} failed in {path}: {stderr}")]
    CommandFailed {
        args: String,
        path: String,
        stderr: String,
    },

    #[error("io error running git in {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("git output for '{command}' was not valid UTF-8")]
    InvalidUtf8 { command: String },
}

/// Typed operations over a single project's working tree.
///
/// Implemented by [`GitDriver`] (shells out to `git`) and by
/// [`MockDriver`] (an in-memory test double used by the sync engine's
/// unit tests).
pub trait VcsDriver: Send + Sync {
    fn exists(&self, path: &Path) -> bool;

    fn clone_repo(
        &self,
        url: &str,
        into: &Path,
        remote_name: &str,
        branch: &str,
        mirror: bool,
    ) -> Result<(), GitError>;

    fn fetch(&self, path: &Path, remote_name: Option<&str>) -> Result<(), GitError>;

    fn pull(&self, path: &Path) -> Result<(), GitError>;

    fn checkout(&self, path: &Path, revision: &str, create: bool) -> Result<(), GitError>;

    fn reset_hard(&self, path: &Path, commit: &str) -> Result<(), GitError>;

    fn commit(&self, path: &Path, message: &str) -> Result<(), GitError>;

    fn revision_is_branch(&self, path: &Path, revision: &str) -> Result<bool, GitError>;

    fn uncommitted_changes(&self, path: &Path) -> Result<bool, GitError>;

    fn current_branch(&self, path: &Path) -> Result<String, GitError>;

    fn current_commit(&self, path: &Path) -> Result<String, GitError>;

    fn remove(&self, path: &Path) -> Result<(), GitError>;

    /// Composite operation: clone if `path` doesn't exist yet, otherwise
    /// fetch and then either pull (branch revision) or checkout (pinned
    /// revision).
    ///
    /// `subpath` is the project's path within `url`'s remote (its `name`
    /// in the manifest) — joined onto `url` to form the real per-project
    /// clone URL before the first clone. Pass `""` when `url` is already
    /// the complete fetch URL (e.g. the manifest repo itself).
    fn update(
        &self,
        path: &Path,
        url: &str,
        subpath: &str,
        remote_name: &str,
        revision: &str,
        mirror: bool,
    ) -> Result<(), GitError> {
        if !self.exists(path) {
            let clone_url = crate::core::url::url_join(Some(url), subpath);
            return self.clone_repo(&clone_url, path, remote_name, revision, mirror);
        }

        self.fetch(path, Some(remote_name))?;
        if self.revision_is_branch(path, revision)? {
            self.pull(path)
        } else {
            self.checkout(path, revision, false)
        }
    }
}
