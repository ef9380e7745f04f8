//! An in-memory [`VcsDriver`] double for sync-engine unit tests — no
//! subprocess, no filesystem, just a map of path state the test sets up
//! and asserts against.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::vcs::{GitError, VcsDriver};

#[derive(Debug, Clone, Default)]
struct RepoState {
    branch: String,
    commit: String,
    dirty: bool,
    branches: HashSet<String>,
}

/// Records every operation it was asked to perform, and can be primed to
/// fail specific operations (by path) a fixed number of times before
/// succeeding — exercising the sync engine's retry loop without a real
/// `git` process.
#[derive(Default)]
pub struct MockDriver {
    repos: Mutex<HashMap<PathBuf, RepoState>>,
    fail_update_times: Mutex<HashMap<PathBuf, u32>>,
    pending_clone_files: Mutex<HashMap<PathBuf, (String, String)>>,
    pub calls: Mutex<Vec<String>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_repo(&self, path: &Path, branch: &str, commit: &str) {
        self.repos.lock().unwrap().insert(
            path.to_path_buf(),
            RepoState {
                branch: branch.to_string(),
                commit: commit.to_string(),
                dirty: false,
                branches: HashSet::from([branch.to_string()]),
            },
        );
    }

    pub fn set_dirty(&self, path: &Path, dirty: bool) {
        if let Some(state) = self.repos.lock().unwrap().get_mut(path) {
            state.dirty = dirty;
        }
    }

    /// Arrange for the next `clone_repo` call targeting `path` to also
    /// write `file_name` with `contents` to disk — for tests where a
    /// later step reads the freshly cloned manifest file back.
    pub fn seed_manifest_clone(&self, path: &Path, file_name: &str, contents: &str) {
        self.pending_clone_files.lock().unwrap().insert(
            path.to_path_buf(),
            (file_name.to_string(), contents.to_string()),
        );
    }

    /// Make `update()` (via `clone_repo`/`fetch`/`pull`/`checkout`) fail
    /// for this path the next `times` calls, then succeed.
    pub fn fail_update_n_times(&self, path: &Path, times: u32) {
        self.fail_update_times
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), times);
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn maybe_fail(&self, path: &Path) -> Result<(), GitError> {
        let mut fails = self.fail_update_times.lock().unwrap();
        if let Some(remaining) = fails.get_mut(path) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(GitError::CommandFailed {
                    args: "update".to_string(),
                    path: path.display().to_string(),
                    stderr: "injected failure".to_string(),
                });
            }
        }
        Ok(())
    }
}

impl VcsDriver for MockDriver {
    fn exists(&self, path: &Path) -> bool {
        self.repos.lock().unwrap().contains_key(path)
    }

    fn clone_repo(
        &self,
        _url: &str,
        into: &Path,
        remote_name: &str,
        branch: &str,
        _mirror: bool,
    ) -> Result<(), GitError> {
        self.record(format!("clone {}", into.display()));
        self.maybe_fail(into)?;
        if let Some((file_name, contents)) = self.pending_clone_files.lock().unwrap().remove(into) {
            std::fs::create_dir_all(into).expect("create cloned repo dir");
            std::fs::write(into.join(file_name), contents).expect("write cloned file");
        }
        self.repos.lock().unwrap().insert(
            into.to_path_buf(),
            RepoState {
                branch: branch.to_string(),
                commit: format!("{remote_name}-initial"),
                dirty: false,
                branches: HashSet::from([branch.to_string()]),
            },
        );
        Ok(())
    }

    fn fetch(&self, path: &Path, _remote_name: Option<&str>) -> Result<(), GitError> {
        self.record(format!("fetch {}", path.display()));
        self.maybe_fail(path)
    }

    fn pull(&self, path: &Path) -> Result<(), GitError> {
        self.record(format!("pull {}", path.display()));
        self.maybe_fail(path)?;
        if let Some(state) = self.repos.lock().unwrap().get_mut(path) {
            state.commit = format!("{}-pulled", state.branch);
        }
        Ok(())
    }

    fn checkout(&self, path: &Path, revision: &str, _create: bool) -> Result<(), GitError> {
        self.record(format!("checkout {} {revision}", path.display()));
        self.maybe_fail(path)?;
        if let Some(state) = self.repos.lock().unwrap().get_mut(path) {
            state.branch = revision.to_string();
        }
        Ok(())
    }

    fn reset_hard(&self, path: &Path, commit: &str) -> Result<(), GitError> {
        self.record(format!("reset_hard {} {commit}", path.display()));
        if let Some(state) = self.repos.lock().unwrap().get_mut(path) {
            state.commit = commit.to_string();
        }
        Ok(())
    }

    fn commit(&self, path: &Path, _message: &str) -> Result<(), GitError> {
        self.record(format!("commit {}", path.display()));
        Ok(())
    }

    fn revision_is_branch(&self, path: &Path, revision: &str) -> Result<bool, GitError> {
        let repos = self.repos.lock().unwrap();
        Ok(repos
            .get(path)
            .map(|s| s.branches.contains(revision))
            .unwrap_or(true))
    }

    fn uncommitted_changes(&self, path: &Path) -> Result<bool, GitError> {
        Ok(self
            .repos
            .lock()
            .unwrap()
            .get(path)
            .map(|s| s.dirty)
            .unwrap_or(false))
    }

    fn current_branch(&self, path: &Path) -> Result<String, GitError> {
        self.repos
            .lock()
            .unwrap()
            .get(path)
            .map(|s| s.branch.clone())
            .ok_or_else(|| GitError::CommandFailed {
                args: "symbolic-ref".to_string(),
                path: path.display().to_string(),
                stderr: "no such repo".to_string(),
            })
    }

    fn current_commit(&self, path: &Path) -> Result<String, GitError> {
        self.repos
            .lock()
            .unwrap()
            .get(path)
            .map(|s| s.commit.clone())
            .ok_or_else(|| GitError::CommandFailed {
                args: "rev-parse".to_string(),
                path: path.display().to_string(),
                stderr: "no such repo".to_string(),
            })
    }

    fn remove(&self, path: &Path) -> Result<(), GitError> {
        self.record(format!("remove {}", path.display()));
        self.repos.lock().unwrap().remove(path);
        Ok(())
    }
}
