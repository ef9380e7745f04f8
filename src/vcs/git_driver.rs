//! Production [`VcsDriver`] implementation: shells out to the `git`
//! executable via `std::process::Command`, pairing every invocation with
//! [`log_cmd`] and a working-directory argument instead of ever touching
//! the process's current directory.

use std::path::Path;
use std::process::{Command, Output};

use crate::util::log_cmd;
use crate::vcs::{GitError, VcsDriver};

#[derive(Debug, Default, Clone, Copy)]
pub struct GitDriver;

impl GitDriver {
    pub fn new() -> Self {
        Self
    }

    fn run(&self, path: &Path, args: &[&str]) -> Result<Output, GitError> {
        let mut cmd = Command::new("git");
        cmd.args(args).current_dir(path);
        log_cmd(&cmd);
        cmd.output().map_err(|source| GitError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    fn run_ok(&self, path: &Path, args: &[&str]) -> Result<(), GitError> {
        let output = self.run(path, args)?;
        if output.status.success() {
            Ok(())
        } else {
            Err(GitError::CommandFailed {
                args: args.join(" "),
                path: path.display().to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    fn stdout_trimmed(&self, path: &Path, args: &[&str]) -> Result<String, GitError> {
        let output = self.run(path, args)?;
        if !output.status.success() {
            return Err(GitError::CommandFailed {
                args: args.join(" "),
                path: path.display().to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        String::from_utf8(output.stdout)
            .map(|s| s.trim().to_string())
            .map_err(|_| GitError::InvalidUtf8 {
                command: args.join(" "),
            })
    }
}

impl VcsDriver for GitDriver {
    fn exists(&self, path: &Path) -> bool {
        path.join(".git").exists()
    }

    fn clone_repo(
        &self,
        url: &str,
        into: &Path,
        remote_name: &str,
        branch: &str,
        mirror: bool,
    ) -> Result<(), GitError> {
        if mirror {
            return self.run_ok(
                into.parent().unwrap_or_else(|| Path::new(".")),
                &["clone", "--mirror", "-o", remote_name, url, &path_str(into)],
            );
        }

        let parent = into.parent().unwrap_or_else(|| Path::new("."));
        let dest = path_str(into);

        let by_branch = self.run(
            parent,
            &["clone", "-o", remote_name, "-b", branch, url, &dest],
        )?;
        if by_branch.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&by_branch.stderr);
        if !stderr.contains("Remote branch") && !stderr.contains("not found") {
            return Err(GitError::CommandFailed {
                args: "clone".to_string(),
                path: parent.display().to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        self.run_ok(parent, &["clone", "-o", remote_name, url, &dest])?;
        self.run_ok(into, &["checkout", branch])
    }

    fn fetch(&self, path: &Path, remote_name: Option<&str>) -> Result<(), GitError> {
        match remote_name {
            Some(name) => self.run_ok(path, &["fetch", name]),
            None => self.run_ok(path, &["fetch"]),
        }
    }

    fn pull(&self, path: &Path) -> Result<(), GitError> {
        self.run_ok(path, &["pull"])
    }

    fn checkout(&self, path: &Path, revision: &str, create: bool) -> Result<(), GitError> {
        if create {
            self.run_ok(path, &["checkout", "-b", revision])
        } else {
            self.run_ok(path, &["checkout", revision])
        }
    }

    fn reset_hard(&self, path: &Path, commit: &str) -> Result<(), GitError> {
        self.run_ok(path, &["reset", "--hard", commit])
    }

    fn commit(&self, path: &Path, message: &str) -> Result<(), GitError> {
        self.run_ok(path, &["add", "-A"])?;
        self.run_ok(path, &["commit", "-m", message])
    }

    fn revision_is_branch(&self, path: &Path, revision: &str) -> Result<bool, GitError> {
        let output = self.run(
            path,
            &["show-ref", "--verify", "--quiet", &format!("refs/remotes/origin/{revision}")],
        )?;
        Ok(output.status.success())
    }

    fn uncommitted_changes(&self, path: &Path) -> Result<bool, GitError> {
        let status = self.stdout_trimmed(path, &["status", "--porcelain=v1"])?;
        Ok(!status.is_empty())
    }

    fn current_branch(&self, path: &Path) -> Result<String, GitError> {
        let name = self.stdout_trimmed(path, &["symbolic-ref", "--short", "-q", "HEAD"]);
        match name {
            Ok(name) if !name.is_empty() => Ok(name),
            _ => self.current_commit(path),
        }
    }

    fn current_commit(&self, path: &Path) -> Result<String, GitError> {
        self.stdout_trimmed(path, &["rev-parse", "HEAD"])
    }

    fn remove(&self, path: &Path) -> Result<(), GitError> {
        std::fs::remove_dir_all(path).map_err(|source| GitError::Io {
            path: path.display().to_string(),
            source,
        })
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn git(dir: &Path, args: &[&str]) {
        let output = Command::new("git")
            .current_dir(dir)
            .args(args)
            .output()
            .unwrap_or_else(|e| panic!("failed to run git {args:?}: {e}"));
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    fn init_repo(dir: &Path) {
        git(dir, &["init", "-b", "main"]);
        git(dir, &["config", "user.email", "test@example.com"]);
        git(dir, &["config", "user.name", "Test User"]);
        fs::write(dir.join("README.md"), "hello").unwrap();
        git(dir, &["add", "README.md"]);
        git(dir, &["commit", "-m", "initial"]);
    }

    #[test]
    fn exists_reflects_dot_git_presence() {
        let temp = TempDir::new().unwrap();
        let driver = GitDriver::new();
        assert!(!driver.exists(temp.path()));
        init_repo(temp.path());
        assert!(driver.exists(temp.path()));
    }

    #[test]
    fn clean_repo_has_no_uncommitted_changes() {
        let temp = TempDir::new().unwrap();
        init_repo(temp.path());
        let driver = GitDriver::new();
        assert!(!driver.uncommitted_changes(temp.path()).unwrap());

        fs::write(temp.path().join("untracked.txt"), "x").unwrap();
        assert!(driver.uncommitted_changes(temp.path()).unwrap());
    }

    #[test]
    fn current_branch_and_commit_after_init() {
        let temp = TempDir::new().unwrap();
        init_repo(temp.path());
        let driver = GitDriver::new();
        assert_eq!(driver.current_branch(temp.path()).unwrap(), "main");
        assert_eq!(driver.current_commit(temp.path()).unwrap().len(), 40);
    }

    #[test]
    fn clone_into_new_directory_succeeds() {
        let origin_root = TempDir::new().unwrap();
        init_repo(origin_root.path());

        let dest_root = TempDir::new().unwrap();
        let dest = dest_root.path().join("clone");
        let driver = GitDriver::new();

        driver
            .clone_repo(
                &origin_root.path().display().to_string(),
                &dest,
                "origin",
                "main",
                false,
            )
            .unwrap();

        assert!(driver.exists(&dest));
        assert_eq!(driver.current_branch(&dest).unwrap(), "main");
    }

    #[test]
    fn remove_deletes_directory() {
        let temp = TempDir::new().unwrap();
        init_repo(temp.path());
        let driver = GitDriver::new();
        let path = temp.path().to_path_buf();
        driver.remove(&path).unwrap();
        assert!(!path.exists());
    }
}
