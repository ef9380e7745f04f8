//! The sync engine: reconciling a stored manifest with a freshly
//! fetched one, classifying projects into add/keep/remove sets, and
//! running a bounded-parallelism fan-out of per-project work with
//! retries, safety gates, and rollback on abort.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{error, warn};

use crate::core::group::GroupFilter;
use crate::core::manifest::{Manifest, ManifestError};
use crate::core::url::url_join;
use crate::util::retry::{retry_with_backoff, RetryOptions};
use crate::vcs::{GitError, VcsDriver};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("manifest repository has uncommitted changes; commit or stash them first")]
    ManifestDirty,

    #[error("project '{0}' has uncommitted changes and would be removed; pass --force, or commit/stash first")]
    RemovalBlockedByDirtyProject(String),

    #[error("removing {0} project(s) requires --force")]
    ForceRequired(usize),

    #[error("project '{0}' has uncommitted changes")]
    ProjectDirty(String),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("could not read manifest file {0}: {1}")]
    ReadManifest(PathBuf, std::io::Error),
}

/// Outcome of syncing a single project.
#[derive(Debug, Clone)]
pub struct ProjectOutcome {
    pub path: String,
    pub success: bool,
    pub message: String,
}

/// Outcome of a whole sync run.
#[derive(Debug, Clone, Default)]
pub struct SyncOutcome {
    pub removed: Vec<String>,
    pub results: Vec<ProjectOutcome>,
}

impl SyncOutcome {
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|r| r.success)
    }
}

/// Inputs to a sync run.
pub struct SyncInputs<'a> {
    pub workspace_root: &'a Path,
    pub manifest_repo_path: PathBuf,
    pub manifest_file_path: PathBuf,
    pub manifest_url: Option<String>,
    pub manifest_remote_name: String,
    pub force: bool,
    pub branch_override: Option<String>,
    pub group_filter: GroupFilter,
    pub threads: usize,
    pub mirror: bool,
}

/// Run the full 8-stage sync algorithm against `old_manifest`, the
/// workspace's previously-stored manifest.
pub async fn sync(
    vcs: &Arc<dyn VcsDriver>,
    inputs: SyncInputs<'_>,
    old_manifest: &Manifest,
) -> Result<SyncOutcome, SyncError> {
    let manifest_repo = inputs.manifest_repo_path.clone();

    // Stage 1 — safety.
    if vcs.uncommitted_changes(&manifest_repo)? {
        return Err(SyncError::ManifestDirty);
    }
    let head_old = vcs.current_commit(&manifest_repo)?;
    let branch_old = vcs.current_branch(&manifest_repo)?;

    let rollback = |reason: &str| {
        error!("sync aborted ({reason}), rolling back manifest repository");
        if let Err(e) = vcs.checkout(&manifest_repo, &branch_old, false) {
            warn!("rollback: failed to restore branch '{branch_old}': {e}");
        }
        if let Err(e) = vcs.reset_hard(&manifest_repo, &head_old) {
            error!("rollback: failed to reset manifest repo to {head_old}: {e}");
        }
    };

    // Stage 2 — refresh manifest.
    if let Some(branch) = &inputs.branch_override {
        if let Err(e) = vcs.checkout(&manifest_repo, branch, false) {
            rollback("checkout of branch override failed");
            return Err(e.into());
        }
    }
    let refresh_revision = inputs
        .branch_override
        .clone()
        .unwrap_or_else(|| branch_old.clone());
    if let Err(e) = vcs.update(
        &manifest_repo,
        inputs.manifest_url.as_deref().unwrap_or(""),
        "",
        &inputs.manifest_remote_name,
        &refresh_revision,
        false,
    ) {
        rollback("manifest refresh failed");
        return Err(e.into());
    }
    let head_new = match vcs.current_commit(&manifest_repo) {
        Ok(c) => c,
        Err(e) => {
            rollback("failed to read refreshed manifest commit");
            return Err(e.into());
        }
    };

    // Stage 3 — classify.
    let (new_filtered, removed) = if head_new != head_old {
        let content = match std::fs::read_to_string(&inputs.manifest_file_path) {
            Ok(c) => c,
            Err(e) => {
                rollback("failed to read manifest file after refresh");
                return Err(SyncError::ReadManifest(inputs.manifest_file_path.clone(), e));
            }
        };
        let parsed = match Manifest::parse(&content) {
            Ok(m) => m,
            Err(e) => {
                rollback("manifest parse failed");
                return Err(e.into());
            }
        };
        let filtered = parsed.filter_groups(&inputs.group_filter);
        let removed = old_manifest.subtract(&filtered);
        (filtered, removed)
    } else {
        (old_manifest.clone(), Manifest::empty())
    };

    // Stage 4 — removal gate.
    if !removed.projects.is_empty() {
        if !inputs.force {
            rollback("removals present without --force");
            return Err(SyncError::ForceRequired(removed.projects.len()));
        }
        for project in &removed.projects {
            let path = inputs.workspace_root.join(&project.path);
            if vcs.exists(&path) {
                match vcs.uncommitted_changes(&path) {
                    Ok(true) => {
                        rollback("a project pending removal has uncommitted changes");
                        return Err(SyncError::RemovalBlockedByDirtyProject(project.path.clone()));
                    }
                    Ok(false) => {}
                    Err(e) => {
                        rollback("failed to check removal candidate for uncommitted changes");
                        return Err(e.into());
                    }
                }
            }
        }
    }

    // Stage 5 — per-project dirty gate.
    for project in &new_filtered.projects {
        let path = inputs.workspace_root.join(&project.path);
        if vcs.exists(&path) {
            match vcs.uncommitted_changes(&path) {
                Ok(true) => {
                    rollback("an existing project has uncommitted changes");
                    return Err(SyncError::ProjectDirty(project.path.clone()));
                }
                Ok(false) => {}
                Err(e) => {
                    rollback("failed to check existing project for uncommitted changes");
                    return Err(e.into());
                }
            }
        }
    }

    // Stage 6 — fan-out.
    let results = fan_out(
        vcs,
        inputs.workspace_root,
        &new_filtered,
        inputs.manifest_url.as_deref(),
        inputs.mirror,
        inputs.threads,
    )
    .await;

    // Stage 7 — deletion.
    let mut removed_paths = Vec::with_capacity(removed.projects.len());
    for project in &removed.projects {
        let path = inputs.workspace_root.join(&project.path);
        if vcs.exists(&path) {
            if let Err(e) = vcs.remove(&path) {
                warn!("failed to remove '{}': {e}", project.path);
            }
        }
        removed_paths.push(project.path.clone());
    }

    Ok(SyncOutcome {
        removed: removed_paths,
        results,
    })
}

/// Stage 6 in isolation — reused by `init`, which runs it over a freshly
/// parsed manifest with no prior state to reconcile against.
pub async fn fan_out(
    vcs: &Arc<dyn VcsDriver>,
    workspace_root: &Path,
    manifest: &Manifest,
    manifest_url: Option<&str>,
    mirror: bool,
    threads: usize,
) -> Vec<ProjectOutcome> {
    let permits = threads.max(1).min(manifest.projects.len().max(1));
    let semaphore = Arc::new(Semaphore::new(permits));
    let mut handles = Vec::with_capacity(manifest.projects.len());

    for project in manifest.projects.clone() {
        let vcs = Arc::clone(vcs);
        let semaphore = Arc::clone(&semaphore);
        let workspace_root = workspace_root.to_path_buf();
        let manifest_url = manifest_url.map(|s| s.to_string());

        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
            tokio::task::spawn_blocking(move || {
                sync_one_project(&vcs, &workspace_root, &project, manifest_url.as_deref(), mirror)
            })
            .await
            .unwrap_or_else(|e| ProjectOutcome {
                path: "<unknown>".to_string(),
                success: false,
                message: format!("worker panicked: {e}"),
            })
        }));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for handle in handles {
        outcomes.push(handle.await.unwrap_or_else(|e| ProjectOutcome {
            path: "<unknown>".to_string(),
            success: false,
            message: format!("task join failed: {e}"),
        }));
    }
    outcomes
}

fn sync_one_project(
    vcs: &Arc<dyn VcsDriver>,
    workspace_root: &Path,
    project: &crate::core::manifest::Project,
    manifest_url: Option<&str>,
    mirror: bool,
) -> ProjectOutcome {
    let path = workspace_root.join(&project.path);
    let existed = vcs.exists(&path);

    let mut saved_branch = None;
    if existed && !mirror {
        match vcs.current_branch(&path) {
            Ok(branch) => {
                if branch != project.revision {
                    if let Err(e) = vcs.checkout(&path, &project.revision, false) {
                        return ProjectOutcome {
                            path: project.path.clone(),
                            success: false,
                            message: format!("checkout to {} failed: {e}", project.revision),
                        };
                    }
                    saved_branch = Some(branch);
                }
            }
            Err(e) => {
                return ProjectOutcome {
                    path: project.path.clone(),
                    success: false,
                    message: format!("could not read current branch: {e}"),
                };
            }
        }
    }

    let full_url = url_join(manifest_url, &project.remote_url);

    let update_result = block_on_retry(RetryOptions::default(), || {
        vcs.update(
            &path,
            &full_url,
            &project.name,
            &project.remote_name,
            &project.revision,
            mirror,
        )
    });

    let mut success = true;
    let mut message = "synced".to_string();
    if let Err(e) = update_result {
        success = false;
        message = format!("update failed after retries: {e}");
    }

    for copyfile in &project.copyfiles {
        if let Err(e) = apply_copyfile(&path, workspace_root, copyfile) {
            success = false;
            message = format!("copyfile {} -> {} failed: {e}", copyfile.source, copyfile.dest);
        }
    }

    if let Some(branch) = saved_branch {
        if let Err(e) = vcs.checkout(&path, &branch, false) {
            success = false;
            message = format!("failed to restore branch '{branch}': {e}");
        }
    }

    ProjectOutcome {
        path: project.path.clone(),
        success,
        message,
    }
}

/// Bridge the async retry helper into the blocking worker thread each
/// project's sync runs on.
fn block_on_retry(
    options: RetryOptions,
    mut op: impl FnMut() -> Result<(), GitError>,
) -> Result<(), GitError> {
    let runtime = tokio::runtime::Handle::current();
    runtime.block_on(retry_with_backoff(&options, || {
        let result = op();
        async { result }
    }))
}

fn apply_copyfile(
    project_path: &Path,
    workspace_root: &Path,
    copyfile: &crate::core::manifest::Copyfile,
) -> std::io::Result<()> {
    let source = project_path.join(&copyfile.source);
    let dest = workspace_root.join(&copyfile.dest);
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(&source, &dest)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest::{Manifest, Project, Remote};
    use crate::vcs::MockDriver;

    fn project(path: &str, revision: &str) -> Project {
        Project {
            path: path.to_string(),
            name: path.to_string(),
            remote_url: "http://h/a".to_string(),
            remote_name: "origin".to_string(),
            revision: revision.to_string(),
            copyfiles: vec![],
            groups: vec![],
        }
    }

    fn manifest_with(projects: Vec<Project>) -> Manifest {
        Manifest {
            remotes: vec![Remote {
                name: "origin".to_string(),
                fetch: "http://h/a".to_string(),
            }],
            projects,
        }
    }

    #[tokio::test]
    async fn fan_out_clones_new_projects() {
        let driver: Arc<dyn VcsDriver> = Arc::new(MockDriver::new());
        let manifest = manifest_with(vec![project("libs/a", "main"), project("libs/b", "main")]);

        let outcomes = fan_out(&driver, Path::new("/ws"), &manifest, None, false, 4).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.success));
    }

    #[tokio::test]
    async fn fan_out_reports_failure_after_retries_exhausted() {
        let mock = MockDriver::new();
        mock.fail_update_n_times(Path::new("/ws/libs/a"), 100);
        let driver: Arc<dyn VcsDriver> = Arc::new(mock);
        let manifest = manifest_with(vec![project("libs/a", "main")]);

        let outcomes = fan_out(&driver, Path::new("/ws"), &manifest, None, false, 1).await;
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].success);
        assert!(outcomes[0].message.contains("update failed"));
    }
}
