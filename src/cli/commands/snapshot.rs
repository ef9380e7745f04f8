//! `snapshot`: record the exact commit each project is currently at into
//! a new manifest branch, so the workspace state can be reproduced later.

use std::path::Path;
use std::sync::Arc;

use tracing::{error, warn};

use crate::cli::output::Output;
use crate::core::group::GroupFilter;
use crate::core::manifest::Manifest;
use crate::settings::Settings;
use crate::vcs::VcsDriver;

/// Check out a new branch `name` in the manifest repository, write a
/// snapshot manifest pinning every project a group filter selects to its
/// current commit, and commit it. Restores the manifest repo's prior
/// branch/commit on any failure along the way.
pub fn run_snapshot(
    vcs: &Arc<dyn VcsDriver>,
    workspace_root: &Path,
    settings: &Settings,
    name: &str,
    filter: &GroupFilter,
) -> anyhow::Result<()> {
    let manifest_repo = settings.manifest_repo_path(workspace_root);

    if vcs.uncommitted_changes(&manifest_repo)? {
        anyhow::bail!("manifest repository has uncommitted changes; commit or stash them first");
    }
    let old_branch = vcs.current_branch(&manifest_repo)?;
    let old_commit = vcs.current_commit(&manifest_repo)?;

    let rollback = |reason: &str| {
        error!("snapshot aborted ({reason}), restoring manifest repository");
        if let Err(e) = vcs.checkout(&manifest_repo, &old_branch, false) {
            warn!("rollback: failed to restore branch '{old_branch}': {e}");
        }
        if let Err(e) = vcs.reset_hard(&manifest_repo, &old_commit) {
            error!("rollback: failed to reset manifest repo to {old_commit}: {e}");
        }
    };

    let manifest_content = match std::fs::read_to_string(settings.manifest_path(workspace_root)) {
        Ok(c) => c,
        Err(e) => {
            return Err(e.into());
        }
    };
    let manifest = match Manifest::parse(&manifest_content) {
        Ok(m) => m.filter_groups(filter),
        Err(e) => return Err(e.into()),
    };

    if let Err(e) = vcs.checkout(&manifest_repo, name, true) {
        rollback("checkout of new snapshot branch failed");
        return Err(e.into());
    }

    let snapshot_file = settings.manifest_path(workspace_root);
    let xml = match manifest.write_snapshot(|path| {
        let project_path = workspace_root.join(path);
        vcs.current_commit(&project_path).map_err(|e| anyhow::anyhow!(e))
    }) {
        Ok(xml) => xml,
        Err(e) => {
            rollback("failed to resolve current commits for snapshot");
            return Err(e.into());
        }
    };

    if let Err(e) = std::fs::write(&snapshot_file, xml) {
        rollback("failed to write snapshot manifest file");
        return Err(e.into());
    }

    if let Err(e) = vcs.commit(&manifest_repo, &format!("snapshot: {name}")) {
        rollback("failed to commit snapshot manifest");
        return Err(e.into());
    }

    if let Err(e) = vcs.checkout(&manifest_repo, &old_branch, false) {
        rollback("failed to restore prior branch after snapshot commit");
        return Err(e.into());
    }

    Output::success(&format!("wrote snapshot '{name}' to {}", snapshot_file.display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcs::MockDriver;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Settings, Arc<MockDriver>) {
        let temp = TempDir::new().unwrap();
        let settings = Settings::default();
        let manifest_repo = settings.manifest_repo_path(temp.path());
        std::fs::create_dir_all(&manifest_repo).unwrap();
        std::fs::write(
            manifest_repo.join("default.xml"),
            r#"
            <manifest>
              <remote name="origin" fetch="http://h/a" />
              <project path="libs/foo" name="foo" revision="main" />
            </manifest>
            "#,
        )
        .unwrap();

        let mock = Arc::new(MockDriver::new());
        mock.seed_repo(&manifest_repo, "main", "c1");
        mock.seed_repo(&temp.path().join("libs/foo"), "main", "deadbeef");

        (temp, settings, mock)
    }

    #[test]
    fn writes_snapshot_file_and_restores_branch() {
        let (temp, settings, mock) = setup();
        let vcs: Arc<dyn VcsDriver> = mock.clone();

        run_snapshot(&vcs, temp.path(), &settings, "release-1", &GroupFilter::parse("")).unwrap();

        let manifest_repo = settings.manifest_repo_path(temp.path());
        let snapshot = std::fs::read_to_string(settings.manifest_path(temp.path())).unwrap();
        assert!(snapshot.contains("revision=\"deadbeef\""));
        assert_eq!(vcs.current_branch(&manifest_repo).unwrap(), "main");
    }

    #[test]
    fn refuses_when_manifest_repo_is_dirty() {
        let (temp, settings, mock) = setup();
        let manifest_repo = settings.manifest_repo_path(temp.path());
        mock.set_dirty(&manifest_repo, true);
        let vcs: Arc<dyn VcsDriver> = mock;

        assert!(
            run_snapshot(&vcs, temp.path(), &settings, "release-1", &GroupFilter::parse(""))
                .is_err()
        );
    }
}
