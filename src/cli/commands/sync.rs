//! `sync`: reconcile the workspace against the manifest repository's
//! current state.

use std::path::Path;
use std::sync::Arc;

use crate::cli::output::Output;
use crate::core::group::GroupFilter;
use crate::core::manifest::Manifest;
use crate::settings::Settings;
use crate::sync::{self, SyncInputs};
use crate::vcs::VcsDriver;

pub struct SyncArgs<'a> {
    pub force: bool,
    pub branch_override: Option<&'a str>,
    pub group_filter_override: Option<&'a str>,
    pub threads: usize,
}

/// Run a sync: refresh the manifest repo, classify add/keep/remove, and
/// fan out per-project work, then persist the new manifest snapshot.
pub async fn run_sync(
    vcs: &Arc<dyn VcsDriver>,
    workspace_root: &Path,
    settings: &Settings,
    args: SyncArgs<'_>,
) -> anyhow::Result<bool> {
    let snapshot_path = Settings::snapshot_path(workspace_root);
    let old_manifest = match std::fs::read_to_string(&snapshot_path) {
        Ok(content) => Manifest::parse(&content)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Manifest::empty(),
        Err(e) => return Err(e.into()),
    };

    let group_filter_spec = args
        .group_filter_override
        .map(str::to_string)
        .or_else(|| settings.group_filter.clone())
        .unwrap_or_default();

    let inputs = SyncInputs {
        workspace_root,
        manifest_repo_path: settings.manifest_repo_path(workspace_root),
        manifest_file_path: settings.manifest_path(workspace_root),
        manifest_url: settings.manifest_url.clone(),
        manifest_remote_name: "origin".to_string(),
        force: args.force,
        branch_override: args.branch_override.map(str::to_string),
        group_filter: GroupFilter::parse(&group_filter_spec),
        threads: args.threads,
        mirror: settings.mirror,
    };

    let outcome = sync::sync(vcs, inputs, &old_manifest).await?;

    for removed in &outcome.removed {
        Output::info(&format!("removed {removed}"));
    }
    for result in &outcome.results {
        if result.success {
            Output::success(&format!("{}: {}", result.path, result.message));
        } else {
            Output::error(&format!("{}: {}", result.path, result.message));
        }
    }

    let manifest_content = std::fs::read_to_string(settings.manifest_path(workspace_root))?;
    let new_manifest = Manifest::parse(&manifest_content)?
        .filter_groups(&GroupFilter::parse(&group_filter_spec));
    let vcs_for_snapshot = Arc::clone(vcs);
    let workspace_root_owned = workspace_root.to_path_buf();
    let snapshot = new_manifest.write_snapshot(|path| {
        let project_path = workspace_root_owned.join(path);
        vcs_for_snapshot
            .current_commit(&project_path)
            .map_err(|e| anyhow::anyhow!(e))
    })?;
    std::fs::write(&snapshot_path, snapshot)?;

    Ok(outcome.all_succeeded())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcs::MockDriver;
    use tempfile::TempDir;

    fn settings_for(manifest_url: &str) -> Settings {
        Settings {
            manifest_url: Some(manifest_url.to_string()),
            ..Settings::default()
        }
    }

    #[tokio::test]
    async fn sync_clones_projects_named_in_a_fresh_manifest() {
        let temp = TempDir::new().unwrap();
        let workspace_root = temp.path();
        let settings = settings_for("http://h/manifest");

        let mock = MockDriver::new();
        let manifest_repo = settings.manifest_repo_path(workspace_root);
        mock.seed_repo(&manifest_repo, "main", "c1");
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

        let vcs: Arc<dyn VcsDriver> = Arc::new(mock);
        let args = SyncArgs {
            force: false,
            branch_override: None,
            group_filter_override: None,
            threads: 2,
        };

        let all_succeeded = run_sync(&vcs, workspace_root, &settings, args).await.unwrap();
        assert!(all_succeeded);
        assert!(Settings::snapshot_path(workspace_root).exists());
    }

    #[tokio::test]
    async fn sync_propagates_manifest_dirty_error() {
        let temp = TempDir::new().unwrap();
        let workspace_root = temp.path();
        let settings = settings_for("http://h/manifest");

        let mock = MockDriver::new();
        let manifest_repo = settings.manifest_repo_path(workspace_root);
        mock.seed_repo(&manifest_repo, "main", "c1");
        mock.set_dirty(&manifest_repo, true);

        let vcs: Arc<dyn VcsDriver> = Arc::new(mock);
        let args = SyncArgs {
            force: false,
            branch_override: None,
            group_filter_override: None,
            threads: 1,
        };

        assert!(run_sync(&vcs, workspace_root, &settings, args).await.is_err());
    }
}
