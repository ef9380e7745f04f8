//! `init`: clone a manifest repository, persist workspace settings, and
//! fetch every project it names.

use std::path::Path;
use std::sync::Arc;

use crate::cli::output::Output;
use crate::core::group::GroupFilter;
use crate::core::manifest::Manifest;
use crate::settings::Settings;
use crate::sync;
use crate::vcs::VcsDriver;

pub struct InitArgs<'a> {
    pub target_dir: &'a Path,
    pub manifest_url: &'a str,
    pub branch: Option<&'a str>,
    pub group_filter: &'a str,
    pub mirror: bool,
    pub threads: usize,
}

/// Initialize a new workspace: clone the manifest repo, write
/// `.frepo/config.ini`, and sync every project the manifest names.
pub async fn run_init(vcs: &Arc<dyn VcsDriver>, args: InitArgs<'_>) -> anyhow::Result<()> {
    if args.target_dir.exists() {
        anyhow::bail!(
            "directory already exists: {}",
            args.target_dir.display()
        );
    }
    std::fs::create_dir_all(args.target_dir)?;

    let settings = Settings {
        manifest_url: Some(args.manifest_url.to_string()),
        mirror: args.mirror,
        group_filter: if args.group_filter.is_empty() {
            None
        } else {
            Some(args.group_filter.to_string())
        },
        ..Settings::default()
    };

    let manifest_repo_path = settings.manifest_repo_path(args.target_dir);
    let revision = args.branch.unwrap_or("main");

    Output::header(&format!(
        "Cloning manifest repository into {}",
        manifest_repo_path.display()
    ));
    if let Err(e) = vcs.clone_repo(args.manifest_url, &manifest_repo_path, "origin", revision, false) {
        let _ = std::fs::remove_dir_all(args.target_dir);
        return Err(e.into());
    }

    if let Err(e) = settings.save(args.target_dir) {
        let _ = std::fs::remove_dir_all(args.target_dir);
        return Err(e.into());
    }

    let manifest_file = settings.manifest_path(args.target_dir);
    let content = std::fs::read_to_string(&manifest_file).map_err(|e| {
        anyhow::anyhow!(
            "failed to read manifest file {}: {e}",
            manifest_file.display()
        )
    })?;
    let filter = GroupFilter::parse(settings.group_filter.as_deref().unwrap_or(""));
    let manifest = Manifest::parse(&content)?.filter_groups(&filter);

    Output::header("Fetching projects");
    let outcomes = sync::fan_out(
        vcs,
        args.target_dir,
        &manifest,
        settings.manifest_url.as_deref(),
        args.mirror,
        args.threads,
    )
    .await;

    for outcome in &outcomes {
        if outcome.success {
            Output::success(&format!("{}: {}", outcome.path, outcome.message));
        } else {
            Output::error(&format!("{}: {}", outcome.path, outcome.message));
        }
    }

    let vcs_for_snapshot = Arc::clone(vcs);
    let target_dir = args.target_dir.to_path_buf();
    let snapshot = manifest.write_snapshot(|path| {
        let project_path = target_dir.join(path);
        vcs_for_snapshot
            .current_commit(&project_path)
            .map_err(|e| anyhow::anyhow!(e))
    })?;
    std::fs::write(Settings::snapshot_path(args.target_dir), snapshot)?;

    if outcomes.iter().all(|o| o.success) {
        println!();
        Output::success("Workspace initialized successfully!");
        Ok(())
    } else {
        anyhow::bail!("some projects failed to sync; see output above")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcs::MockDriver;
    use tempfile::TempDir;

    #[tokio::test]
    async fn init_clones_manifest_and_syncs_projects() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("workspace");

        let mock = MockDriver::new();
        let manifest_repo = target.join("manifest");
        let xml = r#"
            <manifest>
              <remote name="origin" fetch="http://h/a" />
              <project path="libs/foo" name="foo" revision="main" />
            </manifest>
        "#;
        mock.seed_manifest_clone(&manifest_repo, "default.xml", xml);

        let vcs: Arc<dyn VcsDriver> = Arc::new(mock);
        let args = InitArgs {
            target_dir: &target,
            manifest_url: "http://h/manifest",
            branch: Some("main"),
            group_filter: "",
            mirror: false,
            threads: 2,
        };

        run_init(&vcs, args).await.unwrap();
        assert!(Settings::snapshot_path(&target).exists());
        assert!(target.join(".frepo/config.ini").exists());
    }

    #[tokio::test]
    async fn init_refuses_to_overwrite_an_existing_directory() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("workspace");
        std::fs::create_dir_all(&target).unwrap();

        let vcs: Arc<dyn VcsDriver> = Arc::new(MockDriver::new());
        let args = InitArgs {
            target_dir: &target,
            manifest_url: "http://h/manifest",
            branch: None,
            group_filter: "",
            mirror: false,
            threads: 1,
        };

        assert!(run_init(&vcs, args).await.is_err());
    }
}
