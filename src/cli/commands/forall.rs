//! `forall`: run a command in every project matching the group filter.

use std::path::Path;
use std::process::Command;

use crate::cli::Output;
use crate::core::group::GroupFilter;
use crate::core::manifest::Manifest;

/// Run `command` (an argv array, never a shell string) in every project
/// `filter` selects, setting the `REPO_*` env-var contract per project.
pub fn run_forall(
    workspace_root: &Path,
    manifest: &Manifest,
    filter: &GroupFilter,
    command: &[String],
    prepend_project_line: bool,
) -> anyhow::Result<bool> {
    let Some((program, args)) = command.split_first() else {
        anyhow::bail!("forall requires a command after -c");
    };

    let mut all_succeeded = true;

    for project in manifest.filter_groups(filter).projects {
        let project_path = workspace_root.join(&project.path);
        if !project_path.is_dir() {
            all_succeeded = false;
            Output::error(&format!(
                "{}: project directory does not exist, aborting",
                project.path
            ));
            break;
        }

        if prepend_project_line {
            println!("project {}", project.path);
        }

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&project_path)
            .env("REPO_PROJECT", &project.name)
            .env("REPO_PATH", &project.path)
            .env_remove("REPO_LREV");

        if project.remote_name.is_empty() {
            cmd.env_remove("REPO_REMOTE");
        } else {
            cmd.env("REPO_REMOTE", &project.remote_name);
        }
        if project.revision.is_empty() {
            cmd.env_remove("REPO_RREV");
        } else {
            cmd.env("REPO_RREV", &project.revision);
        }

        match cmd.status() {
            Ok(status) if status.success() => {}
            Ok(status) => {
                all_succeeded = false;
                Output::error(&format!(
                    "{}: command exited with {}",
                    project.path,
                    status
                        .code()
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "signal".to_string())
                ));
            }
            Err(e) => {
                all_succeeded = false;
                Output::error(&format!("{}: failed to run command: {e}", project.path));
            }
        }
    }

    Ok(all_succeeded)
}
