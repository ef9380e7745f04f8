//! `frepo`: a multi-repo workspace orchestrator driven by a declarative
//! XML manifest.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use frepo::cli::commands::forall::run_forall;
use frepo::cli::commands::init::{run_init, InitArgs};
use frepo::cli::commands::list::run_list;
use frepo::cli::commands::snapshot::run_snapshot;
use frepo::cli::commands::sync::{run_sync, SyncArgs};
use frepo::cli::Output;
use frepo::core::group::GroupFilter;
use frepo::core::manifest::Manifest;
use frepo::settings::{find_workspace_root, Settings};
use frepo::telemetry::{init_telemetry, TelemetryConfig};
use frepo::vcs::{GitDriver, VcsDriver};

#[derive(Parser)]
#[command(
    name = "frepo",
    version,
    about = "Multi-repo workspace orchestrator driven by a declarative XML manifest"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clone a manifest repository and fetch every project it names
    Init {
        /// Directory to create the workspace in
        name: String,
        #[arg(short = 'u', long, help = "Manifest repository URL")]
        url: String,
        #[arg(short = 'b', long, help = "Manifest branch to clone")]
        branch: Option<String>,
        #[arg(short = 'g', long, default_value = "", help = "Group filter")]
        group_filter: String,
        #[arg(long, help = "Clone the manifest repository as a mirror")]
        mirror: bool,
        #[arg(short = 'j', long, default_value_t = 4, help = "Parallel fetch threads")]
        threads: usize,
    },

    /// Reconcile the workspace against the manifest repository's current state
    Sync {
        #[arg(short = 'f', long, help = "Allow removing projects with local changes")]
        force: bool,
        #[arg(short = 'b', long, help = "Check out a different manifest branch first")]
        branch: Option<String>,
        #[arg(short = 'g', long, help = "Group filter override")]
        group_filter: Option<String>,
        #[arg(short = 'j', long, default_value_t = 4, help = "Parallel fetch threads")]
        threads: usize,
    },

    /// Pin every project to its current commit in a new manifest branch
    Snapshot {
        /// Name of the snapshot branch and manifest file
        name: String,
        #[arg(short = 'g', long, help = "Group filter")]
        group_filter: Option<String>,
    },

    /// Print the projects a group filter selects
    List {
        #[arg(short = 'g', long, help = "Group filter")]
        group_filter: Option<String>,
    },

    /// Run a command in every project a group filter selects
    Forall {
        #[arg(short = 'g', long, help = "Group filter")]
        group_filter: Option<String>,
        #[arg(short = 'p', long, help = "Print a 'project <path>' line before each run")]
        prepend_project: bool,
        #[arg(
            short = 'c',
            long = "command",
            num_args = 1..,
            trailing_var_arg = true,
            allow_hyphen_values = true,
            help = "Command (and arguments) to run"
        )]
        command: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    let _guard = match init_telemetry(&TelemetryConfig::default()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("failed to initialize logging: {e}");
            std::process::exit(1);
        }
    };

    let cli = Cli::parse();
    let success = match run(cli).await {
        Ok(success) => success,
        Err(e) => {
            Output::error(&format!("{e}"));
            false
        }
    };

    std::process::exit(if success { 0 } else { 1 });
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    match cli.command {
        Commands::Init {
            name,
            url,
            branch,
            group_filter,
            mirror,
            threads,
        } => {
            let target_dir = PathBuf::from(&name);
            let vcs: Arc<dyn VcsDriver> = Arc::new(GitDriver);
            let args = InitArgs {
                target_dir: &target_dir,
                manifest_url: &url,
                branch: branch.as_deref(),
                group_filter: &group_filter,
                mirror,
                threads,
            };
            run_init(&vcs, args).await?;
            Ok(true)
        }

        Commands::Sync {
            force,
            branch,
            group_filter,
            threads,
        } => {
            let workspace_root = find_workspace_root(&std::env::current_dir()?)?;
            let settings = Settings::load(&workspace_root);
            let vcs: Arc<dyn VcsDriver> = Arc::new(GitDriver);
            let args = SyncArgs {
                force,
                branch_override: branch.as_deref(),
                group_filter_override: group_filter.as_deref(),
                threads,
            };
            let all_succeeded = run_sync(&vcs, &workspace_root, &settings, args).await?;
            Ok(all_succeeded)
        }

        Commands::Snapshot { name, group_filter } => {
            let workspace_root = find_workspace_root(&std::env::current_dir()?)?;
            let settings = Settings::load(&workspace_root);
            let vcs: Arc<dyn VcsDriver> = Arc::new(GitDriver);
            let filter_spec = group_filter.or(settings.group_filter.clone()).unwrap_or_default();
            run_snapshot(
                &vcs,
                &workspace_root,
                &settings,
                &name,
                &GroupFilter::parse(&filter_spec),
            )?;
            Ok(true)
        }

        Commands::List { group_filter } => {
            let workspace_root = find_workspace_root(&std::env::current_dir()?)?;
            let settings = Settings::load(&workspace_root);
            let manifest = load_manifest(&workspace_root, &settings)?;
            let filter_spec = group_filter.or(settings.group_filter).unwrap_or_default();
            run_list(&manifest, &GroupFilter::parse(&filter_spec));
            Ok(true)
        }

        Commands::Forall {
            group_filter,
            prepend_project,
            command,
        } => {
            let workspace_root = find_workspace_root(&std::env::current_dir()?)?;
            let settings = Settings::load(&workspace_root);
            let manifest = load_manifest(&workspace_root, &settings)?;
            let filter_spec = group_filter.or(settings.group_filter).unwrap_or_default();
            let all_succeeded = run_forall(
                &workspace_root,
                &manifest,
                &GroupFilter::parse(&filter_spec),
                &command,
                prepend_project,
            )?;
            Ok(all_succeeded)
        }
    }
}

fn load_manifest(workspace_root: &std::path::Path, settings: &Settings) -> anyhow::Result<Manifest> {
    let content = std::fs::read_to_string(settings.manifest_path(workspace_root))?;
    Ok(Manifest::parse(&content)?)
}
