//! Library surface for `frepo`: a multi-repo workspace orchestrator
//! driven by a declarative XML manifest.

pub mod cli;
pub mod core;
pub mod settings;
pub mod sync;
pub mod telemetry;
pub mod util;
pub mod vcs;

pub use core::{Manifest, ManifestError};
pub use settings::Settings;
