//! Core data model: manifest parsing, group filter algebra, and URL join.

pub mod group;
pub mod manifest;
pub mod url;

pub use group::GroupFilter;
pub use manifest::{Copyfile, Manifest, ManifestError, Project, Remote};
pub use url::url_join;
