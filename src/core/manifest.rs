//! Manifest parsing, validation, and derivation
//!
//! The manifest file is an XML document describing the remotes and
//! projects that make up a workspace. This module owns every string it
//! produces: a `Manifest` has no borrowed lifetime and no retained
//! document, so copies, subtractions, and filtered views are plain
//! value clones.

use std::fmt::Write as _;

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::core::group::GroupFilter;

/// Errors that can occur when loading or validating a manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse manifest XML: {0}")]
    Parse(#[from] quick_xml::DeError),

    #[error("remote has no name")]
    RemoteMissingName,

    #[error("remote '{0}' has no fetch URL")]
    RemoteMissingFetch(String),

    #[error("project at index {0} has no path")]
    ProjectMissingPath(usize),

    #[error("project '{0}' has no name")]
    ProjectMissingName(String),

    #[error("project '{path}' references unknown remote '{remote}'")]
    UnknownRemote { path: String, remote: String },

    #[error("project '{0}' resolves to an empty revision")]
    ProjectMissingRevision(String),

    #[error("copyfile on project '{0}' is missing src or dest")]
    CopyfileIncomplete(String),

    #[error("failed to look up current commit for '{path}': {source}")]
    SnapshotLookup {
        path: String,
        #[source]
        source: anyhow::Error,
    },
}

/// A named remote base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    pub name: String,
    pub fetch: String,
}

/// A file to copy out of a project's working tree after sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Copyfile {
    pub source: String,
    pub dest: String,
}

/// A single project entry, fully resolved (no more default fallbacks to apply).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub path: String,
    pub name: String,
    pub remote_url: String,
    pub remote_name: String,
    pub revision: String,
    pub copyfiles: Vec<Copyfile>,
    pub groups: Vec<String>,
}

/// A parsed, fully-resolved manifest: owned remotes and projects, no
/// lifetime tying it back to an XML document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub remotes: Vec<Remote>,
    pub projects: Vec<Project>,
}

impl Manifest {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn remote(&self, name: &str) -> Option<&Remote> {
        self.remotes.iter().find(|r| r.name == name)
    }

    /// `a.subtract(b)`: projects of `a` whose path is absent from `b`,
    /// preserving `a`'s order. Remotes come from `a`.
    pub fn subtract(&self, other: &Manifest) -> Manifest {
        let projects = self
            .projects
            .iter()
            .filter(|p| !other.projects.iter().any(|o| o.path == p.path))
            .cloned()
            .collect();
        Manifest {
            remotes: self.remotes.clone(),
            projects,
        }
    }

    /// Projects included by `filter`, per the group filter algebra.
    pub fn filter_groups(&self, filter: &GroupFilter) -> Manifest {
        let projects = self
            .projects
            .iter()
            .filter(|p| filter.includes(&p.groups))
            .cloned()
            .collect();
        Manifest {
            remotes: self.remotes.clone(),
            projects,
        }
    }

    /// Parse a manifest document, applying `<default>` fallback
    /// resolution and validating every invariant from the data model.
    pub fn parse(xml: &str) -> Result<Manifest, ManifestError> {
        let doc: XmlDocument = quick_xml::de::from_str(xml)?;
        warn_unknown_project_children(xml);
        doc.manifest.into_manifest()
    }

    /// Serialize to the on-disk snapshot XML format, replacing each
    /// project's `revision` with its current commit as reported by
    /// `current_commit`.
    pub fn write_snapshot(
        &self,
        mut current_commit: impl FnMut(&str) -> anyhow::Result<String>,
    ) -> Result<String, ManifestError> {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.push_str("<manifest>\n");

        for remote in &self.remotes {
            let _ = writeln!(
                out,
                "  <remote name=\"{}\" fetch=\"{}\" />",
                xml_escape(&remote.name),
                xml_escape(&remote.fetch)
            );
        }

        for project in &self.projects {
            let commit =
                current_commit(&project.path).map_err(|source| ManifestError::SnapshotLookup {
                    path: project.path.clone(),
                    source,
                })?;

            let _ = write!(
                out,
                "  <project path=\"{}\" name=\"{}\" remote=\"{}\" revision=\"{}\"",
                xml_escape(&project.path),
                xml_escape(&project.name),
                xml_escape(&project.remote_name),
                xml_escape(&commit)
            );
            if !project.groups.is_empty() {
                let _ = write!(out, " groups=\"{}\"", xml_escape(&project.groups.join(",")));
            }

            if project.copyfiles.is_empty() {
                out.push_str(" />\n");
            } else {
                out.push_str(">\n");
                for cf in &project.copyfiles {
                    let _ = writeln!(
                        out,
                        "    <copyfile src=\"{}\" dest=\"{}\" />",
                        xml_escape(&cf.source),
                        xml_escape(&cf.dest)
                    );
                }
                out.push_str("  </project>\n");
            }
        }

        out.push_str("</manifest>\n");
        Ok(out)
    }
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[derive(Debug, Deserialize)]
struct XmlDocument {
    manifest: XmlManifest,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct XmlManifest {
    #[serde(rename = "remote", default)]
    remotes: Vec<XmlRemote>,
    #[serde(rename = "default")]
    default: Option<XmlDefault>,
    #[serde(rename = "project", default)]
    projects: Vec<XmlProject>,
}

#[derive(Debug, Deserialize)]
struct XmlRemote {
    #[serde(rename = "@name")]
    name: Option<String>,
    #[serde(rename = "@fetch")]
    fetch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XmlDefault {
    #[serde(rename = "@revision")]
    revision: Option<String>,
    #[serde(rename = "@remote")]
    remote: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XmlProject {
    #[serde(rename = "@path")]
    path: Option<String>,
    #[serde(rename = "@name")]
    name: Option<String>,
    #[serde(rename = "@remote")]
    remote: Option<String>,
    #[serde(rename = "@revision")]
    revision: Option<String>,
    #[serde(rename = "@groups")]
    groups: Option<String>,
    #[serde(rename = "copyfile", default)]
    copyfiles: Vec<XmlCopyfile>,
}

#[derive(Debug, Deserialize)]
struct XmlCopyfile {
    #[serde(rename = "@src")]
    src: Option<String>,
    #[serde(rename = "@dest")]
    dest: Option<String>,
}

/// Walk the raw document and log a warning for any `<project>` child tag
/// other than `<copyfile>` — these are silently dropped by `XmlProject`'s
/// serde deserialization, so this is the only place they're surfaced.
fn warn_unknown_project_children(xml: &str) {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut depth: i32 = 0;
    let mut project_depth: Option<i32> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                warn_if_unknown_child(&name, depth, project_depth);
                if name == "project" {
                    project_depth = Some(depth);
                }
                depth += 1;
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                warn_if_unknown_child(&name, depth, project_depth);
            }
            Ok(Event::End(_)) => {
                depth -= 1;
                if project_depth == Some(depth) {
                    project_depth = None;
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
}

fn warn_if_unknown_child(name: &str, depth: i32, project_depth: Option<i32>) {
    if project_depth == Some(depth - 1) && name != "copyfile" {
        warn!("unknown <project> sub-tag '<{name}>' ignored");
    }
}

impl XmlManifest {
    fn into_manifest(self) -> Result<Manifest, ManifestError> {
        let mut remotes = Vec::with_capacity(self.remotes.len());
        for r in self.remotes {
            let name = r.name.ok_or(ManifestError::RemoteMissingName)?;
            let fetch = r
                .fetch
                .ok_or_else(|| ManifestError::RemoteMissingFetch(name.clone()))?;
            remotes.push(Remote { name, fetch });
        }

        let default_remote = self
            .default
            .as_ref()
            .and_then(|d| d.remote.clone())
            .or_else(|| remotes.first().map(|r| r.name.clone()));
        let default_revision = self.default.as_ref().and_then(|d| d.revision.clone());

        let mut projects = Vec::with_capacity(self.projects.len());
        for (index, p) in self.projects.into_iter().enumerate() {
            let path = p.path.ok_or(ManifestError::ProjectMissingPath(index))?;
            let name = p
                .name
                .ok_or_else(|| ManifestError::ProjectMissingName(path.clone()))?;

            let remote_name = p
                .remote
                .or_else(|| default_remote.clone())
                .ok_or_else(|| ManifestError::UnknownRemote {
                    path: path.clone(),
                    remote: String::new(),
                })?;
            let remote = remotes.iter().find(|r| r.name == remote_name).ok_or_else(|| {
                ManifestError::UnknownRemote {
                    path: path.clone(),
                    remote: remote_name.clone(),
                }
            })?;

            let revision = p
                .revision
                .or_else(|| default_revision.clone())
                .ok_or_else(|| ManifestError::ProjectMissingRevision(path.clone()))?;
            if revision.is_empty() {
                return Err(ManifestError::ProjectMissingRevision(path));
            }

            let groups = match p.groups {
                Some(g) if !g.is_empty() => g.split(',').map(|s| s.trim().to_string()).collect(),
                _ => Vec::new(),
            };

            let mut copyfiles = Vec::with_capacity(p.copyfiles.len());
            for cf in p.copyfiles {
                let (Some(source), Some(dest)) = (cf.src, cf.dest) else {
                    return Err(ManifestError::CopyfileIncomplete(path.clone()));
                };
                copyfiles.push(Copyfile { source, dest });
            }

            projects.push(Project {
                path,
                name,
                remote_url: remote.fetch.clone(),
                remote_name: remote.name.clone(),
                revision,
                copyfiles,
                groups,
            });
        }

        Ok(Manifest { remotes, projects })
    }
}
