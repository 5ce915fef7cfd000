//! Build-tool neutral project model shared by the Maven and Gradle adapters.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A `group:artifact:version` coordinate. Group and version may be missing
/// when a child descriptor inherits them from its parent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Id {
    pub group: Option<String>,
    pub artifact: String,
    pub version: Option<String>,
}

impl Id {
    pub fn new(group: Option<&str>, artifact: &str, version: Option<&str>) -> Self {
        Self {
            group: group.map(str::to_string),
            artifact: artifact.to_string(),
            version: version.map(str::to_string),
        }
    }

    /// Parses `group;artifact;version`. Empty group or version fields are
    /// treated as missing; the artifact field must be present.
    pub fn from_triple(raw: &str) -> Result<Self> {
        let fields: Vec<&str> = raw.trim().split(';').collect();
        let [group, artifact, version] = fields.as_slice() else {
            bail!(
                "Malformed coordinate {raw:?}: expected 3 ';'-separated fields, found {}",
                fields.len()
            );
        };
        if artifact.trim().is_empty() {
            bail!("Malformed coordinate {raw:?}: artifact is empty");
        }
        Ok(Self::new(
            non_empty(group),
            artifact.trim(),
            non_empty(version),
        ))
    }

    /// Artifacts must be equal; group and version only have to agree when
    /// both sides carry a value.
    pub fn lax_matches(&self, other: &Id) -> bool {
        fn field_ok(a: &Option<String>, b: &Option<String>) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
        }

        self.artifact == other.artifact
            && field_ok(&self.group, &other.group)
            && field_ok(&self.version, &other.version)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.group.as_deref().unwrap_or("?"),
            self.artifact,
            self.version.as_deref().unwrap_or("?")
        )
    }
}

fn non_empty(s: &str) -> Option<&str> {
    let s = s.trim();
    if s.is_empty() { None } else { Some(s) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Maven,
    Gradle,
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolKind::Maven => f.write_str("maven"),
            ToolKind::Gradle => f.write_str("gradle"),
        }
    }
}

/// One project unit of a multi-module build.
#[derive(Debug, Clone, Serialize)]
pub struct Module {
    pub id: Id,
    /// `None` marks a tree root.
    pub parent_id: Option<Id>,
    /// Canonical descriptor path. Maven fills it in after the tree is read.
    pub file: Option<PathBuf>,
    /// Descriptor path as it was handed to the build tool.
    pub file_orig: PathBuf,
    pub final_name: Option<String>,
    pub source_dirs: Vec<PathBuf>,
    pub build_dir: Option<PathBuf>,
    /// `None` until dependencies were resolved at least once.
    pub dep_jars: Option<Vec<PathBuf>>,
    #[serde(skip)]
    pub load_ts: Option<SystemTime>,
    /// Adapter that fetches this module's dependencies.
    pub tool: ToolKind,
}

impl Module {
    pub fn new(id: Id, tool: ToolKind, file_orig: PathBuf) -> Self {
        Self {
            id,
            parent_id: None,
            file: None,
            file_orig,
            final_name: None,
            source_dirs: Vec::new(),
            build_dir: None,
            dep_jars: None,
            load_ts: None,
            tool,
        }
    }

    /// The resolved descriptor, falling back to the one originally supplied.
    pub fn descriptor(&self) -> &Path {
        self.file.as_deref().unwrap_or(&self.file_orig)
    }

    pub fn project_dir(&self) -> Option<&Path> {
        self.descriptor().parent()
    }

    /// Whether `path` lies in one of the source directories or below the
    /// descriptor's directory.
    pub fn owns_path(&self, path: &Path) -> bool {
        self.source_dirs.iter().any(|d| path.starts_with(d))
            || self.project_dir().is_some_and(|d| path.starts_with(d))
    }

    /// Number of path components of the project directory, used to prefer
    /// the innermost owner of a path.
    pub fn depth(&self) -> usize {
        self.project_dir().map_or(0, |d| d.components().count())
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.descriptor().display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lax_matching_treats_missing_fields_as_wildcards() {
        let full = Id::new(Some("com.x"), "core", Some("1.0"));
        let bare = Id::new(None, "core", None);

        assert!(full.lax_matches(&full));
        assert!(full.lax_matches(&bare));
        assert!(bare.lax_matches(&full));
        assert!(!full.lax_matches(&Id::new(None, "api", None)));
    }

    #[test]
    fn lax_matching_rejects_conflicting_present_fields() {
        let a = Id::new(Some("com.x"), "core", Some("1.0"));
        let other_group = Id::new(Some("com.y"), "core", Some("1.0"));
        let other_version = Id::new(Some("com.x"), "core", Some("2.0"));
        let version_only = Id::new(None, "core", Some("2.0"));

        assert!(!a.lax_matches(&other_group));
        assert!(!a.lax_matches(&other_version));
        assert!(!a.lax_matches(&version_only));
    }

    #[test]
    fn from_triple_requires_three_fields() -> Result<()> {
        let id = Id::from_triple("com.x;core;")?;
        assert_eq!(id, Id::new(Some("com.x"), "core", None));

        assert!(Id::from_triple("com.x;core").is_err());
        assert!(Id::from_triple("a;b;c;d").is_err());
        assert!(Id::from_triple("com.x;;1.0").is_err());
        Ok(())
    }

    #[test]
    fn module_owns_paths_below_its_directories() {
        let mut m = Module::new(
            Id::new(None, "core", None),
            ToolKind::Maven,
            PathBuf::from("/work/core/pom.xml"),
        );
        m.source_dirs.push(PathBuf::from("/gen/core/src"));

        assert!(m.owns_path(Path::new("/work/core/src/main/java/A.java")));
        assert!(m.owns_path(Path::new("/gen/core/src/B.java")));
        assert!(!m.owns_path(Path::new("/work/api/pom.xml")));
        assert_eq!(m.depth(), 3);
    }
}
