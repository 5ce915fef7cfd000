//! Session state: the visited module forest plus the archive and source
//! class caches. Nothing here is global; a caller owns one `Session` and
//! passes it around.

use anyhow::{Context, Result};
use ignore::WalkBuilder;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::archive::{list_classes, list_directory_classes};
use crate::filecache::FileCache;
use crate::forest::{Forest, NodeId};
use crate::model::Module;
use crate::resolve;
use crate::source::list_source_classes;
use crate::tool::Toolchain;

/// A file whose classes could not be listed.
#[derive(Debug, Clone, Serialize)]
pub struct ClassFailure {
    pub file: PathBuf,
    pub error: String,
}

/// Classes collected over many files. Files that failed are reported in
/// `failures` instead of aborting the whole listing.
#[derive(Debug, Default, Serialize)]
pub struct ClassListing {
    pub classes: Vec<String>,
    pub failures: Vec<ClassFailure>,
}

impl ClassListing {
    fn fail(&mut self, file: PathBuf, error: anyhow::Error) {
        let error = format!("{error:#}");
        warn!(file = %file.display(), error = %error, "failed to list classes");
        self.failures.push(ClassFailure { file, error });
    }

    fn finish(mut self) -> Self {
        self.classes.sort();
        self.classes.dedup();
        self
    }
}

pub struct Session {
    toolchain: Toolchain,
    forest: Forest<Module>,
    archive_cache: FileCache<Vec<String>>,
    source_cache: FileCache<Vec<String>>,
}

impl Session {
    pub fn new(toolchain: Toolchain) -> Self {
        Self {
            toolchain,
            forest: Forest::new(),
            archive_cache: FileCache::new("archive-classes"),
            source_cache: FileCache::new("source-classes"),
        }
    }

    pub fn forest(&self) -> &Forest<Module> {
        &self.forest
    }

    /// `None` once the project holding `node` was forgotten.
    pub fn module(&self, node: NodeId) -> Option<&Module> {
        self.forest.try_get(node)
    }

    fn live(&self, node: NodeId) -> Result<&Module> {
        self.module(node)
            .context("Module handle refers to a forgotten project")
    }

    /// Reads the project behind `descriptor` and adds its trees to the forest.
    pub fn visit(&mut self, descriptor: &Path) -> Result<Vec<NodeId>> {
        let tool = self.toolchain.for_descriptor(descriptor)?;
        let trees = tool
            .visit(descriptor)
            .with_context(|| format!("Failed to read project: {}", descriptor.display()))?;
        info!(
            descriptor = %descriptor.display(),
            tool = %tool.kind(),
            modules = trees.len(),
            "visited project"
        );
        Ok(self.forest.append(trees))
    }

    pub fn find_module(&self, artifact: &str) -> Option<NodeId> {
        self.forest.find(|m| m.id.artifact == artifact)
    }

    /// The innermost module whose directories contain `path`.
    pub fn module_for_path(&self, path: &Path) -> Option<NodeId> {
        self.forest
            .collect(|m| m.owns_path(path))
            .into_iter()
            .max_by_key(|&id| self.forest.get(id).depth())
    }

    pub fn ensure_resolved(&mut self, node: NodeId) -> Result<&[PathBuf]> {
        let tool = self.toolchain.for_kind(self.live(node)?.tool);
        resolve::ensure_resolved(&mut self.forest, node, tool)
    }

    /// Classes of a dependency archive, or of a class directory on the classpath.
    ///
    /// Archives are cached by mtime. Directories are walked on every call:
    /// their own mtime does not change when a nested class file does.
    pub fn archive_classes(&mut self, archive: &Path) -> Result<Vec<String>> {
        if archive.is_dir() {
            return list_directory_classes(archive);
        }
        self.archive_cache.get_or_load(archive, list_classes).cloned()
    }

    pub fn source_classes(&mut self, file: &Path) -> Result<&[String]> {
        self.source_cache
            .get_or_load(file, list_source_classes)
            .map(Vec::as_slice)
    }

    /// Every class found in `node`'s dependencies.
    ///
    /// Resolving the dependency list is fatal on failure; unreadable
    /// archives are collected in [`ClassListing::failures`].
    pub fn dependency_classes(&mut self, node: NodeId) -> Result<ClassListing> {
        let jars = self.ensure_resolved(node)?.to_vec();
        let mut listing = ClassListing::default();
        for jar in jars {
            match self.archive_classes(&jar) {
                Ok(classes) => listing.classes.extend(classes),
                Err(e) => listing.fail(jar, e),
            }
        }
        Ok(listing.finish())
    }

    /// Every class declared in the `.java` files of `node`'s source directories.
    pub fn project_classes(&mut self, node: NodeId) -> Result<ClassListing> {
        let dirs = self.live(node)?.source_dirs.clone();
        let mut listing = ClassListing::default();

        for dir in dirs.iter().filter(|d| d.is_dir()) {
            let walker = WalkBuilder::new(dir)
                .hidden(false)
                .ignore(false)
                .parents(false)
                .git_ignore(false)
                .git_global(false)
                .git_exclude(false)
                .build();
            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        listing.fail(dir.clone(), e.into());
                        continue;
                    }
                };
                let path = entry.path();
                if path.extension().is_none_or(|e| e != "java") || !path.is_file() {
                    continue;
                }
                match self.source_classes(path) {
                    Ok(classes) => listing.classes.extend_from_slice(classes),
                    Err(e) => listing.fail(path.to_path_buf(), e),
                }
            }
        }
        Ok(listing.finish())
    }

    /// Drops every visited project.
    pub fn forget(&mut self) {
        self.forest.clear();
    }

    pub fn flush_caches(&mut self) {
        self.archive_cache.flush();
        self.source_cache.flush();
    }

    pub fn cached_files(&self) -> usize {
        self.archive_cache.len() + self.source_cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Id, ToolKind};
    use crate::testutil::{write_file, write_jar};
    use crate::tool::{BuildTool, assemble_forest};
    use anyhow::bail;

    struct StaticTool {
        kind: ToolKind,
        modules: Vec<Module>,
        jars: Vec<PathBuf>,
    }

    impl BuildTool for StaticTool {
        fn kind(&self) -> ToolKind {
            self.kind
        }

        fn visit(&self, descriptor: &Path) -> Result<Forest<Module>> {
            assemble_forest(self.modules.clone(), descriptor)
        }

        fn fetch_dep_jars(&self, _module: &Module, _ancestors: &[Id]) -> Result<Vec<PathBuf>> {
            Ok(self.jars.clone())
        }
    }

    struct NoTool(ToolKind);

    impl BuildTool for NoTool {
        fn kind(&self) -> ToolKind {
            self.0
        }

        fn visit(&self, descriptor: &Path) -> Result<Forest<Module>> {
            bail!("unexpected visit of {}", descriptor.display())
        }

        fn fetch_dep_jars(&self, _module: &Module, _ancestors: &[Id]) -> Result<Vec<PathBuf>> {
            bail!("unexpected fetch")
        }
    }

    fn maven_session(base: &Path, jars: Vec<PathBuf>) -> Session {
        let mut root = Module::new(Id::new(Some("g"), "app", Some("1")), ToolKind::Maven, base.join("pom.xml"));
        root.file = Some(base.join("pom.xml"));
        let mut core = Module::new(Id::new(Some("g"), "core", Some("1")), ToolKind::Maven, base.join("pom.xml"));
        core.file = Some(base.join("core/pom.xml"));
        core.parent_id = Some(root.id.clone());
        core.source_dirs = vec![base.join("core/src/main/java")];

        Session::new(Toolchain::new(
            Box::new(StaticTool {
                kind: ToolKind::Maven,
                modules: vec![root, core],
                jars,
            }),
            Box::new(NoTool(ToolKind::Gradle)),
        ))
    }

    #[test]
    fn visit_selects_adapter_by_descriptor_name() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut session = maven_session(dir.path(), Vec::new());

        let roots = session.visit(&dir.path().join("pom.xml"))?;
        assert_eq!(roots.len(), 1);
        assert_eq!(session.forest().len(), 2);

        let err = session.visit(Path::new("/p/Makefile")).unwrap_err();
        assert!(err.to_string().contains("No build tool"));
        assert!(session.visit(Path::new("/p/build.gradle")).is_err());

        session.forget();
        assert!(session.forest().is_empty());
        Ok(())
    }

    #[test]
    fn module_lookup_by_artifact_and_path() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut session = maven_session(dir.path(), Vec::new());
        session.visit(&dir.path().join("pom.xml"))?;

        let core = session.find_module("core").unwrap();
        let app = session.find_module("app").unwrap();
        let file = dir.path().join("core/src/main/java/a/B.java");
        assert_eq!(session.module_for_path(&file), Some(core));
        assert_eq!(session.module_for_path(&dir.path().join("README.md")), Some(app));
        assert_eq!(session.module_for_path(Path::new("/elsewhere/x.java")), None);
        Ok(())
    }

    #[test]
    fn dependency_classes_collect_archive_failures() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let good = dir.path().join("repo/good.jar");
        let other = dir.path().join("repo/other.jar");
        let broken = dir.path().join("repo/broken.jar");
        let missing = dir.path().join("repo/missing.jar");
        write_jar(&good, &["a/A.class", "a/A$1.class"])?;
        write_jar(&other, &["b/B.class", "a/A.class"])?;
        write_file(&broken, "garbage")?;

        let mut session = maven_session(
            dir.path(),
            vec![good.clone(), broken.clone(), missing.clone(), other.clone()],
        );
        session.visit(&dir.path().join("pom.xml"))?;
        let core = session.find_module("core").unwrap();

        let listing = session.dependency_classes(core)?;
        assert_eq!(listing.classes, vec!["a.A", "b.B"]);
        let failed: Vec<&Path> = listing.failures.iter().map(|f| f.file.as_path()).collect();
        assert_eq!(failed, vec![broken.as_path(), missing.as_path()]);
        assert_eq!(session.cached_files(), 2);

        session.flush_caches();
        assert_eq!(session.cached_files(), 0);
        Ok(())
    }

    #[test]
    fn project_classes_read_module_sources() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let src = dir.path().join("core/src/main/java");
        write_file(&src.join("a/Service.java"), "package a;\npublic class Service { static class Impl {} }\n")?;
        write_file(&src.join("a/notes.txt"), "not java")?;

        let mut session = maven_session(dir.path(), Vec::new());
        session.visit(&dir.path().join("pom.xml"))?;
        let core = session.find_module("core").unwrap();

        let listing = session.project_classes(core)?;
        assert_eq!(listing.classes, vec!["a.Service", "a.Service.Impl"]);
        assert!(listing.failures.is_empty());
        assert_eq!(session.cached_files(), 1);
        Ok(())
    }

    #[test]
    fn class_directories_are_listed_fresh() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let classes = dir.path().join("core/target/classes");
        write_file(&classes.join("com/foo/A.class"), "")?;
        let mut session = maven_session(dir.path(), vec![classes.clone()]);
        session.visit(&dir.path().join("pom.xml"))?;
        let core = session.find_module("core").unwrap();

        assert_eq!(session.dependency_classes(core)?.classes, vec!["com.foo.A"]);

        write_file(&classes.join("com/foo/B.class"), "")?;
        assert_eq!(session.archive_classes(&classes)?, vec!["com.foo.A", "com.foo.B"]);
        assert_eq!(session.dependency_classes(core)?.classes, vec!["com.foo.A", "com.foo.B"]);
        Ok(())
    }

    #[test]
    fn project_classes_include_git_ignored_sources() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::create_dir_all(dir.path().join(".git"))?;
        write_file(&dir.path().join(".gitignore"), "generated/\n")?;
        let src = dir.path().join("core/src/main/java");
        write_file(&src.join("a/A.java"), "package a;\nclass A {}\n")?;
        write_file(&src.join("generated/G.java"), "package generated;\nclass G {}\n")?;

        let mut session = maven_session(dir.path(), Vec::new());
        session.visit(&dir.path().join("pom.xml"))?;
        let core = session.find_module("core").unwrap();

        assert_eq!(session.project_classes(core)?.classes, vec!["a.A", "generated.G"]);
        Ok(())
    }

    #[test]
    fn forgotten_module_handles_are_rejected() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut session = maven_session(dir.path(), Vec::new());
        session.visit(&dir.path().join("pom.xml"))?;
        let core = session.find_module("core").unwrap();
        assert!(session.module(core).is_some());

        session.forget();
        assert!(session.module(core).is_none());
        let err = session.dependency_classes(core).unwrap_err();
        assert!(err.to_string().contains("forgotten"));

        session.visit(&dir.path().join("pom.xml"))?;
        assert!(session.module(core).is_none());
        assert!(session.project_classes(core).is_err());
        assert!(session.find_module("core").is_some());
        Ok(())
    }
}
