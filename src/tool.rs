//! The capability both build-tool adapters provide, and adapter selection.

use anyhow::{Result, bail};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::ToolConfig;
use crate::forest::{Forest, Unattached};
use crate::gradle::Gradle;
use crate::maven::Maven;
use crate::model::{Id, Module, ToolKind};

/// Order of the ancestor ids handed to [`BuildTool::fetch_dep_jars`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AncestorOrder {
    /// The module itself, then its parent, up to the root.
    ClosestFirst,
    /// The root down to the module's parent; the module itself is left out.
    RootFirst,
}

pub trait BuildTool {
    fn kind(&self) -> ToolKind;

    /// Reads the whole project rooted at `descriptor` into a module forest.
    fn visit(&self, descriptor: &Path) -> Result<Forest<Module>>;

    /// Asks the build tool for the dependency archives of one module.
    fn fetch_dep_jars(&self, module: &Module, ancestors: &[Id]) -> Result<Vec<PathBuf>>;

    fn ancestor_order(&self) -> AncestorOrder {
        AncestorOrder::ClosestFirst
    }
}

/// Picks the adapter for a descriptor from its file name.
pub fn kind_for_descriptor(descriptor: &Path) -> Option<ToolKind> {
    let name = descriptor.file_name()?.to_str()?;
    match name {
        "pom.xml" => Some(ToolKind::Maven),
        "build.gradle" | "build.gradle.kts" | "settings.gradle" | "settings.gradle.kts" => {
            Some(ToolKind::Gradle)
        }
        _ if name.ends_with(".pom") => Some(ToolKind::Maven),
        _ => None,
    }
}

pub struct Toolchain {
    maven: Box<dyn BuildTool>,
    gradle: Box<dyn BuildTool>,
}

impl Toolchain {
    pub fn new(maven: Box<dyn BuildTool>, gradle: Box<dyn BuildTool>) -> Self {
        Self { maven, gradle }
    }

    pub fn from_config(config: &ToolConfig) -> Self {
        Self::new(
            Box::new(Maven::new(config.mvn.clone())),
            Box::new(Gradle::new(config.gradle.clone(), config.home.clone())),
        )
    }

    pub fn for_kind(&self, kind: ToolKind) -> &dyn BuildTool {
        match kind {
            ToolKind::Maven => self.maven.as_ref(),
            ToolKind::Gradle => self.gradle.as_ref(),
        }
    }

    pub fn for_descriptor(&self, descriptor: &Path) -> Result<&dyn BuildTool> {
        match kind_for_descriptor(descriptor) {
            Some(kind) => Ok(self.for_kind(kind)),
            None => bail!("No build tool handles descriptor: {}", descriptor.display()),
        }
    }
}

/// Builds module trees from an adapter's flat module list.
///
/// The first module is always a root. Every other module whose parent id
/// matches no module of the list becomes an additional root.
pub fn assemble_forest(modules: Vec<Module>, descriptor: &Path) -> Result<Forest<Module>> {
    if modules.is_empty() {
        bail!("Build report for {} contains no projects", descriptor.display());
    }

    let roots: Vec<usize> = modules
        .iter()
        .enumerate()
        .filter(|(i, m)| {
            *i == 0
                || m
                    .parent_id
                    .as_ref()
                    .is_none_or(|pid| !modules.iter().any(|other| other.id.lax_matches(pid)))
        })
        .map(|(i, _)| i)
        .collect();
    debug!(
        descriptor = %descriptor.display(),
        modules = modules.len(),
        roots = roots.len(),
        "assembling module forest"
    );

    let labels: Vec<String> = modules.iter().map(|m| m.id.to_string()).collect();
    Forest::build(modules, &roots, |parent, child| {
        child
            .parent_id
            .as_ref()
            .is_some_and(|pid| parent.id.lax_matches(pid))
    })
    .map_err(|e| match e.downcast_ref::<Unattached>() {
        Some(u) => {
            let names: Vec<&str> = u.positions.iter().map(|&i| labels[i].as_str()).collect();
            anyhow::anyhow!(
                "Cyclic parent relation among modules of {}: {}",
                descriptor.display(),
                names.join(", ")
            )
        }
        None => e,
    })
}
