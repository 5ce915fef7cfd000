//! Maven adapter.
//!
//! The effective POM report describes every project of the reactor but not
//! where each POM lives, so descriptor files are recovered afterwards by
//! walking the `<modules>` declarations starting at the visited POM.

use anyhow::{Context, Result, bail};
use roxmltree::{Document, Node};
use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::exec::run_tool;
use crate::forest::Forest;
use crate::model::{Id, Module, ToolKind};
use crate::tool::{BuildTool, assemble_forest};

const CLASSPATH_MARKER: &str = "Dependencies classpath:";
const PROJECT_OPEN: &str = "<project";

#[derive(Debug, Clone)]
pub struct Maven {
    program: PathBuf,
}

impl Maven {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }

    fn effective_pom(&self, descriptor: &Path) -> Result<String> {
        let output = run_tool(
            &self.program,
            [
                OsStr::new("-B"),
                OsStr::new("-f"),
                descriptor.as_os_str(),
                OsStr::new("help:effective-pom"),
            ],
        )?;
        extract_report(&output)
            .map(str::to_string)
            .with_context(|| format!("No effective POM in Maven output for {}", descriptor.display()))
    }
}

impl BuildTool for Maven {
    fn kind(&self) -> ToolKind {
        ToolKind::Maven
    }

    fn visit(&self, descriptor: &Path) -> Result<Forest<Module>> {
        let report = self.effective_pom(descriptor)?;
        let mut modules = parse_effective_pom(&report, descriptor)?;
        info!(descriptor = %descriptor.display(), projects = modules.len(), "read effective POM");
        assign_files(&mut modules, descriptor)?;
        assemble_forest(modules, descriptor)
    }

    fn fetch_dep_jars(&self, module: &Module, _ancestors: &[Id]) -> Result<Vec<PathBuf>> {
        let output = run_tool(
            &self.program,
            [
                OsStr::new("-B"),
                OsStr::new("-f"),
                module.descriptor().as_os_str(),
                OsStr::new("dependency:build-classpath"),
            ],
        )?;
        parse_classpath(&output)
            .with_context(|| format!("Failed to read dependency classpath of {}", module.id))
    }
}

/// Cuts the XML document out of Maven's console output.
pub fn extract_report(output: &str) -> Option<&str> {
    let start = output
        .match_indices(PROJECT_OPEN)
        .map(|(i, _)| i)
        .find(|&i| {
            output[i + PROJECT_OPEN.len()..]
                .starts_with(|c: char| c == 's' || c == '>' || c.is_whitespace())
        })?;
    let wrapped = output[start..].starts_with("<projects");
    let closing = if wrapped { "</projects>" } else { "</project>" };
    let end = output.rfind(closing)? + closing.len();
    (end > start).then(|| &output[start..end])
}

/// Reads one [`Module`] per `<project>` of an effective POM report. Files are
/// left unset; every module remembers `descriptor` as the supplied file.
pub fn parse_effective_pom(xml: &str, descriptor: &Path) -> Result<Vec<Module>> {
    let doc = Document::parse(xml).context("Failed to parse effective POM")?;
    let root = doc.root_element();
    let projects: Vec<Node> = match root.tag_name().name() {
        "projects" => element_children(root, "project").collect(),
        "project" => vec![root],
        other => bail!("Unexpected root element <{other}> in effective POM"),
    };
    if projects.is_empty() {
        bail!("Effective POM for {} contains no projects", descriptor.display());
    }

    projects
        .into_iter()
        .map(|project| project_module(project, descriptor))
        .collect()
}

fn project_module(project: Node, descriptor: &Path) -> Result<Module> {
    let id = coordinate(project).context("Project without artifactId in effective POM")?;
    let mut module = Module::new(id, ToolKind::Maven, descriptor.to_path_buf());

    module.parent_id = child(project, "parent").and_then(|p| {
        let artifact = child_text(p, "artifactId")?;
        Some(Id::new(
            child_text(p, "groupId").as_deref(),
            &artifact,
            child_text(p, "version").as_deref(),
        ))
    });

    if let Some(build) = child(project, "build") {
        module.source_dirs = ["sourceDirectory", "testSourceDirectory"]
            .iter()
            .filter_map(|name| child_text(build, name))
            .map(PathBuf::from)
            .collect();
        module.build_dir = child_text(build, "directory").map(PathBuf::from);

        let packaging = child_text(project, "packaging").unwrap_or_else(|| "jar".to_string());
        if packaging != "pom" {
            let extension = match packaging.as_str() {
                "war" | "ear" | "rar" => packaging.as_str(),
                _ => "jar",
            };
            module.final_name =
                child_text(build, "finalName").map(|name| format!("{name}.{extension}"));
        }
    }

    Ok(module)
}

/// Group and version fall back to the `<parent>` block; unresolved
/// `${...}` values are treated as missing.
fn coordinate(project: Node) -> Option<Id> {
    let parent = child(project, "parent");
    let inherited = |name: &str| {
        child_text(project, name)
            .or_else(|| parent.and_then(|p| child_text(p, name)))
            .filter(|v| !v.contains("${"))
    };
    let artifact = child_text(project, "artifactId")?;
    Some(Id::new(
        inherited("groupId").as_deref(),
        &artifact,
        inherited("version").as_deref(),
    ))
}

/// Child module paths declared in a POM.
fn declared_modules(project: Node) -> Vec<String> {
    child(project, "modules")
        .map(|m| element_children(m, "module").filter_map(text).collect())
        .unwrap_or_default()
}

/// Second pass: walks `<modules>` from `descriptor` and assigns each
/// module's descriptor file by lax coordinate matching.
///
/// Fails when some module still has no file afterwards.
pub fn assign_files(modules: &mut [Module], descriptor: &Path) -> Result<()> {
    let mut pending = vec![descriptor.to_path_buf()];
    let mut visited = HashSet::new();

    while let Some(pom) = pending.pop() {
        let canonical = pom
            .canonicalize()
            .with_context(|| format!("Failed to locate POM: {}", pom.display()))?;
        if !visited.insert(canonical.clone()) {
            continue;
        }

        let text = std::fs::read_to_string(&canonical)
            .with_context(|| format!("Failed to read POM: {}", canonical.display()))?;
        let doc = Document::parse(&text)
            .with_context(|| format!("Failed to parse POM: {}", canonical.display()))?;
        let project = doc.root_element();
        let id = coordinate(project)
            .with_context(|| format!("POM without artifactId: {}", canonical.display()))?;

        let slot = modules
            .iter()
            .position(|m| m.file.is_none() && m.id.lax_matches(&id))
            .or_else(|| modules.iter().position(|m| m.id.lax_matches(&id)));
        match slot {
            Some(i) => {
                debug!(module = %modules[i].id, file = %canonical.display(), "located module descriptor");
                modules[i].file = Some(canonical.clone());
            }
            None => warn!(id = %id, file = %canonical.display(), "POM matches no project of the effective POM"),
        }

        let dir = canonical.parent().unwrap_or(Path::new("."));
        for relative in declared_modules(project).iter().rev() {
            let path = dir.join(relative.trim());
            pending.push(if path.is_dir() { path.join("pom.xml") } else { path });
        }
    }

    let missing: Vec<String> = modules
        .iter()
        .filter(|m| m.file.is_none())
        .map(|m| m.id.to_string())
        .collect();
    if !missing.is_empty() {
        bail!(
            "Could not locate the POM of module(s) {} below {}",
            missing.join(", "),
            descriptor.display()
        );
    }
    Ok(())
}

/// Reads the classpath line printed by `dependency:build-classpath`.
pub fn parse_classpath(output: &str) -> Result<Vec<PathBuf>> {
    let mut lines = output.lines();
    if !lines.by_ref().any(|l| l.contains(CLASSPATH_MARKER)) {
        bail!("Maven output has no '{CLASSPATH_MARKER}' line");
    }
    let line = lines.next().unwrap_or("").trim();
    if line.starts_with('[') {
        return Ok(Vec::new());
    }
    Ok(std::env::split_paths(line)
        .filter(|p| !p.as_os_str().is_empty())
        .collect())
}

fn element_children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(move |c| c.is_element() && c.tag_name().name() == name)
}

fn child<'a, 'input: 'a>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
}

fn child_text(node: Node, name: &str) -> Option<String> {
    child(node, name).and_then(text)
}

fn text(node: Node) -> Option<String> {
    node.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
