use anyhow::{Context, Result, bail};
use buildtree::cli::{Cli, Commands, OutputFormat};
use buildtree::config::resolve_tool_config;
use buildtree::forest::{Forest, NodeId};
use buildtree::logging::init_logging;
use buildtree::model::{Module, ToolKind};
use buildtree::session::{ClassFailure, Session};
use buildtree::tool::Toolchain;
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = resolve_tool_config(&cli)?;
    let mut session = Session::new(Toolchain::from_config(&config));

    match cli.command {
        Commands::Tree { descriptor, format } => {
            visit(&mut session, &descriptor)?;
            let trees = module_trees(session.forest());
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&trees)?),
                OutputFormat::Text => print!("{}", render_text(&trees)),
            }
        }
        Commands::Deps { descriptor, module } => {
            let roots = visit(&mut session, &descriptor)?;
            let node = select_module(&session, &roots, module.as_deref())?;
            let dep_jars = session.ensure_resolved(node)?.to_vec();
            let module = loaded(&session, node)?;
            let output = DepsResult {
                module: module.id.to_string(),
                descriptor: module.descriptor().to_path_buf(),
                dep_jars,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Classes {
            descriptor,
            module,
            sources,
        } => {
            let roots = visit(&mut session, &descriptor)?;
            let node = select_module(&session, &roots, module.as_deref())?;
            let mut listing = session.dependency_classes(node)?;
            if sources {
                let own = session.project_classes(node)?;
                listing.classes.extend(own.classes);
                listing.classes.sort();
                listing.classes.dedup();
                listing.failures.extend(own.failures);
            }
            let output = ClassesResult {
                module: loaded(&session, node)?.id.to_string(),
                classes: listing.classes,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
            report_failures(&listing.failures);
        }
        Commands::Archive { path } => {
            let classes = session.archive_classes(&path)?;
            let output = ArchiveResult {
                archive: path,
                classes,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

fn visit(session: &mut Session, descriptor: &Path) -> Result<Vec<NodeId>> {
    let descriptor = descriptor
        .canonicalize()
        .with_context(|| format!("Descriptor not found: {}", descriptor.display()))?;
    session.visit(&descriptor)
}

/// The module named by `--module`, or the first root of the visited project.
fn select_module(session: &Session, roots: &[NodeId], artifact: Option<&str>) -> Result<NodeId> {
    match artifact {
        Some(artifact) => session
            .find_module(artifact)
            .with_context(|| format!("No module with artifact {artifact}")),
        None => match roots.first() {
            Some(&root) => Ok(root),
            None => bail!("Project has no modules"),
        },
    }
}

fn loaded(session: &Session, node: NodeId) -> Result<&Module> {
    session
        .module(node)
        .context("Selected module is no longer loaded")
}

fn report_failures(failures: &[ClassFailure]) {
    if failures.is_empty() {
        return;
    }
    eprintln!("[buildtree] {} file(s) could not be read:", failures.len());
    for failure in failures {
        eprintln!("  {}: {}", failure.file.display(), failure.error);
    }
}

#[derive(Debug, Serialize)]
struct ModuleSummary {
    id: String,
    tool: ToolKind,
    file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    final_name: Option<String>,
    source_dirs: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    build_dir: Option<PathBuf>,
}

impl From<&Module> for ModuleSummary {
    fn from(m: &Module) -> Self {
        Self {
            id: m.id.to_string(),
            tool: m.tool,
            file: m.descriptor().to_path_buf(),
            final_name: m.final_name.clone(),
            source_dirs: m.source_dirs.clone(),
            build_dir: m.build_dir.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ModuleTree {
    #[serde(flatten)]
    module: ModuleSummary,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    modules: Vec<ModuleTree>,
}

fn module_trees(forest: &Forest<Module>) -> Vec<ModuleTree> {
    fn build(forest: &Forest<Module>, id: NodeId) -> ModuleTree {
        ModuleTree {
            module: ModuleSummary::from(forest.get(id)),
            modules: forest.children(id).iter().map(|&c| build(forest, c)).collect(),
        }
    }

    forest.roots().iter().map(|&root| build(forest, root)).collect()
}

fn render_text(trees: &[ModuleTree]) -> String {
    fn walk(tree: &ModuleTree, depth: usize, out: &mut String) {
        out.push_str(&format!(
            "{}{}  {}\n",
            "  ".repeat(depth),
            tree.module.id,
            tree.module.file.display()
        ));
        for child in &tree.modules {
            walk(child, depth + 1, out);
        }
    }

    let mut out = String::new();
    for tree in trees {
        walk(tree, 0, &mut out);
    }
    out
}

#[derive(Debug, Serialize)]
struct DepsResult {
    module: String,
    descriptor: PathBuf,
    dep_jars: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ClassesResult {
    module: String,
    classes: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ArchiveResult {
    archive: PathBuf,
    classes: Vec<String>,
}
