//! Gradle adapter.
//!
//! An init script registers two tasks that print `key=value` records straight
//! from Gradle's project model, one record per project, each starting with an
//! `id` line. Coordinates are `group;path;version` with a Gradle project path
//! such as `:sub:proj`, which becomes the dotted artifact `sub.proj`.

use anyhow::{Context, Result, bail};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

use crate::exec::run_tool;
use crate::forest::Forest;
use crate::model::{Id, Module, ToolKind};
use crate::tool::{AncestorOrder, BuildTool, assemble_forest};

/// Artifact name given to the root project (Gradle path `:`).
pub const ROOT_ARTIFACT: &str = "<root>";

pub const MODULES_TASK: &str = "buildtreeModules";
pub const CLASSPATH_TASK: &str = "buildtreeClasspath";

const INIT_SCRIPT_NAME: &str = "buildtree-init.gradle";

const INIT_SCRIPT: &str = r#"// Generated by buildtree; rewritten when it differs from the bundled copy.
def buildtreeSep = File.pathSeparator

def buildtreeCoordinate = { p -> "${p.group};${p.path};${p.version}" }

def buildtreeClasspath = { p ->
    def files = []
    for (name in ['testRuntimeClasspath', 'runtimeClasspath', 'compileClasspath']) {
        def conf = p.configurations.findByName(name)
        if (conf != null && conf.canBeResolved) {
            files = conf.resolvedConfiguration.lenientConfiguration.files.collect { it.absolutePath }
            break
        }
    }
    files.join(buildtreeSep)
}

allprojects { project ->
    project.tasks.register('buildtreeClasspath') {
        doLast {
            println "dep-jars=${buildtreeClasspath(project)}"
        }
    }
}

rootProject { root ->
    root.tasks.register('buildtreeModules') {
        doLast {
            root.allprojects.each { p ->
                println "id=${buildtreeCoordinate(p)}"
                if (p.parent != null) {
                    println "parent-id=${buildtreeCoordinate(p.parent)}"
                }
                println "file=${p.buildFile.absolutePath}"
                println "build-dir=${p.layout.buildDirectory.get().asFile.absolutePath}"
                def sourceSets = p.extensions.findByName('sourceSets')
                if (sourceSets != null) {
                    def dirs = []
                    sourceSets.each { ss -> dirs.addAll(ss.allJava.srcDirs.collect { it.absolutePath }) }
                    println "source-dirs=${dirs.join(buildtreeSep)}"
                    def jar = p.tasks.findByName('jar')
                    if (jar != null) {
                        println "final-name=${jar.archiveFileName.get()}"
                    }
                }
                println "dep-jars=${buildtreeClasspath(p)}"
            }
        }
    }
}
"#;

#[derive(Debug, Clone)]
pub struct Gradle {
    program: PathBuf,
    home: PathBuf,
}

impl Gradle {
    pub fn new(program: PathBuf, home: PathBuf) -> Self {
        Self { program, home }
    }

    /// Writes the init script into the home directory unless an identical copy is there.
    pub fn ensure_init_script(&self) -> Result<PathBuf> {
        let path = self.home.join(INIT_SCRIPT_NAME);
        if std::fs::read_to_string(&path).is_ok_and(|existing| existing == INIT_SCRIPT) {
            return Ok(path);
        }

        std::fs::create_dir_all(&self.home)
            .with_context(|| format!("Failed to create directory: {}", self.home.display()))?;
        std::fs::write(&path, INIT_SCRIPT)
            .with_context(|| format!("Failed to write Gradle init script: {}", path.display()))?;
        debug!(path = %path.display(), "wrote Gradle init script");
        Ok(path)
    }

    fn run(&self, descriptor: &Path, task: &str) -> Result<String> {
        let script = self.ensure_init_script()?;
        let project_dir = descriptor
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        run_tool(
            &self.program,
            [
                OsStr::new("-p"),
                project_dir.as_os_str(),
                OsStr::new("--init-script"),
                script.as_os_str(),
                OsStr::new("-q"),
                OsStr::new("--console=plain"),
                OsStr::new(task),
            ],
        )
    }
}

impl BuildTool for Gradle {
    fn kind(&self) -> ToolKind {
        ToolKind::Gradle
    }

    fn visit(&self, descriptor: &Path) -> Result<Forest<Module>> {
        let loaded_at = SystemTime::now();
        let output = self.run(descriptor, MODULES_TASK)?;
        let modules = parse_report(&output, descriptor, loaded_at)
            .with_context(|| format!("Failed to read Gradle projects of {}", descriptor.display()))?;
        info!(descriptor = %descriptor.display(), projects = modules.len(), "read Gradle projects");
        assemble_forest(modules, descriptor)
    }

    fn fetch_dep_jars(&self, module: &Module, ancestors: &[Id]) -> Result<Vec<PathBuf>> {
        let task = task_path(module, ancestors, CLASSPATH_TASK);
        let output = self.run(&module.file_orig, &task)?;
        output
            .lines()
            .find_map(|line| line.trim().strip_prefix("dep-jars="))
            .map(split_path_list)
            .with_context(|| format!("Gradle printed no dep-jars line for {}", module.id))
    }

    fn ancestor_order(&self) -> AncestorOrder {
        AncestorOrder::RootFirst
    }
}

/// Parses a Gradle coordinate, turning the project path into a dotted artifact.
pub fn parse_id(raw: &str) -> Result<Id> {
    let mut id = Id::from_triple(raw)?;
    id.artifact = match id.artifact.as_str() {
        ":" => ROOT_ARTIFACT.to_string(),
        path => path.trim_start_matches(':').replace(':', "."),
    };
    if id.version.as_deref() == Some("unspecified") {
        id.version = None;
    }
    Ok(id)
}

/// Builds `:a:b:task` from the root-first ancestor chain and the module itself.
pub fn task_path(module: &Module, ancestors: &[Id], task: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    let mut outer: Option<&str> = None;
    for id in ancestors.iter().chain(std::iter::once(&module.id)) {
        if id.artifact == ROOT_ARTIFACT {
            continue;
        }
        let segment = outer
            .and_then(|o| id.artifact.strip_prefix(o))
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(id.artifact.as_str());
        segments.push(segment);
        outer = Some(id.artifact.as_str());
    }

    if segments.is_empty() {
        format!(":{task}")
    } else {
        format!(":{}:{task}", segments.join(":"))
    }
}

/// Splits Gradle's report into one [`Module`] per `id` record.
///
/// Lines before the first `id`, lines without `=`, and unknown keys are
/// ignored. Records that carry `dep-jars` count as resolved at `loaded_at`.
pub fn parse_report(output: &str, descriptor: &Path, loaded_at: SystemTime) -> Result<Vec<Module>> {
    let mut modules: Vec<Module> = Vec::new();

    for line in output.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();

        if key.trim() == "id" {
            modules.push(Module::new(
                parse_id(value)?,
                ToolKind::Gradle,
                descriptor.to_path_buf(),
            ));
            continue;
        }
        let Some(module) = modules.last_mut() else {
            continue;
        };
        match key.trim() {
            "parent-id" => module.parent_id = Some(parse_id(value)?),
            "file" => module.file = Some(PathBuf::from(value)),
            "final-name" if !value.is_empty() => module.final_name = Some(value.to_string()),
            "source-dirs" => module.source_dirs = split_path_list(value),
            "build-dir" if !value.is_empty() => module.build_dir = Some(PathBuf::from(value)),
            "dep-jars" => {
                module.dep_jars = Some(split_path_list(value));
                module.load_ts = Some(loaded_at);
            }
            _ => {}
        }
    }

    if modules.is_empty() {
        bail!("Gradle output contains no project records");
    }
    Ok(modules)
}

fn split_path_list(value: &str) -> Vec<PathBuf> {
    std::env::split_paths(value.trim())
        .filter(|p| !p.as_os_str().is_empty())
        .collect()
}
