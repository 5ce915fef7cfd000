use anyhow::Result;
use std::env;
use std::path::PathBuf;

use crate::cli::Cli;

pub const MVN_ENV: &str = "BUILDTREE_MVN";
pub const GRADLE_ENV: &str = "BUILDTREE_GRADLE";
pub const HOME_ENV: &str = "BUILDTREE_HOME";

#[derive(Debug, Clone)]
pub struct ToolConfig {
    pub mvn: PathBuf,
    pub gradle: PathBuf,
    /// Holds generated helper files such as the Gradle init script.
    pub home: PathBuf,
}

pub fn resolve_tool_config(cli: &Cli) -> Result<ToolConfig> {
    let home = match pick(cli.home.clone(), env::var_os(HOME_ENV).map(PathBuf::from)) {
        Some(p) => p,
        None => buildtree_home()?,
    };

    Ok(ToolConfig {
        mvn: pick(cli.mvn.clone(), env::var_os(MVN_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("mvn")),
        gradle: pick(cli.gradle.clone(), env::var_os(GRADLE_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("gradle")),
        home,
    })
}

/// A command-line value wins over the environment; empty values count as unset.
fn pick(flag: Option<PathBuf>, from_env: Option<PathBuf>) -> Option<PathBuf> {
    flag.into_iter()
        .chain(from_env)
        .find(|p| !p.as_os_str().is_empty())
}

fn buildtree_home() -> Result<PathBuf> {
    let base = dirs::data_local_dir()
        .or_else(dirs::cache_dir)
        .or_else(dirs::home_dir)
        .ok_or_else(|| anyhow::anyhow!("Failed to resolve data directory"))?;
    Ok(base.join("buildtree"))
}
