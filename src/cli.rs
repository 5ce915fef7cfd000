use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "buildtree")]
#[command(about = "Discover Maven/Gradle module trees and list the classes their dependencies provide")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Maven executable (default: $BUILDTREE_MVN, then `mvn`)
    #[arg(long, value_name = "FILE", global = true)]
    pub mvn: Option<PathBuf>,

    /// Gradle executable (default: $BUILDTREE_GRADLE, then `gradle`)
    #[arg(long, value_name = "FILE", global = true)]
    pub gradle: Option<PathBuf>,

    /// Directory for generated helper files
    #[arg(long, value_name = "DIR", global = true)]
    pub home: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Print the module forest of a project
    Tree {
        descriptor: PathBuf,

        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// Resolve and print the dependency archives of one module
    Deps {
        descriptor: PathBuf,

        #[arg(short, long, value_name = "ARTIFACT")]
        module: Option<String>,
    },
    /// List the classes available to one module
    Classes {
        descriptor: PathBuf,

        #[arg(short, long, value_name = "ARTIFACT")]
        module: Option<String>,

        /// Include classes declared in the module's own sources
        #[arg(long)]
        sources: bool,
    },
    /// List the classes stored in one jar or jmod
    Archive { path: PathBuf },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}
