//! # buildtree
//!
//! Discovers the module trees of Maven and Gradle multi-module projects and
//! lists the classes each module can see through its dependencies.
//!
//! ## Architecture
//!
//! - **forest**: Arena-backed multi-root tree with search, map and append
//! - **model**: Build-tool neutral module and coordinate types
//! - **tool**: The adapter trait, adapter selection and tree assembly
//! - **maven**: Effective-POM and `dependency:build-classpath` adapter
//! - **gradle**: Init-script based adapter with line-oriented records
//! - **exec**: External build tool invocation
//! - **resolve**: Lazy dependency resolution with descriptor mtime checks
//! - **filecache**: Path-keyed cache invalidated by file modification time
//! - **archive**: Class listing for jars, jmods and class directories
//! - **source**: Declared class extraction from Java sources using tree-sitter
//! - **session**: Forest plus caches, and aggregated class listings
//! - **config**: Tool locations from flags, environment and defaults
//! - **logging**: `tracing` subscriber setup

pub mod archive;
pub mod cli;
pub mod config;
pub mod exec;
pub mod filecache;
pub mod forest;
pub mod gradle;
pub mod logging;
pub mod maven;
pub mod model;
pub mod resolve;
pub mod session;
pub mod source;
pub mod tool;

#[cfg(test)]
mod testutil;
