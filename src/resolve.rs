//! Lazy per-module dependency resolution.
//!
//! A module's dependency list is reused until it is missing or some build
//! descriptor on the path from the module up to its root changed after the
//! list was fetched. Inherited build configuration therefore invalidates
//! every module below the edited descriptor.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

use crate::filecache::modified;
use crate::forest::{Forest, NodeId};
use crate::model::{Id, Module};
use crate::tool::{AncestorOrder, BuildTool};

/// Whether the dependency list of `node` has to be fetched (again).
pub fn needs_resolution(forest: &Forest<Module>, node: NodeId) -> bool {
    let module = forest.get(node);
    let Some(load_ts) = module.load_ts.filter(|_| module.dep_jars.is_some()) else {
        return true;
    };

    forest.ancestors(node).any(|id| {
        let ancestor = forest.get(id);
        descriptor_files(ancestor).any(|file| {
            let changed = modified(file).is_some_and(|mtime| mtime > load_ts);
            if changed {
                debug!(module = %module.id, file = %file.display(), "descriptor changed since last resolution");
            }
            changed
        })
    })
}

fn descriptor_files(module: &Module) -> impl Iterator<Item = &Path> {
    module
        .file
        .as_deref()
        .into_iter()
        .chain(std::iter::once(module.file_orig.as_path()))
}

/// Ids on the path between `node` and its root in the order the adapter wants.
pub fn ancestor_ids(forest: &Forest<Module>, node: NodeId, order: AncestorOrder) -> Vec<Id> {
    let chain = forest.ancestors(node).map(|id| forest.get(id).id.clone());
    match order {
        AncestorOrder::ClosestFirst => chain.collect(),
        AncestorOrder::RootFirst => {
            let mut ids: Vec<Id> = chain.skip(1).collect();
            ids.reverse();
            ids
        }
    }
}

/// Makes sure `node`'s dependency list is current and returns it.
///
/// Fetch failures are returned to the caller untouched; the previous list,
/// if any, is kept.
pub fn ensure_resolved<'a>(
    forest: &'a mut Forest<Module>,
    node: NodeId,
    tool: &dyn BuildTool,
) -> Result<&'a [PathBuf]> {
    if !needs_resolution(forest, node) {
        debug!(module = %forest.get(node).id, "dependencies up to date");
        return Ok(forest.get(node).dep_jars.as_deref().unwrap_or_default());
    }

    let module = forest.get(node);
    if module.tool != tool.kind() {
        bail!(
            "Module {} belongs to {}, not {}",
            module.id,
            module.tool,
            tool.kind()
        );
    }

    let chain = ancestor_ids(forest, node, tool.ancestor_order());
    let started = SystemTime::now();
    let jars = tool
        .fetch_dep_jars(module, &chain)
        .with_context(|| format!("Failed to resolve dependencies of {module}"))?;
    debug!(module = %module.id, jars = jars.len(), "resolved dependencies");

    let module = forest.get_mut(node);
    module.dep_jars = Some(jars);
    module.load_ts = Some(started);
    Ok(module.dep_jars.as_deref().unwrap_or_default())
}
