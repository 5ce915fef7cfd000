//! Generic forest of payload trees.
//!
//! Nodes live in a flat arena and refer to each other by [`NodeId`]. A node
//! owns its children through the arena order; the parent link is a plain index
//! used only for walking upwards, so no reference cycles exist.

use anyhow::{Result, bail};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// Handle to a node. Ids carry the generation of the forest that issued them,
/// so a handle kept across [`Forest::clear`] is recognized as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

#[derive(Debug, Clone)]
struct Node<T> {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    contents: T,
}

/// Result of a [`Forest::map`] transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mapped<U> {
    /// Replace the payload and keep mapping the children.
    Branch(U),
    /// Replace the payload and drop the children.
    Leaf(U),
}

/// Items that could not be attached below any root while building a tree.
///
/// This only happens when the parent relation over the input loops back on
/// itself, so the affected items never become reachable from a root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unattached {
    pub positions: Vec<usize>,
}

impl fmt::Display for Unattached {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "parent relation is cyclic: items at positions {:?} are unreachable from every root",
            self.positions
        )
    }
}

impl std::error::Error for Unattached {}

#[derive(Debug, Clone)]
pub struct Forest<T> {
    nodes: Vec<Node<T>>,
    roots: Vec<NodeId>,
    generation: u32,
}

impl<T> Default for Forest<T> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            roots: Vec::new(),
            generation: 0,
        }
    }
}

struct Built<U> {
    value: U,
    children: Vec<Built<U>>,
}

impl<T> Forest<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assembles trees from a flat pool of items.
    ///
    /// `roots` are positions in `items`. Starting from each root, every
    /// remaining item for which `child_of(parent, item)` holds is attached as
    /// a child, recursively. Each item is attached at most once: the first
    /// parent reached in pre-order claims it. Sibling order is pool order.
    pub fn build<F>(items: Vec<T>, roots: &[usize], child_of: F) -> Result<Self>
    where
        F: Fn(&T, &T) -> bool,
    {
        Self::build_sorted(items, roots, child_of, |_, _| Ordering::Equal)
    }

    /// Like [`Forest::build`], with siblings (roots included) stably ordered by `cmp`.
    pub fn build_sorted<F, S>(items: Vec<T>, roots: &[usize], child_of: F, mut cmp: S) -> Result<Self>
    where
        F: Fn(&T, &T) -> bool,
        S: FnMut(&T, &T) -> Ordering,
    {
        let mut pool: Vec<Option<T>> = items.into_iter().map(Some).collect();
        let mut forest = Forest::new();

        let mut top = Vec::with_capacity(roots.len());
        for &pos in roots {
            let Some(slot) = pool.get_mut(pos) else {
                bail!("root position {pos} is out of range ({} items)", pool.len());
            };
            let Some(item) = slot.take() else {
                bail!("root position {pos} is listed more than once");
            };
            top.push(item);
        }
        top.sort_by(|a, b| cmp(a, b));

        for item in top {
            let root = forest.push(None, item);
            let mut stack = vec![root];
            while let Some(parent) = stack.pop() {
                let mut claimed: Vec<T> = Vec::new();
                for slot in pool.iter_mut() {
                    let is_child = slot
                        .as_ref()
                        .is_some_and(|candidate| child_of(forest.get(parent), candidate));
                    if is_child && let Some(child) = slot.take() {
                        claimed.push(child);
                    }
                }
                claimed.sort_by(|a, b| cmp(a, b));

                let ids: Vec<NodeId> = claimed
                    .into_iter()
                    .map(|child| forest.push(Some(parent), child))
                    .collect();
                stack.extend(ids.into_iter().rev());
            }
        }

        let positions: Vec<usize> = pool
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|_| i))
            .collect();
        if !positions.is_empty() {
            return Err(Unattached { positions }.into());
        }

        Ok(forest)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Whether `id` was issued by this forest since its last [`Forest::clear`].
    pub fn contains(&self, id: NodeId) -> bool {
        id.generation == self.generation && id.index < self.nodes.len()
    }

    pub fn try_get(&self, id: NodeId) -> Option<&T> {
        self.contains(id).then(|| &self.nodes[id.index].contents)
    }

    /// Panics on a stale id; see [`Forest::try_get`].
    pub fn get(&self, id: NodeId) -> &T {
        &self.nodes[id.index].contents
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut T {
        &mut self.nodes[id.index].contents
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index].children
    }

    /// Walks from `id` up to its root, `id` included.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_, T> {
        Ancestors {
            forest: self,
            next: Some(id),
        }
    }

    /// Node ids of every tree, depth first, in pre-order.
    pub fn pre_order(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// First node in pre-order whose payload satisfies `pred`.
    pub fn find<P>(&self, mut pred: P) -> Option<NodeId>
    where
        P: FnMut(&T) -> bool,
    {
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if pred(self.get(id)) {
                return Some(id);
            }
            stack.extend(self.children(id).iter().rev().copied());
        }
        None
    }

    /// Every node whose payload satisfies `pred`, in pre-order.
    pub fn collect<P>(&self, mut pred: P) -> Vec<NodeId>
    where
        P: FnMut(&T) -> bool,
    {
        self.pre_order()
            .into_iter()
            .filter(|&id| pred(self.get(id)))
            .collect()
    }

    /// Reshapes every tree into a new forest.
    ///
    /// `transform` picks the new payload and whether children are mapped too.
    /// A mapped node survives only if `keep(value, surviving_child_count)`
    /// accepts it, so empty branches can be pruned bottom-up.
    pub fn map<U, F, K>(&self, mut transform: F, mut keep: K) -> Forest<U>
    where
        F: FnMut(&T) -> Mapped<U>,
        K: FnMut(&U, usize) -> bool,
    {
        let mut out = Forest::new();
        for &root in &self.roots {
            if let Some(tree) = self.map_subtree(root, &mut transform, &mut keep) {
                out.graft(None, tree);
            }
        }
        out
    }

    fn map_subtree<U, F, K>(&self, id: NodeId, transform: &mut F, keep: &mut K) -> Option<Built<U>>
    where
        F: FnMut(&T) -> Mapped<U>,
        K: FnMut(&U, usize) -> bool,
    {
        let (value, descend) = match transform(self.get(id)) {
            Mapped::Branch(value) => (value, true),
            Mapped::Leaf(value) => (value, false),
        };
        let children: Vec<Built<U>> = if descend {
            self.children(id)
                .iter()
                .filter_map(|&child| self.map_subtree(child, transform, keep))
                .collect()
        } else {
            Vec::new()
        };
        keep(&value, children.len()).then_some(Built { value, children })
    }

    fn graft(&mut self, parent: Option<NodeId>, tree: Built<T>) -> NodeId {
        let id = self.push(parent, tree.value);
        for child in tree.children {
            self.graft(Some(id), child);
        }
        id
    }

    /// Moves every tree of `other` into this forest and returns their new root ids.
    pub fn append(&mut self, other: Forest<T>) -> Vec<NodeId> {
        let offset = self.nodes.len();
        let generation = self.generation;
        let shift = |id: NodeId| NodeId {
            index: id.index + offset,
            generation,
        };

        self.nodes.extend(other.nodes.into_iter().map(|node| Node {
            parent: node.parent.map(shift),
            children: node.children.into_iter().map(shift).collect(),
            contents: node.contents,
        }));
        let added: Vec<NodeId> = other.roots.into_iter().map(shift).collect();
        self.roots.extend(added.iter().copied());
        added
    }

    /// Drops every tree. Ids issued before the call stop resolving.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.roots.clear();
        self.generation = self.generation.wrapping_add(1);
    }

    fn push(&mut self, parent: Option<NodeId>, contents: T) -> NodeId {
        let id = NodeId {
            index: self.nodes.len(),
            generation: self.generation,
        };
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            contents,
        });
        match parent {
            Some(p) => self.nodes[p.index].children.push(id),
            None => self.roots.push(id),
        }
        id
    }
}

pub struct Ancestors<'a, T> {
    forest: &'a Forest<T>,
    next: Option<NodeId>,
}

impl<T> Iterator for Ancestors<'_, T> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.next?;
        self.next = self.forest.parent(id);
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Item {
        name: &'static str,
        parent: Option<&'static str>,
    }

    fn item(name: &'static str, parent: Option<&'static str>) -> Item {
        Item { name, parent }
    }

    fn child_of(parent: &Item, candidate: &Item) -> bool {
        candidate.parent == Some(parent.name)
    }

    fn names(forest: &Forest<Item>, ids: &[NodeId]) -> Vec<&'static str> {
        ids.iter().map(|&id| forest.get(id).name).collect()
    }

    fn sample() -> Vec<Item> {
        vec![
            item("root", None),
            item("b", Some("root")),
            item("a", Some("root")),
            item("b1", Some("b")),
            item("other", None),
            item("a1", Some("a")),
        ]
    }

    #[test]
    fn build_links_every_child_to_its_parent() -> Result<()> {
        let items = sample();
        let forest = Forest::build(items.clone(), &[0, 4], child_of)?;

        assert_eq!(forest.len(), items.len());
        assert_eq!(names(&forest, forest.roots()), vec!["root", "other"]);
        for id in forest.pre_order() {
            match forest.parent(id) {
                Some(p) => assert!(child_of(forest.get(p), forest.get(id))),
                None => assert!(forest.roots().contains(&id)),
            }
        }

        let mut seen: Vec<_> = forest.pre_order().iter().map(|&id| forest.get(id).clone()).collect();
        let mut expected = items;
        seen.sort_by_key(|i| i.name);
        expected.sort_by_key(|i| i.name);
        assert_eq!(seen, expected);
        Ok(())
    }

    #[test]
    fn build_sorted_orders_siblings() -> Result<()> {
        let forest = Forest::build_sorted(sample(), &[4, 0], child_of, |a, b| a.name.cmp(b.name))?;
        assert_eq!(names(&forest, forest.roots()), vec!["other", "root"]);
        let root = forest.roots()[1];
        assert_eq!(names(&forest, forest.children(root)), vec!["a", "b"]);
        Ok(())
    }

    #[test]
    fn build_reports_cycles_instead_of_recursing() {
        let items = vec![
            item("root", None),
            item("x", Some("y")),
            item("y", Some("x")),
        ];
        let err = Forest::build(items, &[0], child_of).unwrap_err();
        let unattached = err.downcast_ref::<Unattached>().unwrap();
        assert_eq!(unattached.positions, vec![1, 2]);
    }

    #[test]
    fn items_without_a_reachable_parent_are_reported() {
        let err = Forest::build(sample(), &[0], child_of).unwrap_err();
        let unattached = err.downcast_ref::<Unattached>().unwrap();
        assert_eq!(unattached.positions, vec![4]);
    }

    #[test]
    fn build_rejects_bad_root_positions() {
        assert!(Forest::build(sample(), &[9], child_of).is_err());
        assert!(Forest::build(sample(), &[0, 0], child_of).is_err());
    }

    #[test]
    fn find_and_collect_walk_in_pre_order() -> Result<()> {
        let forest = Forest::build(sample(), &[0, 4], child_of)?;

        assert_eq!(
            names(&forest, &forest.pre_order()),
            vec!["root", "b", "b1", "a", "a1", "other"]
        );
        let found = forest.find(|i| i.name.len() == 2).unwrap();
        assert_eq!(forest.get(found).name, "b1");
        assert!(forest.find(|i| i.name == "missing").is_none());

        let leaves = forest.collect(|i| i.name.ends_with('1'));
        assert_eq!(names(&forest, &leaves), vec!["b1", "a1"]);
        Ok(())
    }

    #[test]
    fn ancestors_walk_up_to_the_root() -> Result<()> {
        let forest = Forest::build(sample(), &[0, 4], child_of)?;
        let a1 = forest.find(|i| i.name == "a1").unwrap();
        let chain: Vec<_> = forest.ancestors(a1).collect();
        assert_eq!(names(&forest, &chain), vec!["a1", "a", "root"]);
        Ok(())
    }

    #[test]
    fn map_prunes_rejected_and_leaf_branches() -> Result<()> {
        let forest = Forest::build(sample(), &[0, 4], child_of)?;
        let mapped = forest.map(
            |i| match i.name {
                "a" => Mapped::Leaf(i.name.to_uppercase()),
                _ => Mapped::Branch(i.name.to_string()),
            },
            |value, children| value != "other" && (children > 0 || value.len() <= 2),
        );

        assert_eq!(mapped.roots().len(), 1);
        let root = mapped.roots()[0];
        let kids: Vec<&str> = mapped
            .children(root)
            .iter()
            .map(|&id| mapped.get(id).as_str())
            .collect();
        assert_eq!(kids, vec!["b", "A"]);
        let a = mapped.children(root)[1];
        assert!(mapped.children(a).is_empty());
        Ok(())
    }

    #[test]
    fn append_shifts_ids_of_the_moved_forest() -> Result<()> {
        let mut forest = Forest::build(sample(), &[0, 4], child_of)?;
        let extra = Forest::build(vec![item("z", None), item("z1", Some("z"))], &[0], child_of)?;

        let added = forest.append(extra);
        assert_eq!(added.len(), 1);
        assert_eq!(forest.roots().len(), 3);
        let z1 = forest.children(added[0])[0];
        assert_eq!(forest.get(z1).name, "z1");
        assert_eq!(forest.parent(z1), Some(added[0]));

        forest.clear();
        assert!(forest.is_empty());
        assert!(forest.roots().is_empty());
        Ok(())
    }

    #[test]
    fn cleared_forest_rejects_old_ids() -> Result<()> {
        let mut forest = Forest::build(sample(), &[0, 4], child_of)?;
        let old = forest.find(|i| i.name == "b1").unwrap();
        assert_eq!(forest.try_get(old).map(|i| i.name), Some("b1"));

        forest.clear();
        assert!(forest.try_get(old).is_none());

        forest.append(Forest::build(sample(), &[0, 4], child_of)?);
        assert!(!forest.contains(old));
        assert!(forest.try_get(old).is_none());
        let fresh = forest.find(|i| i.name == "b1").unwrap();
        assert!(forest.contains(fresh));
        Ok(())
    }
}
