//! Category tree: ModPacks -> pack -> category -> item
//!
//! The tree is an arena of nodes addressed by `NodeId`. Parent links are
//! plain ids, used only to find the enclosing pack of a selected leaf.
//! Trees are rebuilt wholesale; ids are only meaningful for the tree that
//! produced them.

use super::record::ModRecord;
use crate::classify::{classify, ClassificationError, ItemIdentity};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Name of the synthetic root node
pub const ROOT_NAME: &str = "ModPacks";

/// Name of the bucket holding records that were not imported from a pack
pub const STANDALONE_NAME: &str = "Standalone (Non-ModPack)";

/// Index of a node inside its `CategoryTree`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Item carried by a leaf node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafItem {
    pub name: String,
    /// Coarse archive category of the record that created the leaf
    pub category: String,
    pub data_file: String,
    /// None for paths outside every known bucket
    pub identity: Option<ItemIdentity>,
}

#[derive(Debug, Clone)]
pub struct CategoryNode {
    pub name: String,
    pub item: Option<LeafItem>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Leaf names already placed under this node
    seen_names: HashSet<String>,
}

impl CategoryNode {
    fn new(name: &str, parent: Option<NodeId>) -> Self {
        Self {
            name: name.to_string(),
            item: None,
            parent,
            children: Vec::new(),
            seen_names: HashSet::new(),
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.item.is_some()
    }
}

/// Position of a node in the fixed four-level hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Pack,
    Category,
    Leaf,
}

/// Result of a tree build: the tree plus the records that could not be placed
#[derive(Debug, Clone)]
pub struct TreeBuild {
    pub tree: CategoryTree,
    pub errors: Vec<ClassificationError>,
}

#[derive(Debug, Clone)]
pub struct CategoryTree {
    nodes: Vec<CategoryNode>,
    standalone: NodeId,
}

impl Default for CategoryTree {
    fn default() -> Self {
        Self::empty()
    }
}

impl CategoryTree {
    /// A tree holding only the root and the (empty) Standalone bucket
    pub fn empty() -> Self {
        let mut tree = Self {
            nodes: vec![CategoryNode::new(ROOT_NAME, None)],
            standalone: NodeId(0),
        };
        tree.standalone = tree.push(tree.root(), STANDALONE_NAME);
        tree
    }

    /// Build the tree from the flat record list, keeping only records that
    /// match every search term (lowercase tokens, see `tokenize_search`).
    pub fn build(records: &[ModRecord], terms: &[String]) -> TreeBuild {
        let mut tree = Self::empty();
        let mut errors = Vec::new();
        let mut packs: HashMap<String, NodeId> = HashMap::new();
        let mut buckets: HashMap<(Option<String>, String), NodeId> = HashMap::new();

        for record in records {
            if !matches_terms(record, terms) {
                continue;
            }

            let pack_key = record.pack_name().map(str::to_string);
            let bucket_key = (pack_key, record.category.clone());

            if let Some(&bucket) = buckets.get(&bucket_key) {
                if tree.nodes[bucket.0].seen_names.contains(&record.name) {
                    continue;
                }
            }

            let identity = match classify(&record.name, &record.full_path) {
                Ok(identity) => identity,
                Err(e) => {
                    warn!("Skipping {}: {}", record.name, e);
                    errors.push(e);
                    continue;
                }
            };

            let pack = match record.pack_name() {
                None => tree.standalone,
                Some(name) => match packs.get(name) {
                    Some(&id) => id,
                    None => {
                        let id = tree.push(tree.root(), name);
                        packs.insert(name.to_string(), id);
                        id
                    }
                },
            };

            let bucket = match buckets.get(&bucket_key) {
                Some(&id) => id,
                None => {
                    let id = tree.push(pack, &record.category);
                    buckets.insert(bucket_key, id);
                    id
                }
            };

            tree.nodes[bucket.0].seen_names.insert(record.name.clone());
            let leaf = tree.push(bucket, &record.name);
            tree.nodes[leaf.0].item = Some(LeafItem {
                name: record.name.clone(),
                category: record.category.clone(),
                data_file: record.data_file.clone(),
                identity,
            });
        }

        debug!(
            "Built category tree: {} nodes, {} leaves, {} errors",
            tree.nodes.len(),
            tree.leaves().count(),
            errors.len()
        );

        TreeBuild { tree, errors }
    }

    fn push(&mut self, parent: NodeId, name: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(CategoryNode::new(name, Some(parent)));
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn standalone(&self) -> NodeId {
        self.standalone
    }

    pub fn node(&self, id: NodeId) -> Option<&CategoryNode> {
        self.nodes.get(id.0)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children()).unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn is_empty(&self) -> bool {
        // Root and Standalone always exist
        self.nodes.len() <= 2 && self.children(self.standalone).is_empty()
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        let node = self.node(id)?;
        if node.is_leaf() {
            return Some(NodeKind::Leaf);
        }
        Some(match self.depth(id) {
            0 => NodeKind::Root,
            1 => NodeKind::Pack,
            _ => NodeKind::Category,
        })
    }

    fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            depth += 1;
            current = parent;
        }
        depth
    }

    /// The pack-level node (direct child of the root) enclosing `id`.
    ///
    /// Returns None for the root itself.
    pub fn owning_pack(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            let parent = self.parent(current)?;
            if parent == self.root() {
                return Some(current);
            }
            current = parent;
        }
    }

    /// Pack name a node belongs to; None for Standalone and the root
    pub fn pack_name_of(&self, id: NodeId) -> Option<&str> {
        let pack = self.owning_pack(id)?;
        if pack == self.standalone {
            return None;
        }
        self.node(pack).map(|n| n.name.as_str())
    }

    /// All leaf nodes, in tree order
    pub fn leaves(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.is_leaf())
            .map(|(i, _)| NodeId(i))
    }

    /// Top-level node of a pack; None is the Standalone bucket, even when a
    /// real pack carries the same display name
    pub fn pack_node(&self, pack: Option<&str>) -> Option<NodeId> {
        match pack {
            None => Some(self.standalone),
            Some(name) => self
                .children(self.root())
                .iter()
                .copied()
                .find(|&id| id != self.standalone && self.nodes[id.0].name == name),
        }
    }

    /// Re-resolve a node by pack and the names below it, e.g.
    /// `find_path(Some("Glam Pack"), &["Body", "Cotton Shirt"])`
    pub fn find_path(&self, pack: Option<&str>, names: &[&str]) -> Option<NodeId> {
        let mut current = self.pack_node(pack)?;
        for name in names {
            current = *self
                .children(current)
                .iter()
                .find(|&&child| self.nodes[child.0].name == *name)?;
        }
        Some(current)
    }

    /// Inverse of `find_path`: owning pack name and the names below it.
    /// None for the root.
    pub fn pack_path_of(&self, id: NodeId) -> Option<(Option<&str>, Vec<&str>)> {
        self.owning_pack(id)?;
        let names = self.path_of(id).split_off(1);
        Some((self.pack_name_of(id), names))
    }

    /// Names from below the root down to `id`
    pub fn path_of(&self, id: NodeId) -> Vec<&str> {
        let mut names = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            names.push(self.nodes[current.0].name.as_str());
            current = parent;
        }
        names.reverse();
        names
    }
}

/// Every term must appear in the record name or its pack name.
pub fn matches_terms(record: &ModRecord, terms: &[String]) -> bool {
    if terms.is_empty() {
        return true;
    }

    let name = record.name.to_lowercase();
    let pack = record.pack_name().map(str::to_lowercase);

    terms.iter().all(|term| {
        let term = term.to_lowercase();
        name.contains(&term) || pack.as_deref().is_some_and(|p| p.contains(&term))
    })
}
