//! Index-based storage for the tree while a scan is running.

use std::path::{Path, PathBuf};

use compact_str::CompactString;

use boxfile_core::{DirTotals, ScanNode};

/// Index into the arena. The scan root is always `NodeId::ROOT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(u32);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
struct ArenaNode {
    name: CompactString,
    path: PathBuf,
    depth: u32,
    totals: DirTotals,
    /// Linked children, in completion order.
    children: Vec<NodeId>,
}

/// Directories are inserted when entered and linked into their parent once
/// their whole subtree has finished, so a node's totals only ever include
/// completed children.
#[derive(Debug, Default)]
pub(crate) struct ScanArena {
    nodes: Vec<ArenaNode>,
}

impl ScanArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a directory that is about to be scanned.
    pub fn insert(&mut self, path: &Path, depth: u32) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(ArenaNode {
            name: ScanNode::name_for(path),
            path: path.to_path_buf(),
            depth,
            totals: DirTotals::default(),
            children: Vec::new(),
        });
        id
    }

    /// Add a directory's own files.
    pub fn add_files(&mut self, id: NodeId, bytes: u64, count: u64) {
        let totals = &mut self.nodes[id.index()].totals;
        totals.size += bytes;
        totals.file_count += count;
    }

    /// Attach a finished child to its parent, folding its totals in.
    pub fn link(&mut self, parent: NodeId, child: NodeId) {
        let child_totals = self.nodes[child.index()].totals;
        let node = &mut self.nodes[parent.index()];
        node.totals.absorb_child(&child_totals);
        node.children.push(child);
    }

    pub fn totals(&self, id: NodeId) -> DirTotals {
        self.nodes[id.index()].totals
    }

    /// Build an owned tree rooted at `id` from the linked nodes.
    pub fn materialize(&self, id: NodeId) -> ScanNode {
        let node = &self.nodes[id.index()];
        ScanNode {
            name: node.name.clone(),
            path: node.path.clone(),
            size: node.totals.size,
            children: node.children.iter().map(|&c| self.materialize(c)).collect(),
            depth: node.depth,
            file_count: node.totals.file_count,
            folder_count: node.totals.folder_count,
        }
    }
}
