//! Directory size tree produced by a scan.

use std::path::PathBuf;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Aggregate counters carried by every scanned directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirTotals {
    /// Total bytes of all readable files in this subtree.
    pub size: u64,
    /// Number of readable files in this subtree.
    pub file_count: u64,
    /// Number of directories below this one.
    pub folder_count: u64,
}

impl DirTotals {
    /// Add a child directory's totals (the child itself counts as one folder).
    pub fn absorb_child(&mut self, child: &DirTotals) {
        self.size += child.size;
        self.file_count += child.file_count;
        self.folder_count += child.folder_count + 1;
    }
}

/// A single directory in the scanned tree.
///
/// `size`, `file_count` and `folder_count` equal the directory's own files plus
/// the recursive sums of all children.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanNode {
    /// Directory name (not full path).
    pub name: CompactString,

    /// Full path on disk.
    pub path: PathBuf,

    /// Aggregate size in bytes.
    pub size: u64,

    /// Child directories, in the order they finished scanning.
    pub children: Vec<ScanNode>,

    /// Depth below the scan root (root = 0).
    pub depth: u32,

    pub file_count: u64,

    pub folder_count: u64,
}

impl ScanNode {
    /// Create an empty directory node.
    pub fn new(name: impl Into<CompactString>, path: impl Into<PathBuf>, depth: u32) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            size: 0,
            children: Vec::new(),
            depth,
            file_count: 0,
            folder_count: 0,
        }
    }

    /// Display name for a directory path; falls back to the full path for roots.
    pub fn name_for(path: &std::path::Path) -> CompactString {
        path.file_name()
            .map(|n| CompactString::new(n.to_string_lossy()))
            .unwrap_or_else(|| CompactString::new(path.to_string_lossy()))
    }

    /// The aggregate counters of this node.
    pub fn totals(&self) -> DirTotals {
        DirTotals {
            size: self.size,
            file_count: self.file_count,
            folder_count: self.folder_count,
        }
    }

    /// Get the number of direct children.
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Find a direct child by name.
    pub fn child(&self, name: &str) -> Option<&ScanNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Sort children by size in descending order.
    pub fn sort_children_by_size(&mut self) {
        self.children.sort_by(|a, b| b.size.cmp(&a.size));
        for child in &mut self.children {
            child.sort_children_by_size();
        }
    }

    /// Check the aggregate invariant for the whole subtree, given each node's
    /// own (non-recursive) file totals are at most what it reports.
    pub fn totals_consistent(&self) -> bool {
        let mut from_children = DirTotals::default();
        for child in &self.children {
            if !child.totals_consistent() {
                return false;
            }
            from_children.absorb_child(&child.totals());
        }
        self.size >= from_children.size
            && self.file_count >= from_children.file_count
            && self.folder_count >= from_children.folder_count
    }
}
