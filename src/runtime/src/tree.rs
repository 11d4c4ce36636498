//! Virtual directory synthesis from a flat file listing.

use std::borrow::Cow;
use std::collections::HashSet;

use isoshelf_core::{ArchiveEntry, BackTarget, VirtualNode, VirtualPath};

use crate::path::PathNormalizer;

/// Build the immediate children of `dir`.
///
/// The result always starts with exactly one BACK node, followed by every
/// distinct inferred subdirectory and then every file directly inside
/// `dir`, each group in discovery order. Entries for the same subdirectory
/// need not be contiguous in `entries`.
pub fn build_children(entries: &[ArchiveEntry], dir: &VirtualPath) -> Vec<VirtualNode> {
    build_children_with(entries, dir, &PathNormalizer::default())
}

/// Like [`build_children`], but entry names are folded with `normalizer`'s
/// case rule before they are compared with `dir`, which is expected to be
/// normalized by the same `normalizer`.
///
/// Node names keep the case found in the listing.
pub fn build_children_with(
    entries: &[ArchiveEntry],
    dir: &VirtualPath,
    normalizer: &PathNormalizer,
) -> Vec<VirtualNode> {
    let back = match dir.parent() {
        Some(parent) => BackTarget::Parent(parent),
        None => BackTarget::Inventory,
    };

    let mut seen_dirs: HashSet<Cow<'_, str>> = HashSet::new();
    let mut dirs = Vec::new();
    let mut files = Vec::new();

    for entry in entries {
        let segments: Vec<&str> = entry.segments().collect();
        let Some((name, parent)) = segments.split_last() else {
            continue;
        };
        let folded: Vec<Cow<'_, str>> = parent.iter().map(|s| normalizer.fold(*s)).collect();
        if !dir.is_prefix_of(&folded) {
            continue;
        }

        if parent.len() == dir.len() {
            files.push(VirtualNode::File {
                name: name.to_string(),
                path: dir.join(name),
                size: entry.size,
            });
        } else {
            let subdir = parent[dir.len()];
            if seen_dirs.insert(folded[dir.len()].clone()) {
                dirs.push(VirtualNode::Dir {
                    name: subdir.to_string(),
                    path: dir.join(subdir),
                });
            }
        }
    }

    let mut nodes = Vec::with_capacity(1 + dirs.len() + files.len());
    nodes.push(VirtualNode::Back { target: back });
    nodes.extend(dirs);
    nodes.extend(files);
    nodes
}
