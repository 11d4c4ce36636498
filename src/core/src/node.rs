//! Virtual directory view types.
//!
//! A [`VirtualPath`] is a canonical segment list produced by the path
//! normalizer. All parent/child/prefix math runs on segments, never on raw
//! strings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical virtual path inside an image. Empty means the image root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VirtualPath {
    segments: Vec<String>,
}

impl VirtualPath {
    /// The image root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Build from segments that are already canonical.
    pub fn from_segments(segments: Vec<String>) -> Self {
        Self { segments }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Parent directory, or `None` at the root.
    pub fn parent(&self) -> Option<VirtualPath> {
        let (_, parent) = self.segments.split_last()?;
        Some(Self::from_segments(parent.to_vec()))
    }

    /// Child path one level below this one.
    pub fn join(&self, name: &str) -> VirtualPath {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Self { segments }
    }

    /// Last segment, or `None` at the root.
    pub fn basename(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Whether this path is a (non-strict) prefix of `other`.
    pub fn is_prefix_of<S: AsRef<str>>(&self, other: &[S]) -> bool {
        self.segments.len() <= other.len()
            && self
                .segments
                .iter()
                .zip(other)
                .all(|(a, b)| a.as_str() == b.as_ref())
    }

    /// Archive-internal form: slash-joined, no leading slash.
    pub fn internal(&self) -> String {
        self.segments.join("/")
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

/// Kind discriminant shared by all virtual nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Dir,
    Back,
    Image,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::File => "file",
            NodeKind::Dir => "dir",
            NodeKind::Back => "back",
            NodeKind::Image => "image",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a BACK node navigates to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackTarget {
    /// Parent directory inside the same image
    Parent(VirtualPath),
    /// Top-level image listing
    Inventory,
}

/// One entry of a listing response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VirtualNode {
    /// File member; `path` is its download path inside the image
    File {
        name: String,
        path: VirtualPath,
        size: u64,
    },
    /// Inferred subdirectory
    Dir { name: String, path: VirtualPath },
    /// Synthetic navigate-up entry
    Back { target: BackTarget },
    /// Image in the store
    Image { name: String, file_name: String },
}

impl VirtualNode {
    pub fn kind(&self) -> NodeKind {
        match self {
            VirtualNode::File { .. } => NodeKind::File,
            VirtualNode::Dir { .. } => NodeKind::Dir,
            VirtualNode::Back { .. } => NodeKind::Back,
            VirtualNode::Image { .. } => NodeKind::Image,
        }
    }

    /// Display name.
    pub fn name(&self) -> &str {
        match self {
            VirtualNode::File { name, .. }
            | VirtualNode::Dir { name, .. }
            | VirtualNode::Image { name, .. } => name,
            VirtualNode::Back { .. } => "..",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vp(segments: &[&str]) -> VirtualPath {
        VirtualPath::from_segments(segments.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_root() {
        let root = VirtualPath::root();
        assert!(root.is_root());
        assert_eq!(root.parent(), None);
        assert_eq!(root.to_string(), "/");
        assert_eq!(root.internal(), "");
    }

    #[test]
    fn test_parent_and_join() {
        let path = vp(&["boot", "grub"]);
        assert_eq!(path.parent(), Some(vp(&["boot"])));
        assert_eq!(vp(&["boot"]).parent(), Some(VirtualPath::root()));
        assert_eq!(vp(&["boot"]).join("grub"), path);
        assert_eq!(path.basename(), Some("grub"));
    }

    #[test]
    fn test_display_and_internal() {
        let path = vp(&["boot", "grub", "grub.cfg"]);
        assert_eq!(path.to_string(), "/boot/grub/grub.cfg");
        assert_eq!(path.internal(), "boot/grub/grub.cfg");
    }

    #[test]
    fn test_is_prefix_of() {
        let boot = vp(&["boot"]);
        assert!(boot.is_prefix_of(&["boot", "grub"]));
        assert!(boot.is_prefix_of(&["boot"]));
        assert!(!boot.is_prefix_of(&["bootx"]));
        assert!(!boot.is_prefix_of::<&str>(&[]));
        assert!(VirtualPath::root().is_prefix_of::<&str>(&[]));
    }

    #[test]
    fn test_node_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&NodeKind::Dir).unwrap(), "\"dir\"");
        assert_eq!(NodeKind::Back.to_string(), "back");
    }

    #[test]
    fn test_node_kind_and_name() {
        let back = VirtualNode::Back {
            target: BackTarget::Inventory,
        };
        assert_eq!(back.kind(), NodeKind::Back);
        assert_eq!(back.name(), "..");

        let file = VirtualNode::File {
            name: "grub.cfg".to_string(),
            path: vp(&["boot", "grub", "grub.cfg"]),
            size: 42,
        };
        assert_eq!(file.kind(), NodeKind::File);
        assert_eq!(file.name(), "grub.cfg");
    }
}
