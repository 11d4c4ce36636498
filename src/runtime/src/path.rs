//! Virtual path normalization.
//!
//! Every client-supplied path passes through [`PathNormalizer`] before any
//! other component touches an archive-internal path. Traversal above the
//! image root is rejected here and nowhere else.

use std::borrow::Cow;

use isoshelf_core::error::{Result, ShelfError};
use isoshelf_core::{ImageFormat, VirtualPath};

/// Token some clients put in front of a virtual path argument.
pub const PATH_MARKER: &str = "path:";

/// Canonicalizes client-supplied virtual paths.
#[derive(Debug, Clone, Default)]
pub struct PathNormalizer {
    case_insensitive: bool,
}

impl PathNormalizer {
    /// Create a normalizer applying the given format's case rules.
    pub fn new(format: &ImageFormat) -> Self {
        Self {
            case_insensitive: format.case_insensitive,
        }
    }

    /// Canonicalize `raw` into a segment list.
    ///
    /// Empty input and `/` are the root. Repeated separators and `.`
    /// segments collapse; `..` pops one segment and fails with
    /// `InvalidPath` once it would leave the root.
    pub fn normalize(&self, raw: &str) -> Result<VirtualPath> {
        let trimmed = raw.trim_start_matches('/');
        let trimmed = trimmed.strip_prefix(PATH_MARKER).unwrap_or(trimmed);

        let mut segments: Vec<String> = Vec::new();
        for segment in trimmed.split('/') {
            match segment {
                "" | "." => continue,
                ".." => {
                    if segments.pop().is_none() {
                        return Err(ShelfError::InvalidPath(format!(
                            "'{}' escapes the image root",
                            raw
                        )));
                    }
                }
                s if s.contains('\0') || s.contains('\\') => {
                    return Err(ShelfError::InvalidPath(format!(
                        "'{}' contains a forbidden character",
                        raw
                    )));
                }
                s => segments.push(self.fold(s).into_owned()),
            }
        }

        Ok(VirtualPath::from_segments(segments))
    }

    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    /// Apply the format's case rule to an archive name or path.
    pub fn fold<'a>(&self, name: &'a str) -> Cow<'a, str> {
        if self.case_insensitive {
            Cow::Owned(name.to_uppercase())
        } else {
            Cow::Borrowed(name)
        }
    }

    /// Resolve `raw` to an archive-internal path (`a/b/c`, no leading slash).
    pub fn resolve_internal(&self, raw: &str) -> Result<String> {
        Ok(self.normalize(raw)?.internal())
    }
}
