//! The narrow collaborator interfaces the tree builder calls through.
//!
//! The dataset/image catalog and the descriptor extractor are out of scope
//! for this crate (see the crate-level docs); callers provide their own
//! implementations of [`Dataset`] and [`DescriptorLoader`]. A small
//! in-memory implementation used by this crate's own tests lives behind
//! `#[cfg(test)]` in this module.

use std::path::{Path, PathBuf};

use crate::Descriptors;

/// A catalog image: an identifier plus enough information to locate its
/// precomputed descriptor file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    pub id: u64,
    feature_root: PathBuf,
}

impl Image {
    pub fn new(id: u64, feature_root: impl Into<PathBuf>) -> Self {
        Self {
            id,
            feature_root: feature_root.into(),
        }
    }

    /// Relative path to a named feature file for this image (e.g. `"descriptors"`).
    pub fn feature_path(&self, kind: &str) -> PathBuf {
        self.feature_root.join(kind)
    }
}

/// Supplies image records and resolves relative feature paths to absolute
/// ones. Implemented by the enclosing dataset/catalog, out of scope here.
pub trait Dataset {
    fn image(&self, id: u64) -> Option<Image>;
    fn location(&self, relative_path: &Path) -> PathBuf;
}

/// Reads a descriptor matrix from disk. Missing files are a recoverable
/// condition: the caller (the tree builder) skips the image.
pub trait DescriptorLoader {
    fn load(&self, path: &Path) -> std::io::Result<Descriptors>;
}
