//! Asset types

use std::fmt;
use std::sync::Arc;

/// Immutable, cheaply cloned byte buffer
pub type Buffer = Arc<[u8]>;

/// A named in-memory file handed to the pipeline by the host
#[derive(Clone, PartialEq, Eq)]
pub struct Asset {
    /// Path-like identifier, '/'-separated
    pub name: String,
    /// Current file content
    pub content: Buffer,
}

impl Asset {
    /// Create a new asset
    pub fn new(name: impl Into<String>, content: impl Into<Buffer>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Content length in bytes
    pub fn len(&self) -> u64 {
        self.content.len() as u64
    }

    /// Whether the content is empty
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

impl fmt::Debug for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Asset")
            .field("name", &self.name)
            .field("len", &self.content.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_from_vec() {
        let asset = Asset::new("img/logo.png", vec![1u8, 2, 3]);
        assert_eq!(asset.name, "img/logo.png");
        assert_eq!(asset.len(), 3);
        assert!(!asset.is_empty());
    }

    #[test]
    fn test_asset_debug_omits_bytes() {
        let asset = Asset::new("a.png", vec![0u8; 1024]);
        let debug = format!("{:?}", asset);
        assert!(debug.contains("a.png"));
        assert!(debug.contains("1024"));
    }
}
