//! Directory listing entries.

use serde::{Deserialize, Serialize};

/// One node returned by [`Store::get_list`](crate::Store::get_list).
///
/// `is_chunk` marks an internal partial-upload fragment and is only
/// meaningful when `is_directory` is false.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectoryEntry {
    name: String,
    is_directory: bool,
    is_chunk: bool,
    file_size: u64,
}

impl DirectoryEntry {
    /// Create a plain, empty file entry.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_directory: false,
            is_chunk: false,
            file_size: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    pub fn set_directory(&mut self, is_directory: bool) {
        self.is_directory = is_directory;
    }

    pub fn is_chunk(&self) -> bool {
        self.is_chunk
    }

    pub fn set_chunk(&mut self, is_chunk: bool) {
        self.is_chunk = is_chunk;
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Set the size in bytes. Negative sizes are clamped to zero.
    pub fn set_file_size(&mut self, size: i64) {
        self.file_size = size.max(0) as u64;
    }
}
