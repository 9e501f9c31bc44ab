//! Source file handling.

use std::fs::File as StdFile;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anno::{Result, errorf};

/// An immutable, shareable source file: a path plus its content bytes.
#[derive(Debug, Clone, Default)]
pub struct SourceFile {
    pub path: Option<String>,
    content: Arc<[u8]>,
}

impl SourceFile {
    pub fn new_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = StdFile::open(path)
            .map_err(|e| errorf!("FailedToRead: failed to open {}", path.display()).add_source(e))?;
        let capacity = file.metadata().map(|meta| meta.len() as usize).unwrap_or(0);
        let mut content = Vec::with_capacity(capacity);
        file.read_to_end(&mut content)
            .map_err(|e| errorf!("FailedToRead: failed to read {}", path.display()).add_source(e))?;

        Ok(SourceFile {
            path: Some(path.display().to_string()),
            content: Arc::from(content),
        })
    }

    pub fn new_content(content: Vec<u8>) -> Self {
        SourceFile {
            path: None,
            content: Arc::from(content),
        }
    }

    pub fn content(&self) -> &[u8] {
        self.content.as_ref()
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Text of the byte range `start..end`, or `None` when out of bounds.
    pub fn get_text(&self, start: usize, end: usize) -> Option<String> {
        let bytes = self.content();
        if start > end || end > bytes.len() {
            return None;
        }
        Some(String::from_utf8_lossy(&bytes[start..end]).into_owned())
    }

    pub fn get_full_text(&self) -> String {
        String::from_utf8_lossy(self.content()).into_owned()
    }

    /// Exact source text of a syntax node.
    pub fn node_text(&self, node: &tree_sitter::Node<'_>) -> String {
        self.get_text(node.start_byte(), node.end_byte())
            .unwrap_or_default()
    }
}
