//! Uploaded content handed to the cipher service.

use std::fs;
use std::path::Path;

/// Bytes supplied by the request layer, with the client's file name if any.
///
/// The name is only used for the extension allowlist; staged files are never
/// named after it.
#[derive(Clone)]
pub struct Upload {
    name: Option<String>,
    content: Vec<u8>,
}

impl Upload {
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: None,
            content: content.into(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Read a local file as an upload named after its final path component.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let content = fs::read(path)?;
        let upload = Self::new(content);
        Ok(match path.file_name() {
            Some(name) => upload.with_name(name.to_string_lossy()),
            None => upload,
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn len(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

impl std::fmt::Debug for Upload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upload")
            .field("name", &self.name)
            .field("len", &self.content.len())
            .finish()
    }
}
