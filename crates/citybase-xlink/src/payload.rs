//! External payload streams.
//!
//! Library objects and texture images live outside the document as files or
//! URIs; the categories that need their bytes go through this opener and
//! nothing else does.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

pub trait PayloadOpener: Send + Sync {
    fn open(&self, uri: &str) -> io::Result<Box<dyn Read + Send>>;
}

/// Opens `file://` URIs and plain paths, resolving relative references
/// against the directory the imported document came from.
pub struct FilePayloadOpener {
    base: PathBuf,
}

impl FilePayloadOpener {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

impl PayloadOpener for FilePayloadOpener {
    fn open(&self, uri: &str) -> io::Result<Box<dyn Read + Send>> {
        let raw = uri.strip_prefix("file://").unwrap_or(uri);
        let path = Path::new(raw);
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base.join(path)
        };
        Ok(Box::new(File::open(path)?))
    }
}
