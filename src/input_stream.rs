use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

use crate::engine::{RawMetadata, keys};
use crate::errors::{Error, Result};
use crate::stream_bridge::HostStreamBridge;

/// Accepted inputs for every public operation: a filesystem path, raw bytes,
/// or a live byte-oriented reader
pub enum DocumentInput {
    Path(PathBuf),
    Bytes(Vec<u8>),
    Reader(Box<dyn Read + Send + 'static>),
}

impl DocumentInput {
    /// Wrap an arbitrary host-side reader
    pub fn reader<R: Read + Send + 'static>(reader: R) -> Self {
        DocumentInput::Reader(Box::new(reader))
    }

    /// The filesystem path, when the input is path-based
    pub fn path(&self) -> Option<&Path> {
        match self {
            DocumentInput::Path(path) => Some(path),
            _ => None,
        }
    }
}

impl From<PathBuf> for DocumentInput {
    fn from(path: PathBuf) -> Self {
        DocumentInput::Path(path)
    }
}

impl From<&Path> for DocumentInput {
    fn from(path: &Path) -> Self {
        DocumentInput::Path(path.to_path_buf())
    }
}

impl From<&str> for DocumentInput {
    fn from(path: &str) -> Self {
        DocumentInput::Path(PathBuf::from(path))
    }
}

impl From<Vec<u8>> for DocumentInput {
    fn from(bytes: Vec<u8>) -> Self {
        DocumentInput::Bytes(bytes)
    }
}

impl From<&[u8]> for DocumentInput {
    fn from(bytes: &[u8]) -> Self {
        DocumentInput::Bytes(bytes.to_vec())
    }
}

impl std::fmt::Debug for DocumentInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentInput::Path(path) => f.debug_tuple("Path").field(path).finish(),
            DocumentInput::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            DocumentInput::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

enum HandleSource {
    File(File),
    Bytes(Cursor<Vec<u8>>),
    Bridged(HostStreamBridge),
    Closed,
}

/// Uniform streaming handle over any `DocumentInput`.
///
/// Exactly one underlying resource is open at a time; `close` is idempotent
/// and also runs on drop, so the resource is released on every exit path.
/// Host-side readers are adapted through the host-to-engine stream bridge.
pub struct InputHandle {
    source: HandleSource,
}

impl InputHandle {
    /// Open the input, failing early when a path does not exist
    pub fn open(input: DocumentInput) -> Result<Self> {
        let source = match input {
            DocumentInput::Path(path) => {
                if !path.exists() {
                    return Err(Error::file_not_found(&path));
                }
                HandleSource::File(File::open(&path)?)
            }
            DocumentInput::Bytes(bytes) => HandleSource::Bytes(Cursor::new(bytes)),
            DocumentInput::Reader(reader) => HandleSource::Bridged(HostStreamBridge::new(reader)),
        };
        Ok(Self { source })
    }

    /// Release the underlying resource. Idempotent.
    pub fn close(&mut self) {
        if let HandleSource::Bridged(bridge) = &mut self.source {
            bridge.close();
        }
        self.source = HandleSource::Closed;
    }
}

impl std::fmt::Debug for InputHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            HandleSource::File(_) => f.write_str("InputHandle(File)"),
            HandleSource::Bytes(cursor) => {
                write!(f, "InputHandle(Bytes({}))", cursor.get_ref().len())
            }
            HandleSource::Bridged(_) => f.write_str("InputHandle(Bridged)"),
            HandleSource::Closed => f.write_str("InputHandle(Closed)"),
        }
    }
}

impl Read for InputHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.source {
            HandleSource::File(file) => file.read(buf),
            HandleSource::Bytes(cursor) => cursor.read(buf),
            HandleSource::Bridged(bridge) => bridge.read(buf),
            HandleSource::Closed => Ok(0),
        }
    }
}

impl Drop for InputHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Seed raw metadata with caller-supplied hints before the engine call,
/// mirroring what engine front-ends do with resource names and content-type
/// overrides
pub(crate) fn seed_metadata(
    input: &DocumentInput,
    input_file_name: Option<&str>,
    content_type: Option<&str>,
) -> Result<RawMetadata> {
    let mut metadata = RawMetadata::new();

    let file_name = match input {
        DocumentInput::Path(path) => Some(path.display().to_string()),
        _ => input_file_name.map(str::to_string),
    };
    if let Some(name) = file_name {
        metadata.set(keys::RESOURCE_NAME, name);
    }

    if let Some(content_type) = content_type {
        validate_mime_type(content_type)?;
        metadata.set(keys::CONTENT_TYPE, content_type);
        metadata.set(keys::CONTENT_TYPE_OVERRIDE, content_type);
    }

    Ok(metadata)
}

/// A MIME string must be in "type/subtype" form with non-empty halves
pub(crate) fn validate_mime_type(mime: &str) -> Result<()> {
    match mime.split_once('/') {
        Some((root, sub)) if !root.is_empty() && !sub.is_empty() && !sub.contains('/') => Ok(()),
        _ => Err(Error::InvalidMimeType(mime.to_string())),
    }
}
