use std::collections::BTreeMap;
use std::io::{self, Read};
use std::path::Path;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Well-known raw metadata keys populated by document engines
pub mod keys {
    pub const RESOURCE_NAME: &str = "resourceName";
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const CONTENT_TYPE_OVERRIDE: &str = "Content-Type-Override";
    pub const CONTENT_LENGTH: &str = "Content-Length";
    pub const CONTENT_ENCODING: &str = "Content-Encoding";
    pub const EMBEDDED_RELATIONSHIP_ID: &str = "embeddedRelationshipId";
    pub const EMBEDDED_RESOURCE_PATH: &str = "X-TIKA:embedded_resource_path";
    pub const EMBEDDED_RESOURCE_TYPE: &str = "embeddedResourceType";
    pub const EMBEDDED_DEPTH: &str = "X-TIKA:embedded_depth";
    pub const PARSE_TIME_MILLIS: &str = "X-TIKA:parse_time_millis";
}

/// Raw key/value metadata populated by the engine as a parse side effect.
///
/// Keys are heterogeneous and engine-specific; `NormalizedMetadata` maps them
/// onto the canonical schema after the call returns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMetadata {
    entries: BTreeMap<String, String>,
}

impl RawMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot the current entries as a plain map
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.entries.clone()
    }
}

/// Qualitative confidence level of a language detection result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LanguageConfidence {
    High,
    Medium,
    Low,
    None,
}

/// Result of a language detection operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageDetection {
    /// ISO 639-1 language code, e.g. "en"
    pub language: String,
    pub confidence: LanguageConfidence,
    /// Numeric confidence score between 0 and 1
    pub raw_score: f64,
}

/// Sink the engine writes formatted content into during a parse call.
///
/// A deliberately narrow SAX-style surface: the engine reports document and
/// element boundaries plus character content, and the handler decides how to
/// render them (plain text, markup) and where to put the bytes.
pub trait ContentHandler {
    fn start_document(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn end_document(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn start_element(&mut self, _name: &str) -> io::Result<()> {
        Ok(())
    }

    fn end_element(&mut self, _name: &str) -> io::Result<()> {
        Ok(())
    }

    fn characters(&mut self, text: &str) -> io::Result<()>;
}

/// Content handler that discards everything; used when only metadata and
/// embedded-resource callbacks matter (unpack)
#[derive(Debug, Default)]
pub struct NullContentHandler;

impl ContentHandler for NullContentHandler {
    fn characters(&mut self, _text: &str) -> io::Result<()> {
        Ok(())
    }
}

/// Callback capability the engine invokes once per embedded resource it
/// discovers while parsing a container document.
///
/// Takes `&self`: the recursive re-parse in `handle` re-enters the same
/// callback synchronously, so implementations keep their state behind
/// interior mutability rather than `&mut`.
pub trait EmbeddedDocumentExtractor {
    /// Whether the engine should hand this resource to `handle`
    fn should_handle(&self, metadata: &RawMetadata) -> bool;

    /// Consume one embedded resource.
    ///
    /// `engine` and `ctx` are the parse call's own engine and context, passed
    /// back in so the extractor can re-invoke `parse` on nested containers.
    /// Returns `Ok(false)` when the resource was deliberately skipped (the
    /// engine must not treat it as consumed).
    fn handle(
        &self,
        engine: &dyn Engine,
        ctx: &ParseContext,
        stream: &mut dyn Read,
        handler: &mut dyn ContentHandler,
        metadata: &RawMetadata,
        recurse: bool,
    ) -> anyhow::Result<bool>;
}

/// Per-call binding point for parse collaborators, handed through the engine
/// to every nested parse of the same top-level call
#[derive(Clone, Default)]
pub struct ParseContext {
    extractor: Option<Rc<dyn EmbeddedDocumentExtractor>>,
}

impl ParseContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an embedded-document extraction strategy for this call
    pub fn set_extractor(&mut self, extractor: Rc<dyn EmbeddedDocumentExtractor>) {
        self.extractor = Some(extractor);
    }

    pub fn extractor(&self) -> Option<Rc<dyn EmbeddedDocumentExtractor>> {
        self.extractor.clone()
    }
}

impl std::fmt::Debug for ParseContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseContext")
            .field("has_extractor", &self.extractor.is_some())
            .finish()
    }
}

/// Narrow contract the external document-processing engine is consumed
/// through. Everything behind it (MIME detection, parsing, OCR, language
/// models) belongs to the engine; this crate only moves bytes across the
/// boundary and aggregates what comes back.
///
/// Engine failures cross the seam as `anyhow::Error` and are converted to the
/// crate's domain errors at the public-call boundary.
pub trait Engine {
    /// Detect the MIME type of a filesystem path
    fn detect_path(&self, path: &Path) -> anyhow::Result<String>;

    /// Detect the MIME type of a byte stream
    fn detect_stream(&self, stream: &mut dyn Read) -> anyhow::Result<String>;

    /// Parse a document: formatted content goes into `handler`, raw metadata
    /// into `metadata`, and embedded resources to the extractor registered in
    /// `ctx` (if any)
    fn parse(
        &self,
        input: &mut dyn Read,
        handler: &mut dyn ContentHandler,
        metadata: &mut RawMetadata,
        ctx: &ParseContext,
    ) -> anyhow::Result<()>;

    /// Detect the natural language of text content
    fn detect_language(&self, text: &str) -> anyhow::Result<LanguageDetection>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_metadata_roundtrip() {
        let mut meta = RawMetadata::new();
        meta.set(keys::RESOURCE_NAME, "report.pdf");
        meta.set(keys::CONTENT_TYPE, "application/pdf");

        assert_eq!(meta.get(keys::RESOURCE_NAME), Some("report.pdf"));
        assert!(meta.contains(keys::CONTENT_TYPE));
        assert_eq!(meta.names().count(), 2);

        let map = meta.to_map();
        assert_eq!(map.get(keys::CONTENT_TYPE).map(String::as_str), Some("application/pdf"));
    }

    #[test]
    fn test_raw_metadata_set_overwrites() {
        let mut meta = RawMetadata::new();
        meta.set(keys::CONTENT_TYPE, "text/plain");
        meta.set(keys::CONTENT_TYPE, "text/html");
        assert_eq!(meta.get(keys::CONTENT_TYPE), Some("text/html"));
    }

    #[test]
    fn test_language_confidence_serde() {
        let json = serde_json::to_string(&LanguageConfidence::High).unwrap();
        assert_eq!(json, "\"HIGH\"");
        let parsed: LanguageConfidence = serde_json::from_str("\"NONE\"").unwrap();
        assert_eq!(parsed, LanguageConfidence::None);
    }

    #[test]
    fn test_parse_context_extractor_registration() {
        struct Never;
        impl EmbeddedDocumentExtractor for Never {
            fn should_handle(&self, _metadata: &RawMetadata) -> bool {
                false
            }
            fn handle(
                &self,
                _engine: &dyn Engine,
                _ctx: &ParseContext,
                _stream: &mut dyn Read,
                _handler: &mut dyn ContentHandler,
                _metadata: &RawMetadata,
                _recurse: bool,
            ) -> anyhow::Result<bool> {
                Ok(false)
            }
        }

        let mut ctx = ParseContext::new();
        assert!(ctx.extractor().is_none());
        ctx.set_extractor(Rc::new(Never));
        assert!(ctx.extractor().is_some());
    }
}
