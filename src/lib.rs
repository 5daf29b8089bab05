/// Docbridge - host-side driver for an external document-processing engine
/// Detects MIME types and languages, parses documents to text or XHTML, and
/// recursively unpacks embedded resources

pub mod document_processor;
pub mod embedded_extractor;
pub mod engine;
pub mod errors;
pub mod input_stream;
pub mod metadata_normalizer;
pub mod output_sink;
pub mod stream_bridge;

/// Re-export the DocumentProcessor for direct usage
pub use document_processor::{
    DocumentProcessor,
    ParseOptions,
    UnpackOptions,
    UnpackResult,
};

/// Re-export the engine seam
pub use engine::{
    ContentHandler,
    EmbeddedDocumentExtractor,
    Engine,
    LanguageConfidence,
    LanguageDetection,
    NullContentHandler,
    ParseContext,
    RawMetadata,
};

/// Re-export error types
pub use errors::{Error, Result};

/// Re-export input and output surfaces
pub use input_stream::DocumentInput;
pub use output_sink::{DeliveryMode, OutputFormat, ParsedContent};

/// Re-export embedded-document extraction
pub use embedded_extractor::{ExtractionRecord, RecursiveEmbeddedExtractor};

/// Re-export metadata normalization
pub use metadata_normalizer::NormalizedMetadata;

/// Re-export stream plumbing
pub use stream_bridge::{BridgeConfig, BridgedReader, HostStreamBridge};
