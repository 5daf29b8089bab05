use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::embedded_extractor::{ExtractionRecord, RecursiveEmbeddedExtractor};
use crate::engine::{Engine, LanguageDetection, NullContentHandler, ParseContext};
use crate::errors::{Error, Result};
use crate::input_stream::{seed_metadata, DocumentInput, InputHandle};
use crate::metadata_normalizer::NormalizedMetadata;
use crate::output_sink::{self, DeliveryMode, OutputFormat, ParsedContent};

/// Options for a `parse` call
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    pub format: OutputFormat,
    pub delivery: DeliveryMode,
    /// Destination path, required for `DeliveryMode::File`
    pub output_file: Option<PathBuf>,
    /// Resource-name hint for stream and byte inputs
    pub input_file_name: Option<String>,
    /// Content-type hint passed to the engine, must be a valid MIME string
    pub content_type: Option<String>,
}

/// Options for an `unpack` call
#[derive(Debug, Clone)]
pub struct UnpackOptions {
    /// How many levels of nested containers to descend into. 0 extracts
    /// nothing, 1 extracts direct children only.
    pub max_depth: usize,
    pub input_file_name: Option<String>,
    pub content_type: Option<String>,
}

impl Default for UnpackOptions {
    fn default() -> Self {
        Self {
            max_depth: 1,
            input_file_name: None,
            content_type: None,
        }
    }
}

/// Everything an `unpack` call produced
#[derive(Debug, Serialize, Deserialize)]
pub struct UnpackResult {
    /// Normalized metadata of the container document itself
    pub root_metadata: NormalizedMetadata,
    /// Extracted resources in discovery (pre-order) sequence
    pub embedded_documents: Vec<ExtractionRecord>,
}

/// Public entry point: detection, parsing, language identification and
/// recursive unpacking on top of a document engine.
///
/// The processor owns no parse state; every call builds its own metadata map,
/// context and extractor, so a single instance can serve call after call.
pub struct DocumentProcessor {
    engine: Box<dyn Engine>,
}

impl DocumentProcessor {
    pub fn new(engine: Box<dyn Engine>) -> Self {
        Self { engine }
    }

    /// Detect the MIME type of a document.
    ///
    /// Path inputs are handed to the engine as paths so it can use filename
    /// glob hints; everything else is detected from the leading bytes.
    pub fn detect_mime_type(&self, input: DocumentInput) -> Result<String> {
        if let Some(path) = input.path() {
            if !path.exists() {
                return Err(Error::file_not_found(path));
            }
            log::debug!("detecting mime type of {}", path.display());
            return self.engine.detect_path(path).map_err(Error::from_engine);
        }
        let mut handle = InputHandle::open(input)?;
        self.engine
            .detect_stream(&mut handle)
            .map_err(Error::from_engine)
    }

    /// Identify the natural language of a piece of text
    pub fn detect_language(&self, text: &str) -> Result<LanguageDetection> {
        self.engine.detect_language(text).map_err(Error::from_engine)
    }

    /// Parse a document into formatted content plus normalized metadata.
    ///
    /// The delivery mode decides the shape of the returned content: an
    /// in-memory string, a file written to `options.output_file`, or a
    /// readable stream.
    pub fn parse(
        &self,
        input: DocumentInput,
        options: &ParseOptions,
    ) -> Result<(ParsedContent, NormalizedMetadata)> {
        let mut metadata = seed_metadata(
            &input,
            options.input_file_name.as_deref(),
            options.content_type.as_deref(),
        )?;
        let mut handle = InputHandle::open(input)?;

        let engine = self.engine.as_ref();
        let content = match options.delivery {
            DeliveryMode::String => {
                output_sink::parse_to_string(engine, &mut handle, &mut metadata, options.format)?
            }
            DeliveryMode::File => {
                let path = options.output_file.as_deref().ok_or_else(|| {
                    Error::InvalidArguments("file delivery requires an output file path".to_string())
                })?;
                output_sink::parse_to_file(engine, &mut handle, &mut metadata, options.format, path)?
            }
            DeliveryMode::Stream => {
                output_sink::parse_to_stream(engine, &mut handle, &mut metadata, options.format)?
            }
        };
        handle.close();

        Ok((content, NormalizedMetadata::from_raw(&metadata)))
    }

    /// Unpack the embedded resources of a container document into
    /// `output_dir`, descending at most `options.max_depth` levels.
    ///
    /// The directory is created if missing. Resource names that carry
    /// relative paths keep them, so nested containers land under
    /// subdirectories named after their parent resource.
    pub fn unpack(
        &self,
        input: DocumentInput,
        output_dir: impl AsRef<Path>,
        options: &UnpackOptions,
    ) -> Result<UnpackResult> {
        let output_dir = output_dir.as_ref();
        fs::create_dir_all(output_dir)?;

        let mut metadata = seed_metadata(
            &input,
            options.input_file_name.as_deref(),
            options.content_type.as_deref(),
        )?;
        let mut handle = InputHandle::open(input)?;

        let extractor = Rc::new(RecursiveEmbeddedExtractor::new(output_dir, options.max_depth));
        let mut ctx = ParseContext::new();
        ctx.set_extractor(extractor.clone());

        log::debug!(
            "unpacking into {} with max depth {}",
            output_dir.display(),
            options.max_depth
        );
        let mut handler = NullContentHandler;
        self.engine
            .parse(&mut handle, &mut handler, &mut metadata, &ctx)
            .map_err(Error::from_engine)?;
        handle.close();

        Ok(UnpackResult {
            root_metadata: NormalizedMetadata::from_raw(&metadata),
            embedded_documents: extractor.take_results(),
        })
    }
}

impl std::fmt::Debug for DocumentProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentProcessor").finish_non_exhaustive()
    }
}
