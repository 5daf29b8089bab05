use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::engine::{
    ContentHandler, EmbeddedDocumentExtractor, Engine, ParseContext, RawMetadata, keys,
};
use crate::stream_bridge::copy_to_file;

/// One embedded resource persisted during an unpack call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    /// Snapshot of the raw metadata the engine attached to the resource
    pub metadata: BTreeMap<String, String>,
    /// Where the resource was written, under the unpack output directory
    pub file_path: PathBuf,
}

/// Depth-bounded extractor registered with the engine for one unpack call.
///
/// The engine invokes `handle` once per embedded resource it discovers; the
/// extractor persists the resource under the output directory, records its
/// metadata, and re-invokes the engine's parse entrypoint on the persisted
/// file so containers nested inside it are discovered through the same
/// callback. Recursion is synchronous and depth-first, so results accumulate
/// in pre-order discovery order.
///
/// State lives behind `Cell`/`RefCell` because the nested parse re-enters
/// `handle` through a shared reference. One instance must never be shared
/// across concurrent top-level calls.
pub struct RecursiveEmbeddedExtractor {
    output_dir: PathBuf,
    max_depth: usize,
    current_depth: Cell<usize>,
    results: RefCell<Vec<ExtractionRecord>>,
}

impl RecursiveEmbeddedExtractor {
    pub fn new(output_dir: impl Into<PathBuf>, max_depth: usize) -> Self {
        Self {
            output_dir: output_dir.into(),
            max_depth,
            current_depth: Cell::new(0),
            results: RefCell::new(Vec::new()),
        }
    }

    /// Drain the accumulated records, in discovery order
    pub fn take_results(&self) -> Vec<ExtractionRecord> {
        self.results.take()
    }

    /// Output filename for one embedded resource: resource-name metadata,
    /// else relationship id, else a synthesized unique name
    fn output_name(&self, metadata: &RawMetadata) -> String {
        metadata
            .get(keys::RESOURCE_NAME)
            .or_else(|| metadata.get(keys::EMBEDDED_RELATIONSHIP_ID))
            .map(str::to_string)
            .unwrap_or_else(|| format!("embedded_{}", self.results.borrow().len()))
    }
}

impl EmbeddedDocumentExtractor for RecursiveEmbeddedExtractor {
    fn should_handle(&self, _metadata: &RawMetadata) -> bool {
        // Every discovered resource is a candidate; the engine already did
        // its own content-type filtering upstream
        true
    }

    fn handle(
        &self,
        engine: &dyn Engine,
        ctx: &ParseContext,
        stream: &mut dyn Read,
        handler: &mut dyn ContentHandler,
        metadata: &RawMetadata,
        recurse: bool,
    ) -> anyhow::Result<bool> {
        if self.current_depth.get() >= self.max_depth {
            // Skipped, not consumed: the engine moves on without treating
            // the resource as extracted
            return Ok(false);
        }

        let name = self.output_name(metadata);
        let output_path = self.output_dir.join(&name);

        copy_to_file(stream, &output_path)
            .with_context(|| format!("failed to persist embedded resource to {}", output_path.display()))
            .inspect_err(|err| log::warn!("embedded resource extraction failed: {err:#}"))?;

        self.results.borrow_mut().push(ExtractionRecord {
            metadata: metadata.to_map(),
            file_path: output_path.clone(),
        });

        if recurse {
            // Depth must come back down on every exit path, including a
            // failing nested parse
            let _guard = DepthGuard::enter(&self.current_depth);
            let mut nested = File::open(&output_path)
                .with_context(|| format!("failed to reopen {}", output_path.display()))?;
            engine
                .parse(&mut nested, handler, &mut RawMetadata::new(), ctx)
                .with_context(|| format!("nested parse of {} failed", output_path.display()))?;
        }

        Ok(true)
    }
}

struct DepthGuard<'a> {
    depth: &'a Cell<usize>,
}

impl<'a> DepthGuard<'a> {
    fn enter(depth: &'a Cell<usize>) -> Self {
        depth.set(depth.get() + 1);
        Self { depth }
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get() - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::path::Path;

    /// Engine stub whose `parse` behavior is injectable per test
    struct StubEngine {
        parse_result: fn() -> anyhow::Result<()>,
    }

    impl Engine for StubEngine {
        fn detect_path(&self, _path: &Path) -> anyhow::Result<String> {
            unimplemented!("not used by extractor tests")
        }
        fn detect_stream(&self, _stream: &mut dyn Read) -> anyhow::Result<String> {
            unimplemented!("not used by extractor tests")
        }
        fn parse(
            &self,
            _input: &mut dyn Read,
            _handler: &mut dyn ContentHandler,
            _metadata: &mut RawMetadata,
            _ctx: &ParseContext,
        ) -> anyhow::Result<()> {
            (self.parse_result)()
        }
        fn detect_language(&self, _text: &str) -> anyhow::Result<crate::engine::LanguageDetection> {
            unimplemented!("not used by extractor tests")
        }
    }

    fn ok_engine() -> StubEngine {
        StubEngine { parse_result: || Ok(()) }
    }

    fn call_handle(
        extractor: &RecursiveEmbeddedExtractor,
        engine: &dyn Engine,
        data: &[u8],
        metadata: &RawMetadata,
        recurse: bool,
    ) -> anyhow::Result<bool> {
        let ctx = ParseContext::new();
        let mut handler = crate::engine::NullContentHandler;
        extractor.handle(engine, &ctx, &mut Cursor::new(data.to_vec()), &mut handler, metadata, recurse)
    }

    #[test]
    fn test_zero_max_depth_skips_everything() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = RecursiveEmbeddedExtractor::new(dir.path(), 0);
        let consumed =
            call_handle(&extractor, &ok_engine(), b"payload", &RawMetadata::new(), false).unwrap();
        assert!(!consumed);
        assert!(extractor.take_results().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_handle_persists_and_records() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = RecursiveEmbeddedExtractor::new(dir.path(), 1);
        let mut metadata = RawMetadata::new();
        metadata.set(keys::RESOURCE_NAME, "image1.png");
        metadata.set(keys::CONTENT_TYPE, "image/png");

        let consumed = call_handle(&extractor, &ok_engine(), b"pngbytes", &metadata, false).unwrap();
        assert!(consumed);

        let results = extractor.take_results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].file_path, dir.path().join("image1.png"));
        assert_eq!(results[0].metadata.get(keys::CONTENT_TYPE).map(String::as_str), Some("image/png"));
        assert_eq!(std::fs::read(&results[0].file_path).unwrap(), b"pngbytes");
    }

    #[test]
    fn test_name_fallback_chain() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = RecursiveEmbeddedExtractor::new(dir.path(), 1);

        let mut with_rel_id = RawMetadata::new();
        with_rel_id.set(keys::EMBEDDED_RELATIONSHIP_ID, "rId7");
        call_handle(&extractor, &ok_engine(), b"a", &with_rel_id, false).unwrap();

        // No name hints at all: synthesized from the running count
        call_handle(&extractor, &ok_engine(), b"b", &RawMetadata::new(), false).unwrap();
        call_handle(&extractor, &ok_engine(), b"c", &RawMetadata::new(), false).unwrap();

        let names: Vec<_> = extractor
            .take_results()
            .into_iter()
            .map(|r| r.file_path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["rId7", "embedded_1", "embedded_2"]);
    }

    #[test]
    fn test_relative_resource_paths_create_parents() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = RecursiveEmbeddedExtractor::new(dir.path(), 1);
        let mut metadata = RawMetadata::new();
        metadata.set(keys::RESOURCE_NAME, "embed1/embed1a.txt");

        call_handle(&extractor, &ok_engine(), b"nested", &metadata, false).unwrap();
        assert_eq!(std::fs::read(dir.path().join("embed1/embed1a.txt")).unwrap(), b"nested");
    }

    #[test]
    fn test_depth_recovers_after_failed_nested_parse() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = RecursiveEmbeddedExtractor::new(dir.path(), 1);
        let failing = StubEngine {
            parse_result: || Err(anyhow::anyhow!("engine exploded")),
        };

        let err = call_handle(&extractor, &failing, b"data", &RawMetadata::new(), true).unwrap_err();
        assert!(err.to_string().contains("nested parse"));

        // The failing nested parse must not leave the depth counter stuck;
        // a subsequent resource at the root level is still extracted
        let consumed = call_handle(&extractor, &ok_engine(), b"more", &RawMetadata::new(), false).unwrap();
        assert!(consumed);
    }

    #[test]
    fn test_persist_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("not-a-dir");
        std::fs::write(&bogus, b"file, not dir").unwrap();

        // Output dir is actually a file: persisting must fail and abort
        let extractor = RecursiveEmbeddedExtractor::new(&bogus, 1);
        let mut metadata = RawMetadata::new();
        metadata.set(keys::RESOURCE_NAME, "x.bin");
        let result = call_handle(&extractor, &ok_engine(), b"data", &metadata, false);
        assert!(result.is_err());
        assert!(extractor.take_results().is_empty());
    }
}
