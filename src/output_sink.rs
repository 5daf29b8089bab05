use std::fs::File;
use std::io::{self, BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::{ContentHandler, Engine, ParseContext, RawMetadata};
use crate::errors::{Error, Result};
use crate::stream_bridge::BridgedReader;

/// Format of the extracted content. Orthogonal to delivery: it selects which
/// content-handler implementation is constructed, not where the bytes go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain text without markup
    Text,
    /// Structured XHTML markup
    #[default]
    Xhtml,
}

/// How parsed content is delivered back to the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Accumulate in memory and return a string
    #[default]
    String,
    /// Write to a caller-supplied file path
    File,
    /// Return a lazily-readable byte stream
    Stream,
}

/// Parsed content in the delivery representation the caller asked for
pub enum ParsedContent {
    Text(String),
    File(PathBuf),
    Stream(BridgedReader<Cursor<Vec<u8>>>),
}

impl ParsedContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParsedContent::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&Path> {
        match self {
            ParsedContent::File(path) => Some(path),
            _ => None,
        }
    }

    pub fn into_stream(self) -> Option<BridgedReader<Cursor<Vec<u8>>>> {
        match self {
            ParsedContent::Stream(stream) => Some(stream),
            _ => None,
        }
    }
}

impl std::fmt::Debug for ParsedContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParsedContent::Text(text) => f.debug_tuple("Text").field(&text.len()).finish(),
            ParsedContent::File(path) => f.debug_tuple("File").field(path).finish(),
            ParsedContent::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Plain-text content handler: character content separated at element
/// boundaries, markup dropped
pub struct TextContentHandler<W: Write> {
    writer: W,
}

impl<W: Write> TextContentHandler<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> ContentHandler for TextContentHandler<W> {
    fn end_element(&mut self, _name: &str) -> io::Result<()> {
        self.writer.write_all(b"\n")
    }

    fn characters(&mut self, text: &str) -> io::Result<()> {
        self.writer.write_all(text.as_bytes())
    }
}

/// XHTML content handler: escaped character content wrapped in the element
/// structure the engine reports
pub struct XhtmlContentHandler<W: Write> {
    writer: W,
}

impl<W: Write> XhtmlContentHandler<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> ContentHandler for XhtmlContentHandler<W> {
    fn start_document(&mut self) -> io::Result<()> {
        self.writer.write_all(b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>")
    }

    fn start_element(&mut self, name: &str) -> io::Result<()> {
        write!(self.writer, "<{name}>")
    }

    fn end_element(&mut self, name: &str) -> io::Result<()> {
        write!(self.writer, "</{name}>")
    }

    fn characters(&mut self, text: &str) -> io::Result<()> {
        self.writer.write_all(escape_xml(text).as_bytes())
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

fn handler_for<'a>(format: OutputFormat, writer: &'a mut dyn Write) -> Box<dyn ContentHandler + 'a> {
    match format {
        OutputFormat::Text => Box::new(TextContentHandler::new(writer)),
        OutputFormat::Xhtml => Box::new(XhtmlContentHandler::new(writer)),
    }
}

/// Parse with string delivery: content accumulates in memory
pub(crate) fn parse_to_string(
    engine: &dyn Engine,
    input: &mut dyn std::io::Read,
    metadata: &mut RawMetadata,
    format: OutputFormat,
) -> Result<ParsedContent> {
    let buffer = run_parse_buffered(engine, input, metadata, format)?;
    let text = String::from_utf8(buffer)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(ParsedContent::Text(text))
}

/// Parse with file delivery: content written straight to `output_file`,
/// which is flushed and closed on every exit path
pub(crate) fn parse_to_file(
    engine: &dyn Engine,
    input: &mut dyn std::io::Read,
    metadata: &mut RawMetadata,
    format: OutputFormat,
    output_file: &Path,
) -> Result<ParsedContent> {
    let mut writer = BufWriter::new(File::create(output_file)?);
    {
        let mut handler = handler_for(format, &mut writer);
        engine
            .parse(input, handler.as_mut(), metadata, &ParseContext::new())
            .map_err(Error::from_engine)?;
    }
    writer.flush()?;
    Ok(ParsedContent::File(output_file.to_path_buf()))
}

/// Parse with stream delivery: content buffered and exposed through the
/// engine-to-host direction of the stream bridge
pub(crate) fn parse_to_stream(
    engine: &dyn Engine,
    input: &mut dyn std::io::Read,
    metadata: &mut RawMetadata,
    format: OutputFormat,
) -> Result<ParsedContent> {
    let buffer = run_parse_buffered(engine, input, metadata, format)?;
    Ok(ParsedContent::Stream(BridgedReader::new(Cursor::new(buffer))))
}

fn run_parse_buffered(
    engine: &dyn Engine,
    input: &mut dyn std::io::Read,
    metadata: &mut RawMetadata,
    format: OutputFormat,
) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    {
        let mut handler = handler_for(format, &mut buffer);
        engine
            .parse(input, handler.as_mut(), metadata, &ParseContext::new())
            .map_err(Error::from_engine)?;
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emit_sample(handler: &mut dyn ContentHandler) {
        handler.start_document().unwrap();
        handler.start_element("p").unwrap();
        handler.characters("a < b & c").unwrap();
        handler.end_element("p").unwrap();
        handler.end_document().unwrap();
    }

    #[test]
    fn test_text_handler_drops_markup() {
        let mut buf = Vec::new();
        emit_sample(&mut TextContentHandler::new(&mut buf));
        assert_eq!(String::from_utf8(buf).unwrap(), "a < b & c\n");
    }

    #[test]
    fn test_xhtml_handler_escapes_and_wraps() {
        let mut buf = Vec::new();
        emit_sample(&mut XhtmlContentHandler::new(&mut buf));
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><p>a &lt; b &amp; c</p>"
        );
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("plain"), "plain");
        assert_eq!(escape_xml("<&>"), "&lt;&amp;&gt;");
    }

    #[test]
    fn test_default_format_is_xhtml() {
        assert_eq!(OutputFormat::default(), OutputFormat::Xhtml);
        assert_eq!(DeliveryMode::default(), DeliveryMode::String);
    }
}
