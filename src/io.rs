//! Reader/Writer traits and format dispatch
//!
//! Readers turn a graph document on disk into a [`GraphDocument`]; writers
//! persist an emitted [`LayoutResult`]. The registry picks one by file
//! extension or format id.

use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::geometry::LayoutResult;
use crate::graph::{Graph, GraphDocument, MalformedGraph};
use crate::svg::SvgWriter;

/// Errors that can occur during reading or writing
#[derive(Error, Debug)]
pub enum IoError {
    /// The file format is not supported
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The file extension could not be determined
    #[error("could not determine file format from path: {0}")]
    UnknownExtension(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The document parsed but does not describe a valid graph
    #[error("malformed graph: {0}")]
    Malformed(#[from] MalformedGraph),

    #[error("render error: {0}")]
    Render(#[from] askama::Error),
}

/// Result type for reader/writer operations
pub type IoResult<T> = Result<T, IoError>;

/// A reader parses an input file into a graph document
pub trait Reader {
    fn read(&self, input: &Path) -> IoResult<GraphDocument>;

    /// File extensions this reader can handle (e.g., ["yaml", "yml"])
    fn supported_extensions(&self) -> &[&str];

    /// Check if this reader can handle the given file extension
    fn supports_extension(&self, ext: &str) -> bool {
        self.supported_extensions()
            .iter()
            .any(|e| e.eq_ignore_ascii_case(ext))
    }
}

/// A writer outputs layout geometry in a specific format
pub trait Writer {
    fn write(&self, layout: &LayoutResult, output: &Path) -> IoResult<()>;

    /// Identifier for this output format (e.g., "svg")
    fn format_id(&self) -> &str;
}

/// Reads the `{nodes, links}` JSON graph document
#[derive(Debug, Default)]
pub struct JsonReader;

impl JsonReader {
    pub fn new() -> Self {
        Self
    }
}

impl Reader for JsonReader {
    fn read(&self, input: &Path) -> IoResult<GraphDocument> {
        let text = fs::read_to_string(input)?;
        Ok(serde_json::from_str(&text)?)
    }

    fn supported_extensions(&self) -> &[&str] {
        &["json"]
    }
}

/// Reads the same document shape written as YAML
#[derive(Debug, Default)]
pub struct YamlReader;

impl YamlReader {
    pub fn new() -> Self {
        Self
    }
}

impl Reader for YamlReader {
    fn read(&self, input: &Path) -> IoResult<GraphDocument> {
        let text = fs::read_to_string(input)?;
        Ok(serde_yaml::from_str(&text)?)
    }

    fn supported_extensions(&self) -> &[&str] {
        &["yaml", "yml"]
    }
}

/// Registry of available readers and writers
pub struct FormatRegistry {
    readers: Vec<Box<dyn Reader>>,
    writers: Vec<Box<dyn Writer>>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            readers: Vec::new(),
            writers: Vec::new(),
        }
    }

    /// Create a registry with all default readers and writers registered
    ///
    /// Currently registers:
    /// - Readers: `JsonReader` (json), `YamlReader` (yaml, yml)
    /// - Writers: `SvgWriter` (svg)
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_reader(Box::new(JsonReader::new()));
        registry.register_reader(Box::new(YamlReader::new()));
        registry.register_writer(Box::new(SvgWriter::new()));
        registry
    }

    pub fn register_reader(&mut self, reader: Box<dyn Reader>) {
        self.readers.push(reader);
    }

    pub fn register_writer(&mut self, writer: Box<dyn Writer>) {
        self.writers.push(writer);
    }

    /// Find a reader for the given file extension
    pub fn reader_for_extension(&self, ext: &str) -> Option<&dyn Reader> {
        self.readers
            .iter()
            .find(|r| r.supports_extension(ext))
            .map(|r| r.as_ref())
    }

    /// Find a writer by format ID
    pub fn writer_for_format(&self, format_id: &str) -> Option<&dyn Writer> {
        self.writers
            .iter()
            .find(|w| w.format_id().eq_ignore_ascii_case(format_id))
            .map(|w| w.as_ref())
    }

    pub fn extension_from_path(path: &Path) -> Option<&str> {
        path.extension().and_then(|e| e.to_str())
    }

    /// Find a reader for the given path based on its extension
    pub fn reader_for_path(&self, path: &Path) -> IoResult<&dyn Reader> {
        let ext = Self::extension_from_path(path)
            .ok_or_else(|| IoError::UnknownExtension(path.display().to_string()))?;

        self.reader_for_extension(ext)
            .ok_or_else(|| IoError::UnsupportedFormat(ext.to_string()))
    }

    /// Write `layout` with the writer registered for `format_id`
    pub fn write(&self, format_id: &str, layout: &LayoutResult, output: &Path) -> IoResult<()> {
        let writer = self
            .writer_for_format(format_id)
            .ok_or_else(|| IoError::UnsupportedFormat(format_id.to_string()))?;
        writer.write(layout, output)
    }
}

/// Read and validate a graph document from disk
pub fn load_graph(path: &Path) -> IoResult<Graph> {
    let registry = FormatRegistry::with_defaults();
    let document = registry.reader_for_path(path)?.read(path)?;
    let graph = Graph::from_document(&document)?;
    debug!(
        path = %path.display(),
        nodes = graph.nodes().len(),
        links = graph.links().len(),
        "loaded graph"
    );
    Ok(graph)
}
