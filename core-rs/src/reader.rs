//! Parsing of ontology documents into in-memory graphs.
//!
//! The RDF codec itself is oxigraph's; this module only picks a format and
//! falls back through the common serializations when the source does not
//! advertise one.

use crate::errors::{EnvError, Result};
use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::model::{Graph, Triple};
use std::path::Path;
use tracing::debug;

/// Formats tried, in order, when parsing bytes of unknown serialization.
const FORMAT_CANDIDATES: [RdfFormat; 3] =
    [RdfFormat::Turtle, RdfFormat::RdfXml, RdfFormat::NTriples];

/// A parsed ontology document plus the checksum of its raw bytes,
/// used for staleness detection on update.
#[derive(Debug)]
pub struct LoadedGraph {
    pub graph: Graph,
    pub checksum: String,
}

/// Guesses the RDF format from a file extension.
pub fn format_for_path(path: &Path) -> Option<RdfFormat> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| match ext {
            "ttl" => Some(RdfFormat::Turtle),
            "owl" | "xml" | "rdf" => Some(RdfFormat::RdfXml),
            "n3" => Some(RdfFormat::Turtle),
            "nt" => Some(RdfFormat::NTriples),
            _ => None,
        })
}

/// Checksum of raw document bytes, hex-encoded for the registry metadata.
pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(crc32fast::hash(bytes).to_be_bytes())
}

fn parse_with_format(bytes: &[u8], format: RdfFormat) -> Result<Graph> {
    let parser = RdfParser::from_format(format).for_reader(std::io::Cursor::new(bytes));
    let mut graph = Graph::new();
    for quad in parser {
        let quad = quad.map_err(|e| EnvError::Parse(e.to_string()))?;
        graph.insert(&Triple::new(quad.subject, quad.predicate, quad.object));
    }
    Ok(graph)
}

/// Parses bytes into a graph, trying `preferred` first and then the other
/// common serializations.
pub fn parse_bytes(bytes: &[u8], preferred: Option<RdfFormat>) -> Result<Graph> {
    let mut candidates: Vec<RdfFormat> = FORMAT_CANDIDATES.to_vec();
    if let Some(p) = preferred {
        candidates.retain(|f| *f != p);
        candidates.insert(0, p);
    }

    let mut last_error = None;
    for format in candidates {
        match parse_with_format(bytes, format) {
            Ok(graph) => return Ok(graph),
            Err(e) => last_error = Some(e),
        }
    }
    Err(last_error
        .unwrap_or_else(|| EnvError::Parse("no RDF format candidates".to_string())))
}

/// Reads and parses an ontology file from disk.
pub fn read_file(path: &Path) -> Result<LoadedGraph> {
    debug!(path = %path.display(), "reading ontology file");
    let bytes = std::fs::read(path)?;
    let graph = parse_bytes(&bytes, format_for_path(path))?;
    Ok(LoadedGraph {
        graph,
        checksum: checksum(&bytes),
    })
}
