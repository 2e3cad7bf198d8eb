//! Remote ontology retrieval.
//!
//! The core only needs "fetch bytes for an IRI, or fail with a reason";
//! everything else about transport belongs to the embedder. A single
//! blocking client is shared across calls.

use crate::errors::{EnvError, Result};
use crate::reader::{self, LoadedGraph};
use once_cell::sync::Lazy;
use oxigraph::io::RdfFormat;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use std::time::Duration;
use tracing::debug;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Media types negotiated for RDF content, highest priority first.
const ACCEPT_HEADER: &str = "text/turtle, application/rdf+xml;q=0.9, \
     application/n-triples;q=0.8, application/xml;q=0.5, */*;q=0.1";

static CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .expect("failed to build HTTP client")
});

fn fetch_error(url: &str, reason: impl ToString) -> EnvError {
    EnvError::FetchFailure {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

/// Fetches raw bytes for `url` plus the format advertised by the server
/// or implied by the URL path.
pub fn fetch_bytes(url: &str) -> Result<(Vec<u8>, Option<RdfFormat>)> {
    debug!(url, "fetching remote ontology");
    let response = CLIENT
        .get(url)
        .header(ACCEPT, ACCEPT_HEADER)
        .send()
        .map_err(|e| fetch_error(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(fetch_error(url, format!("HTTP status {status}")));
    }

    let format = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .and_then(|ct| ct.split(';').next())
        .and_then(|ct| RdfFormat::from_media_type(ct.trim()))
        .or_else(|| format_from_url(url));

    let bytes = response
        .bytes()
        .map_err(|e| fetch_error(url, e))?
        .to_vec();
    Ok((bytes, format))
}

/// Fetches and parses a remote ontology document.
pub fn fetch_graph(url: &str) -> Result<LoadedGraph> {
    let (bytes, format) = fetch_bytes(url)?;
    let graph = reader::parse_bytes(&bytes, format)
        .map_err(|e| fetch_error(url, format!("unparseable response: {e}")))?;
    let checksum = reader::checksum(&bytes);
    Ok(LoadedGraph { graph, checksum })
}

fn format_from_url(url: &str) -> Option<RdfFormat> {
    let path = url
        .split('#')
        .next()
        .and_then(|u| u.split('?').next())
        .unwrap_or(url);
    path.rsplit('.')
        .next()
        .filter(|ext| !ext.contains('/'))
        .and_then(RdfFormat::from_extension)
}
