//! RDFizers: media-type-specific translators from byte streams to
//! statements.

mod verbatim;

pub use verbatim::VerbatimRdfizer;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::sync::Arc;

use crate::cache::entry::Status;
use crate::pipeline::StatementHandler;
use crate::{CacheError, Result};

/// Concrete RDF syntaxes the verbatim RDFizers can parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RdfFormat {
    Turtle,
    NTriples,
    TriG,
    NQuads,
    RdfXml,
}

impl RdfFormat {
    pub const ALL: [RdfFormat; 5] = [
        RdfFormat::Turtle,
        RdfFormat::NTriples,
        RdfFormat::TriG,
        RdfFormat::NQuads,
        RdfFormat::RdfXml,
    ];

    /// The canonical media type for this format.
    pub fn media_type(&self) -> &'static str {
        match self {
            RdfFormat::Turtle => "text/turtle",
            RdfFormat::NTriples => "application/n-triples",
            RdfFormat::TriG => "application/trig",
            RdfFormat::NQuads => "application/n-quads",
            RdfFormat::RdfXml => "application/rdf+xml",
        }
    }

    /// Every media type under which this format is served in the wild.
    pub fn media_types(&self) -> &'static [&'static str] {
        match self {
            RdfFormat::Turtle => &["text/turtle", "application/x-turtle"],
            RdfFormat::NTriples => &["application/n-triples"],
            RdfFormat::TriG => &["application/trig", "application/x-trig"],
            RdfFormat::NQuads => &["application/n-quads", "text/x-nquads"],
            RdfFormat::RdfXml => &["application/rdf+xml", "application/xml"],
        }
    }

    /// Guesses a format from a file extension.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "ttl" | "turtle" => Some(RdfFormat::Turtle),
            "nt" | "ntriples" => Some(RdfFormat::NTriples),
            "trig" => Some(RdfFormat::TriG),
            "nq" | "nquads" => Some(RdfFormat::NQuads),
            "rdf" | "rdfs" | "owl" | "rdfxml" => Some(RdfFormat::RdfXml),
            _ => None,
        }
    }
}

impl fmt::Display for RdfFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RdfFormat::Turtle => "turtle",
            RdfFormat::NTriples => "ntriples",
            RdfFormat::TriG => "trig",
            RdfFormat::NQuads => "nquads",
            RdfFormat::RdfXml => "rdfxml",
        };
        f.write_str(s)
    }
}

/// Translates one representation's byte stream into statements.
///
/// Implementations report their outcome as a [`Status`] (`Success`,
/// `Failure`, or `ParseError`), tolerate truncated input, and emit
/// statements only through the handler; they never touch the store.
pub trait Rdfizer: Send + Sync {
    /// Symbolic name recorded in caching metadata.
    fn name(&self) -> &str;

    fn rdfize(
        &self,
        input: &mut dyn Read,
        handler: &mut dyn StatementHandler,
        base_iri: &str,
    ) -> Status;
}

struct MediaTypeEntry {
    media_type: String,
    quality: f64,
    rdfizer: Arc<dyn Rdfizer>,
}

/// Maps media types to RDFizers with content-negotiation quality weights.
#[derive(Default)]
pub struct RdfizerRegistry {
    entries: HashMap<String, MediaTypeEntry>,
    accept_header: Option<String>,
}

impl RdfizerRegistry {
    pub fn new() -> Self {
        RdfizerRegistry::default()
    }

    /// Associates an RDFizer with a media type.
    ///
    /// The quality weight expresses the client's preference for the media
    /// type during HTTP content negotiation and must lie in `(0, 1]`.
    /// Registering a media type twice overrides the previous registration
    /// with a warning.
    pub fn register(
        &mut self,
        media_type: &str,
        rdfizer: Arc<dyn Rdfizer>,
        quality: f64,
    ) -> Result<()> {
        if !(quality > 0.0 && quality <= 1.0) {
            return Err(CacheError::Registry(format!(
                "quality factor {quality} for {media_type} must be between 0 and 1"
            )));
        }

        tracing::info!("adding RDFizer for media type {media_type}: {}", rdfizer.name());
        if self.entries.contains_key(media_type) {
            tracing::warn!("overriding already-registered RDFizer for media type {media_type}");
        }

        self.entries.insert(
            media_type.to_owned(),
            MediaTypeEntry {
                media_type: media_type.to_owned(),
                quality,
                rdfizer,
            },
        );
        self.accept_header = None;
        Ok(())
    }

    /// Returns the RDFizer registered for a media type.
    pub fn get(&self, media_type: &str) -> Option<Arc<dyn Rdfizer>> {
        self.entries.get(media_type).map(|e| e.rdfizer.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns an HTTP Accept header matching the registered media types,
    /// ordered from highest to lowest quality. `;q=` is omitted for quality
    /// 1.0. The string is cached until the registry is next mutated.
    pub fn accept_header(&mut self) -> &str {
        if self.accept_header.is_none() {
            let mut entries: Vec<&MediaTypeEntry> = self.entries.values().collect();
            entries.sort_by(|a, b| {
                b.quality
                    .partial_cmp(&a.quality)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.media_type.cmp(&b.media_type))
            });

            let mut header = String::new();
            for entry in entries {
                if !header.is_empty() {
                    header.push_str(", ");
                }
                header.push_str(&entry.media_type);
                if entry.quality != 1.0 {
                    header.push_str(&format!(";q={}", entry.quality));
                }
            }
            self.accept_header = Some(header);
        }
        self.accept_header.as_deref().unwrap_or_default()
    }
}
