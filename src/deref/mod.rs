//! Dereferencers: scheme-specific fetchers producing representations.

mod file;
mod http;

pub use file::FileDereferencer;
pub use http::{HttpDereferencer, NON_RDF_EXTENSIONS};

use std::io::Read;

use crate::Result;

/// A media-typed, read-once byte stream returned by a dereferencer.
///
/// Consumers must read the stream to EOF or drop it; re-reads are not
/// possible, which [`Representation::into_stream`] enforces by consuming the
/// value.
pub struct Representation {
    media_type: String,
    stream: Box<dyn Read + Send>,
}

impl Representation {
    pub fn new(media_type: impl Into<String>, stream: Box<dyn Read + Send>) -> Self {
        Representation {
            media_type: media_type.into(),
            stream,
        }
    }

    /// The declared media type; may be empty when the origin declared none.
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Consumes the representation, yielding its byte stream.
    pub fn into_stream(self) -> Box<dyn Read + Send> {
        self.stream
    }
}

/// A scheme-specific fetcher.
///
/// `Ok(None)` signals that dereferencing would be redundant (for example the
/// IRI redirects to an already-cached document); the engine records this as
/// `RedirectsToCached`. Errors are classified as `DereferencerError`.
pub trait Dereferencer: Send + Sync {
    /// Symbolic name recorded in caching metadata.
    fn name(&self) -> &str;

    fn dereference(&self, iri: &str) -> Result<Option<Representation>>;
}
