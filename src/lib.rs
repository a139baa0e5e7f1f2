//! # ldcache
//!
//! A caching engine for a dynamic set of RDF graphs collected from the Web.
//!
//! Given an IRI, the engine locates a scheme-specific dereferencer, retrieves
//! a representation of the document, translates it into RDF statements using a
//! media-type-specific RDFizer, stores the statements under a deterministic
//! named graph in an underlying triple store, and records metadata describing
//! the outcome so that subsequent requests for the same IRI can be answered
//! from cache or declined cheaply. It is meant to sit beneath a query layer
//! which transparently requests dereferencing of previously-unseen IRIs.
//!
//! ## Example
//!
//! ```no_run
//! use ldcache::{CacheConfig, LinkedDataCache};
//! use ldcache::model::NamedNode;
//! use ldcache::store::MemoryStore;
//!
//! # fn main() -> ldcache::Result<()> {
//! let store = MemoryStore::new();
//! let cache = LinkedDataCache::create_default(&store, CacheConfig::default())?;
//!
//! let iri = NamedNode::new("http://example.org/resource")?;
//! let conn = cache.connection();
//! let status = cache.retrieve(&iri, conn.as_ref())?;
//! println!("retrieval outcome: {status}");
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod deref;
pub mod model;
pub mod pipeline;
pub mod rdfize;
pub mod store;
pub mod vocab;

pub use cache::entry::{CacheEntry, Status};
pub use cache::LinkedDataCache;
pub use config::CacheConfig;

/// Core error type for caching operations.
///
/// Retrieval-time failures (network, unparseable documents, unknown media
/// types) are *not* reported through this type; they are classified into the
/// [`Status`] taxonomy and recorded as caching metadata. `CacheError` covers
/// programmer and environment errors: invalid IRIs, misconfigured registries,
/// and store-level I/O.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Invalid IRI: {0}")]
    Iri(String),
    #[error("Store error: {0}")]
    Store(String),
    #[error("Dereferencer error: {0}")]
    Dereference(String),
    #[error("Registry error: {0}")]
    Registry(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Metadata encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for caching operations.
pub type Result<T> = std::result::Result<T, CacheError>;
