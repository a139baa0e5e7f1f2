//! Engine configuration.
//!
//! All knobs are collected in a concrete record populated at construction
//! time; there is no global property lookup.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::CacheError;

/// Smallest accepted in-memory metadata capacity. Requests below this are
/// overridden with a warning.
pub const MINIMUM_CACHE_CAPACITY: usize = 100;

/// Default in-memory metadata capacity.
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Default cache entry lifetime: one week, in seconds.
pub const DEFAULT_CACHE_LIFETIME_SECS: u64 = 604_800;

/// How datatyped literals encountered during RDFization are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatatypeHandling {
    /// Accept lexical forms as-is.
    #[default]
    Ignore,
    /// Reject documents containing ill-formed lexical forms.
    Verify,
    /// Rewrite lexical forms of the core XSD types to canonical form.
    Normalize,
}

impl FromStr for DatatypeHandling {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ignore" => Ok(DatatypeHandling::Ignore),
            "verify" => Ok(DatatypeHandling::Verify),
            "normalize" => Ok(DatatypeHandling::Normalize),
            other => Err(CacheError::Config(format!(
                "no such datatype handling policy: {other}"
            ))),
        }
    }
}

/// Configuration for a [`LinkedDataCache`](crate::LinkedDataCache).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Capacity of the in-memory metadata index, floored at
    /// [`MINIMUM_CACHE_CAPACITY`].
    pub memory_cache_capacity: usize,
    /// Seconds before a terminal cache entry is considered expired.
    pub cache_lifetime_secs: u64,
    /// Datatype handling policy applied by the verbatim RDFizers.
    pub datatype_handling: DatatypeHandling,
    /// Whether fetched blank nodes are kept as blank nodes. When false, each
    /// is replaced by a freshly minted IRI.
    pub use_blank_nodes: bool,
    /// Whether the query layer should dereference IRIs in subject position.
    pub deref_subjects: bool,
    /// Whether the query layer should dereference IRIs in predicate position.
    pub deref_predicates: bool,
    /// Whether the query layer should dereference IRIs in object position.
    pub deref_objects: bool,
    /// Whether the query layer should dereference IRIs in context position.
    pub deref_contexts: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            memory_cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_lifetime_secs: DEFAULT_CACHE_LIFETIME_SECS,
            datatype_handling: DatatypeHandling::Ignore,
            use_blank_nodes: false,
            deref_subjects: true,
            deref_predicates: false,
            deref_objects: true,
            deref_contexts: false,
        }
    }
}

impl CacheConfig {
    /// Returns the configured entry lifetime as a [`Duration`].
    pub fn cache_lifetime(&self) -> Duration {
        Duration::from_secs(self.cache_lifetime_secs)
    }
}
