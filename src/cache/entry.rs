//! Cache entries: the memoised outcome of a retrieval attempt.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Outcome classification of a retrieval attempt.
///
/// `CacheLookup` and `Undetermined` are transient; every other status is
/// terminal and is stamped with a timestamp when reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// Marker meaning "not yet acted upon in this pass"; visible only to the
    /// retrieval that created the entry.
    CacheLookup,
    /// Retrieval has begun but no outcome is known yet.
    Undetermined,
    /// The document was fetched, parsed, and its graph replaced.
    Success,
    /// The RDFizer completed but reported semantic failure.
    Failure,
    /// No RDFizer is registered for the representation's media type.
    BadMediaType,
    /// The dereferencer failed: network, I/O, or a refused fetch.
    DereferencerError,
    /// The IRI redirects to an already-cached document, or fetching it would
    /// otherwise be redundant.
    RedirectsToCached,
    /// The RDFizer aborted mid-stream.
    ParseError,
}

impl Status {
    /// Whether this status ends a retrieval. Terminal statuses are the only
    /// ones persisted at commit.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Status::CacheLookup | Status::Undetermined)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::CacheLookup => "CacheLookup",
            Status::Undetermined => "Undetermined",
            Status::Success => "Success",
            Status::Failure => "Failure",
            Status::BadMediaType => "BadMediaType",
            Status::DereferencerError => "DereferencerError",
            Status::RedirectsToCached => "RedirectsToCached",
            Status::ParseError => "ParseError",
        };
        f.write_str(s)
    }
}

/// Memoised record of the last retrieval attempt for one graph IRI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dereferencer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rdfizer: Option<String>,
}

impl CacheEntry {
    pub fn new(status: Status) -> Self {
        let mut entry = CacheEntry {
            status: Status::Undetermined,
            timestamp: None,
            media_type: None,
            dereferencer: None,
            rdfizer: None,
        };
        entry.set_status(status);
        entry
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Sets the status, stamping the timestamp when the status is terminal.
    pub fn set_status(&mut self, status: Status) {
        self.status = status;
        if status.is_terminal() {
            self.timestamp = Some(Utc::now());
        }
    }

    /// Moment the entry last reached a terminal status.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    /// Media type actually used for RDFization, post-negotiation.
    pub fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }

    pub fn set_media_type(&mut self, media_type: impl Into<String>) {
        self.media_type = Some(media_type.into());
    }

    /// Symbolic name of the dereferencer used.
    pub fn dereferencer(&self) -> Option<&str> {
        self.dereferencer.as_deref()
    }

    pub fn set_dereferencer(&mut self, name: impl Into<String>) {
        self.dereferencer = Some(name.into());
    }

    /// Symbolic name of the RDFizer used.
    pub fn rdfizer(&self) -> Option<&str> {
        self.rdfizer.as_deref()
    }

    pub fn set_rdfizer(&mut self, name: impl Into<String>) {
        self.rdfizer = Some(name.into());
    }

    /// Serialises the entry for storage as the object of a `memo` statement.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Reconstructs an entry from a `memo` statement's object.
    pub fn decode(encoded: &str) -> Result<Self> {
        Ok(serde_json::from_str(encoded)?)
    }
}
