//! Dereferencing of file IRIs.

use std::fs::File;

use crate::deref::{Dereferencer, Representation};
use crate::rdfize::RdfFormat;
use crate::{CacheError, Result};

/// Opens `file:` IRIs from the local filesystem.
///
/// The media type is guessed from the path extension; an unrecognised
/// extension yields an empty media type, which the engine classifies as
/// `BadMediaType` downstream.
#[derive(Debug, Default)]
pub struct FileDereferencer;

impl FileDereferencer {
    pub fn new() -> Self {
        FileDereferencer
    }
}

impl Dereferencer for FileDereferencer {
    fn name(&self) -> &str {
        "FileDereferencer"
    }

    fn dereference(&self, iri: &str) -> Result<Option<Representation>> {
        let url = url::Url::parse(iri).map_err(|e| CacheError::Iri(format!("{iri}: {e}")))?;
        let path = url
            .to_file_path()
            .map_err(|_| CacheError::Dereference(format!("not a local file IRI: {iri}")))?;

        let media_type = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(RdfFormat::from_extension)
            .map(|format| format.media_type())
            .unwrap_or_default();

        let file = File::open(&path)?;
        Ok(Some(Representation::new(media_type, Box::new(file))))
    }
}
