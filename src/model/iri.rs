//! IRI manipulation helpers used throughout the retrieval pipeline.

/// Returns the IRI with any fragment identifier removed.
///
/// The fragment-stripped form names both the retrieval target and the graph
/// under which fetched statements are stored, so `http://ex/a#b` and
/// `http://ex/a` share one cache entry.
pub fn strip_fragment(iri: &str) -> &str {
    match iri.find('#') {
        Some(i) => &iri[..i],
        None => iri,
    }
}

/// Returns the namespace portion of an IRI: everything up to and including
/// the first `#`, or failing that the last `/`.
///
/// Used as the base IRI when parsing a retrieved document, so that relative
/// references resolve in the fragment context of the original IRI.
pub fn namespace_of(iri: &str) -> &str {
    if let Some(i) = iri.find('#') {
        &iri[..=i]
    } else if let Some(i) = iri.rfind('/') {
        &iri[..=i]
    } else {
        iri
    }
}

/// Returns the lowercased scheme of an absolute IRI, or `None` if the IRI
/// cannot be parsed.
pub fn scheme_of(iri: &str) -> Option<String> {
    url::Url::parse(iri).ok().map(|u| u.scheme().to_owned())
}
