//! Fixed vocabulary terms used by the caching engine.

use std::sync::LazyLock;

use crate::model::NamedNode;

/// Caching metadata vocabulary.
///
/// Metadata statements live in the default graph of the underlying store:
/// `memo` associates a graph IRI with its serialised cache entry, and
/// `redirectsTo` links a redirected IRI to its target.
pub mod cache {
    use super::*;

    /// The caching metadata namespace IRI.
    pub const NAMESPACE: &str = "http://fortytwo.net/2012/02/linkeddata#";

    /// Associates a graph IRI with its serialised cache entry.
    pub static MEMO: LazyLock<NamedNode> =
        LazyLock::new(|| NamedNode::new_unchecked(format!("{NAMESPACE}memo")));

    /// Links a redirected IRI to the IRI it redirects to.
    pub static REDIRECTS_TO: LazyLock<NamedNode> =
        LazyLock::new(|| NamedNode::new_unchecked(format!("{NAMESPACE}redirectsTo")));
}

/// RDF vocabulary terms.
pub mod rdf {
    use super::*;

    pub const NAMESPACE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";

    /// rdf:langString, the datatype of language-tagged literals.
    pub static LANG_STRING: LazyLock<NamedNode> =
        LazyLock::new(|| NamedNode::new_unchecked(format!("{NAMESPACE}langString")));
}

/// XML Schema datatype terms.
pub mod xsd {
    use super::*;

    pub const NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema#";

    pub static STRING: LazyLock<NamedNode> =
        LazyLock::new(|| NamedNode::new_unchecked(format!("{NAMESPACE}string")));

    pub static BOOLEAN: LazyLock<NamedNode> =
        LazyLock::new(|| NamedNode::new_unchecked(format!("{NAMESPACE}boolean")));

    pub static INTEGER: LazyLock<NamedNode> =
        LazyLock::new(|| NamedNode::new_unchecked(format!("{NAMESPACE}integer")));

    pub static DECIMAL: LazyLock<NamedNode> =
        LazyLock::new(|| NamedNode::new_unchecked(format!("{NAMESPACE}decimal")));

    pub static DOUBLE: LazyLock<NamedNode> =
        LazyLock::new(|| NamedNode::new_unchecked(format!("{NAMESPACE}double")));
}
