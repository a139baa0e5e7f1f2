//! Core RDF term types.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::vocab;
use crate::{CacheError, Result};

/// Counter backing process-unique blank node identifiers.
static BLANK_NODE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// An IRI term.
///
/// Holds an absolute IRI. [`NamedNode::new`] validates the IRI; callers that
/// have already validated their input (parsers, vocabulary constants) may use
/// [`NamedNode::new_unchecked`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NamedNode {
    iri: String,
}

impl NamedNode {
    /// Creates a named node, validating that the IRI is absolute.
    pub fn new(iri: impl Into<String>) -> Result<Self> {
        let iri = iri.into();
        oxiri::Iri::parse(iri.as_str())
            .map_err(|e| CacheError::Iri(format!("{iri}: {e}")))?;
        Ok(NamedNode { iri })
    }

    /// Creates a named node without validation.
    pub fn new_unchecked(iri: impl Into<String>) -> Self {
        NamedNode { iri: iri.into() }
    }

    /// Returns the IRI as a string slice.
    pub fn as_str(&self) -> &str {
        &self.iri
    }

    /// Consumes the node and returns the IRI.
    pub fn into_string(self) -> String {
        self.iri
    }
}

impl fmt::Display for NamedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.iri)
    }
}

/// A blank node identifier, local to the document or store that minted it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlankNode {
    id: String,
}

impl BlankNode {
    /// Creates a blank node with the given identifier, with or without the
    /// `_:` prefix.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let id = id.strip_prefix("_:").map(str::to_owned).unwrap_or(id);
        BlankNode { id }
    }

    /// Creates a blank node with a process-unique identifier.
    pub fn new_unique() -> Self {
        let n = BLANK_NODE_COUNTER.fetch_add(1, Ordering::Relaxed);
        BlankNode { id: format!("b{n}") }
    }

    /// Returns the identifier, without the `_:` prefix.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for BlankNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_:{}", self.id)
    }
}

/// An RDF literal: a lexical value with a datatype and an optional language
/// tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Literal {
    value: String,
    language: Option<String>,
    datatype: NamedNode,
}

impl Literal {
    /// Creates an `xsd:string` literal.
    pub fn new(value: impl Into<String>) -> Self {
        Literal {
            value: value.into(),
            language: None,
            datatype: vocab::xsd::STRING.clone(),
        }
    }

    /// Creates a language-tagged literal (`rdf:langString`).
    pub fn new_language_tagged(value: impl Into<String>, language: impl Into<String>) -> Self {
        Literal {
            value: value.into(),
            language: Some(language.into().to_ascii_lowercase()),
            datatype: vocab::rdf::LANG_STRING.clone(),
        }
    }

    /// Creates a literal with an explicit datatype.
    pub fn new_typed(value: impl Into<String>, datatype: NamedNode) -> Self {
        Literal {
            value: value.into(),
            language: None,
            datatype,
        }
    }

    /// Returns the lexical value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns the language tag, if any.
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Returns the datatype IRI.
    pub fn datatype(&self) -> &NamedNode {
        &self.datatype
    }
}

fn escape_literal(value: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for c in value.chars() {
        match c {
            '\\' => write!(f, "\\\\")?,
            '"' => write!(f, "\\\"")?,
            '\n' => write!(f, "\\n")?,
            '\r' => write!(f, "\\r")?,
            '\t' => write!(f, "\\t")?,
            _ => write!(f, "{c}")?,
        }
    }
    Ok(())
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"")?;
        escape_literal(&self.value, f)?;
        write!(f, "\"")?;
        if let Some(language) = &self.language {
            write!(f, "@{language}")
        } else if self.datatype != *vocab::xsd::STRING {
            write!(f, "^^{}", self.datatype)
        } else {
            Ok(())
        }
    }
}

/// Any RDF term that may appear in the object position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Term {
    NamedNode(NamedNode),
    BlankNode(BlankNode),
    Literal(Literal),
}

impl Term {
    pub fn as_named_node(&self) -> Option<&NamedNode> {
        match self {
            Term::NamedNode(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Term::Literal(l) => Some(l),
            _ => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::NamedNode(n) => n.fmt(f),
            Term::BlankNode(b) => b.fmt(f),
            Term::Literal(l) => l.fmt(f),
        }
    }
}

impl From<NamedNode> for Term {
    fn from(n: NamedNode) -> Self {
        Term::NamedNode(n)
    }
}

impl From<BlankNode> for Term {
    fn from(b: BlankNode) -> Self {
        Term::BlankNode(b)
    }
}

impl From<Literal> for Term {
    fn from(l: Literal) -> Self {
        Term::Literal(l)
    }
}

/// A term that may appear in the subject position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Subject {
    NamedNode(NamedNode),
    BlankNode(BlankNode),
}

impl Subject {
    pub fn as_named_node(&self) -> Option<&NamedNode> {
        match self {
            Subject::NamedNode(n) => Some(n),
            _ => None,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::NamedNode(n) => n.fmt(f),
            Subject::BlankNode(b) => b.fmt(f),
        }
    }
}

impl From<NamedNode> for Subject {
    fn from(n: NamedNode) -> Self {
        Subject::NamedNode(n)
    }
}

impl From<BlankNode> for Subject {
    fn from(b: BlankNode) -> Self {
        Subject::BlankNode(b)
    }
}

impl From<Subject> for Term {
    fn from(s: Subject) -> Self {
        match s {
            Subject::NamedNode(n) => Term::NamedNode(n),
            Subject::BlankNode(b) => Term::BlankNode(b),
        }
    }
}
