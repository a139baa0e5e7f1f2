//! RDF data model: terms, statements, and IRI utilities.

pub mod iri;
mod statement;
mod term;

pub use statement::{GraphName, Statement};
pub use term::{BlankNode, Literal, NamedNode, Subject, Term};
