//! Statements and named graph identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{NamedNode, Subject, Term};

/// The graph component of a statement: a named graph or the default graph.
///
/// The default graph holds the engine's caching metadata; fetched documents
/// live in named graphs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum GraphName {
    NamedNode(NamedNode),
    #[default]
    DefaultGraph,
}

impl GraphName {
    pub fn as_named_node(&self) -> Option<&NamedNode> {
        match self {
            GraphName::NamedNode(n) => Some(n),
            GraphName::DefaultGraph => None,
        }
    }
}

impl From<NamedNode> for GraphName {
    fn from(n: NamedNode) -> Self {
        GraphName::NamedNode(n)
    }
}

/// An RDF statement: the 4-tuple (subject, predicate, object, context).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Statement {
    subject: Subject,
    predicate: NamedNode,
    object: Term,
    context: GraphName,
}

impl Statement {
    pub fn new(
        subject: impl Into<Subject>,
        predicate: NamedNode,
        object: impl Into<Term>,
        context: impl Into<GraphName>,
    ) -> Self {
        Statement {
            subject: subject.into(),
            predicate,
            object: object.into(),
            context: context.into(),
        }
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    pub fn predicate(&self) -> &NamedNode {
        &self.predicate
    }

    pub fn object(&self) -> &Term {
        &self.object
    }

    pub fn context(&self) -> &GraphName {
        &self.context
    }

    /// Returns the statement with its context replaced.
    pub fn with_context(self, context: GraphName) -> Self {
        Statement { context, ..self }
    }

    /// Returns the statement with its subject replaced.
    pub fn with_subject(self, subject: Subject) -> Self {
        Statement { subject, ..self }
    }

    /// Returns the statement with its object replaced.
    pub fn with_object(self, object: Term) -> Self {
        Statement { object, ..self }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)?;
        if let GraphName::NamedNode(g) = &self.context {
            write!(f, " {g}")?;
        }
        write!(f, " .")
    }
}
