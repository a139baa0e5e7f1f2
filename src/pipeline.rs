//! The per-retrieval statement pipeline.
//!
//! Assembled fresh for every retrieval as an explicit chain of consumers:
//! a [`SingleContextRewriter`] pins every inbound statement to the target
//! graph, an optional [`BNodeToIriFilter`] replaces blank nodes with minted
//! IRIs, and a [`Buffer`] holds everything until the RDFizer has reported
//! success. Partial parses therefore never reach the store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::model::{GraphName, NamedNode, Statement, Subject, Term};
use crate::store::StatementSink;
use crate::{vocab, Result};

/// Receiver for the statement stream produced by an RDFizer.
///
/// Namespace and comment events are ignored by default; the pipeline cares
/// only about statements.
pub trait StatementHandler {
    fn statement(&mut self, statement: Statement) -> Result<()>;

    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        Ok(())
    }

    fn namespace(&mut self, _prefix: &str, _iri: &str) -> Result<()> {
        Ok(())
    }

    fn comment(&mut self, _comment: &str) -> Result<()> {
        Ok(())
    }
}

/// Rewrites the context of every statement to a single named graph,
/// overwriting any context the source document carried.
pub struct SingleContextRewriter<H> {
    inner: H,
    context: GraphName,
}

impl<H> SingleContextRewriter<H> {
    pub fn new(inner: H, graph: NamedNode) -> Self {
        SingleContextRewriter {
            inner,
            context: GraphName::NamedNode(graph),
        }
    }
}

impl<H: StatementHandler> StatementHandler for SingleContextRewriter<H> {
    fn statement(&mut self, statement: Statement) -> Result<()> {
        self.inner
            .statement(statement.with_context(self.context.clone()))
    }

    fn start(&mut self) -> Result<()> {
        self.inner.start()
    }

    fn end(&mut self) -> Result<()> {
        self.inner.end()
    }

    fn namespace(&mut self, prefix: &str, iri: &str) -> Result<()> {
        self.inner.namespace(prefix, iri)
    }

    fn comment(&mut self, comment: &str) -> Result<()> {
        self.inner.comment(comment)
    }
}

/// Counter backing minted blank node IRIs; process-wide so that runs never
/// collide.
static MINTED_IRI_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Replaces every blank node with a freshly minted IRI.
///
/// The replacement is consistent within one run and is not persisted across
/// retrievals.
pub struct BNodeToIriFilter<H> {
    inner: H,
    mapping: HashMap<String, NamedNode>,
}

impl<H> BNodeToIriFilter<H> {
    pub fn new(inner: H) -> Self {
        BNodeToIriFilter {
            inner,
            mapping: HashMap::new(),
        }
    }

    fn minted(&mut self, id: &str) -> NamedNode {
        if let Some(iri) = self.mapping.get(id) {
            return iri.clone();
        }
        let n = MINTED_IRI_COUNTER.fetch_add(1, Ordering::Relaxed);
        let iri = NamedNode::new_unchecked(format!("{}bnode-{n}", vocab::cache::NAMESPACE));
        self.mapping.insert(id.to_owned(), iri.clone());
        iri
    }
}

impl<H: StatementHandler> StatementHandler for BNodeToIriFilter<H> {
    fn statement(&mut self, statement: Statement) -> Result<()> {
        let statement = match statement.subject() {
            Subject::BlankNode(b) => {
                let iri = self.minted(b.id());
                statement.with_subject(Subject::NamedNode(iri))
            }
            _ => statement,
        };
        let statement = match statement.object() {
            Term::BlankNode(b) => {
                let iri = self.minted(b.id());
                statement.with_object(Term::NamedNode(iri))
            }
            _ => statement,
        };
        self.inner.statement(statement)
    }

    fn start(&mut self) -> Result<()> {
        self.inner.start()
    }

    fn end(&mut self) -> Result<()> {
        self.inner.end()
    }

    fn namespace(&mut self, prefix: &str, iri: &str) -> Result<()> {
        self.inner.namespace(prefix, iri)
    }

    fn comment(&mut self, comment: &str) -> Result<()> {
        self.inner.comment(comment)
    }
}

/// Collects statements in memory until the outcome of the RDFization pass is
/// known.
///
/// The handle is cheaply cloneable; the orchestrator keeps one clone outside
/// the pipeline and drains it with [`Buffer::flush`] only after the RDFizer
/// reports success. Dropping the buffer discards its contents.
#[derive(Clone, Default)]
pub struct Buffer {
    statements: Arc<Mutex<Vec<Statement>>>,
}

impl Buffer {
    pub fn new() -> Self {
        Buffer::default()
    }

    /// Number of buffered statements.
    pub fn len(&self) -> usize {
        self.statements.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drains every buffered statement into the sink, in arrival order.
    pub fn flush(&self, sink: &mut dyn StatementSink) -> Result<()> {
        let statements: Vec<Statement> = self.statements.lock().drain(..).collect();
        for statement in &statements {
            sink.put(statement)?;
        }
        Ok(())
    }
}

impl StatementHandler for Buffer {
    fn statement(&mut self, statement: Statement) -> Result<()> {
        self.statements.lock().push(statement);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BlankNode;

    struct CollectingSink(Vec<Statement>);

    impl StatementSink for CollectingSink {
        fn put(&mut self, statement: &Statement) -> Result<()> {
            self.0.push(statement.clone());
            Ok(())
        }
    }

    fn n(iri: &str) -> NamedNode {
        NamedNode::new_unchecked(iri)
    }

    #[test]
    fn test_context_rewrite_overwrites_source_context() {
        let buffer = Buffer::new();
        let mut pipe = SingleContextRewriter::new(buffer.clone(), n("http://ex/g"));

        let st = Statement::new(
            n("http://ex/s"),
            n("http://ex/p"),
            n("http://ex/o"),
            GraphName::NamedNode(n("http://ex/other")),
        );
        pipe.statement(st).unwrap();

        let mut sink = CollectingSink(Vec::new());
        buffer.flush(&mut sink).unwrap();
        assert_eq!(
            sink.0[0].context().as_named_node().map(NamedNode::as_str),
            Some("http://ex/g")
        );
    }

    #[test]
    fn test_bnode_mapping_is_consistent_within_a_run() {
        let buffer = Buffer::new();
        let mut pipe = BNodeToIriFilter::new(buffer.clone());

        let b = BlankNode::new("shared");
        pipe.statement(Statement::new(
            b.clone(),
            n("http://ex/p"),
            n("http://ex/o"),
            GraphName::DefaultGraph,
        ))
        .unwrap();
        pipe.statement(Statement::new(
            n("http://ex/s"),
            n("http://ex/p"),
            b,
            GraphName::DefaultGraph,
        ))
        .unwrap();

        let mut sink = CollectingSink(Vec::new());
        buffer.flush(&mut sink).unwrap();

        let minted_subject = match sink.0[0].subject() {
            Subject::NamedNode(iri) => iri.clone(),
            other => panic!("blank node survived the filter: {other}"),
        };
        assert!(minted_subject.as_str().starts_with(vocab::cache::NAMESPACE));
        assert_eq!(sink.0[1].object(), &Term::NamedNode(minted_subject));
    }

    #[test]
    fn test_distinct_bnodes_get_distinct_iris() {
        let buffer = Buffer::new();
        let mut pipe = BNodeToIriFilter::new(buffer.clone());
        pipe.statement(Statement::new(
            BlankNode::new("a"),
            n("http://ex/p"),
            BlankNode::new("b"),
            GraphName::DefaultGraph,
        ))
        .unwrap();

        let mut sink = CollectingSink(Vec::new());
        buffer.flush(&mut sink).unwrap();
        let subject = Term::from(sink.0[0].subject().clone());
        assert_ne!(&subject, sink.0[0].object());
    }

    #[test]
    fn test_buffer_flush_preserves_order_and_drains() {
        let mut buffer = Buffer::new();
        for i in 0..3 {
            buffer
                .statement(Statement::new(
                    n(&format!("http://ex/s{i}")),
                    n("http://ex/p"),
                    n("http://ex/o"),
                    GraphName::DefaultGraph,
                ))
                .unwrap();
        }
        assert_eq!(buffer.len(), 3);

        let mut sink = CollectingSink(Vec::new());
        buffer.flush(&mut sink).unwrap();
        assert_eq!(sink.0.len(), 3);
        assert!(buffer.is_empty());
        for (i, st) in sink.0.iter().enumerate() {
            assert_eq!(
                st.subject().as_named_node().map(NamedNode::as_str),
                Some(format!("http://ex/s{i}").as_str())
            );
        }
    }
}
