//! Triple store abstraction and an in-memory reference implementation.
//!
//! The engine talks to its host store exclusively through
//! [`StoreConnection`]. A single connection is shared among all accessing
//! threads; the driver contract requires statement-level operations on one
//! connection to be safe under concurrent use.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::model::{GraphName, NamedNode, Statement, Subject, Term};
use crate::{CacheError, Result};

/// A triple store that can hand out connections.
pub trait Store: Send + Sync {
    fn connection(&self) -> Result<Arc<dyn StoreConnection>>;
}

/// A connection to a triple store.
///
/// All methods take `&self`; implementations provide their own interior
/// synchronisation for statement-level operations.
pub trait StoreConnection: Send + Sync {
    /// Adds one statement.
    fn add_statement(&self, statement: &Statement) -> Result<()>;

    /// Removes every statement matching the given pattern from the given
    /// context. `None` positions match anything.
    fn remove_statements(
        &self,
        subject: Option<&Subject>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
        context: &GraphName,
    ) -> Result<()>;

    /// Returns every statement matching the given pattern. A `None` context
    /// matches all graphs.
    fn statements(
        &self,
        subject: Option<&Subject>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
        context: Option<&GraphName>,
    ) -> Result<Vec<Statement>>;

    /// Begins a transaction.
    fn begin(&self) -> Result<()>;

    /// Commits the current transaction.
    fn commit(&self) -> Result<()>;

    /// Removes every statement in the store.
    fn clear(&self) -> Result<()>;

    /// Closes the connection; subsequent operations fail.
    fn close(&self) -> Result<()>;
}

/// A sink for statements flushed out of the retrieval pipeline.
pub trait StatementSink {
    fn put(&mut self, statement: &Statement) -> Result<()>;
}

/// Factory producing the statement sink a retrieval writes through.
///
/// The default factory yields a [`StoreInserter`] over the supplied
/// connection; tests substitute their own factory to intercept writes.
pub type DataStoreFactory =
    Arc<dyn for<'a> Fn(&'a dyn StoreConnection) -> Box<dyn StatementSink + 'a> + Send + Sync>;

/// Statement sink that writes directly through a store connection.
pub struct StoreInserter<'a> {
    connection: &'a dyn StoreConnection,
}

impl<'a> StoreInserter<'a> {
    pub fn new(connection: &'a dyn StoreConnection) -> Self {
        StoreInserter { connection }
    }
}

impl StatementSink for StoreInserter<'_> {
    fn put(&mut self, statement: &Statement) -> Result<()> {
        self.connection.add_statement(statement)
    }
}

fn matches(
    statement: &Statement,
    subject: Option<&Subject>,
    predicate: Option<&NamedNode>,
    object: Option<&Term>,
) -> bool {
    subject.is_none_or(|s| statement.subject() == s)
        && predicate.is_none_or(|p| statement.predicate() == p)
        && object.is_none_or(|o| statement.object() == o)
}

/// In-memory statement storage with a per-context index.
#[derive(Debug, Default)]
struct MemoryStorage {
    statements: BTreeSet<Statement>,
    context_index: BTreeMap<GraphName, BTreeSet<Statement>>,
}

impl MemoryStorage {
    fn insert(&mut self, statement: Statement) {
        if self.statements.insert(statement.clone()) {
            self.context_index
                .entry(statement.context().clone())
                .or_default()
                .insert(statement);
        }
    }

    fn remove_matching(
        &mut self,
        subject: Option<&Subject>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
        context: &GraphName,
    ) {
        let Some(in_context) = self.context_index.get_mut(context) else {
            return;
        };
        let doomed: Vec<Statement> = in_context
            .iter()
            .filter(|st| matches(st, subject, predicate, object))
            .cloned()
            .collect();
        for st in doomed {
            in_context.remove(&st);
            self.statements.remove(&st);
        }
        if in_context.is_empty() {
            self.context_index.remove(context);
        }
    }

    fn matching(
        &self,
        subject: Option<&Subject>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
        context: Option<&GraphName>,
    ) -> Vec<Statement> {
        match context {
            Some(ctx) => self
                .context_index
                .get(ctx)
                .map(|set| {
                    set.iter()
                        .filter(|st| matches(st, subject, predicate, object))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default(),
            None => self
                .statements
                .iter()
                .filter(|st| matches(st, subject, predicate, object))
                .cloned()
                .collect(),
        }
    }
}

/// An in-memory triple store.
///
/// Every connection shares the same underlying storage. Transactions are
/// accepted but not isolated: statement-level operations apply immediately,
/// which satisfies the engine's driver contract (graph clear and buffer
/// flush happen on the calling thread between `begin` and `commit`).
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryStorage>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Total number of statements across all graphs.
    pub fn len(&self) -> usize {
        self.inner.read().map(|s| s.statements.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store for MemoryStore {
    fn connection(&self) -> Result<Arc<dyn StoreConnection>> {
        Ok(Arc::new(MemoryConnection {
            inner: self.inner.clone(),
            open: AtomicBool::new(true),
        }))
    }
}

/// A connection to a [`MemoryStore`].
pub struct MemoryConnection {
    inner: Arc<RwLock<MemoryStorage>>,
    open: AtomicBool,
}

impl MemoryConnection {
    fn check_open(&self) -> Result<()> {
        if self.open.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(CacheError::Store("connection is closed".into()))
        }
    }
}

impl StoreConnection for MemoryConnection {
    fn add_statement(&self, statement: &Statement) -> Result<()> {
        self.check_open()?;
        self.inner
            .write()
            .map_err(|_| CacheError::Store("storage lock poisoned".into()))?
            .insert(statement.clone());
        Ok(())
    }

    fn remove_statements(
        &self,
        subject: Option<&Subject>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
        context: &GraphName,
    ) -> Result<()> {
        self.check_open()?;
        self.inner
            .write()
            .map_err(|_| CacheError::Store("storage lock poisoned".into()))?
            .remove_matching(subject, predicate, object, context);
        Ok(())
    }

    fn statements(
        &self,
        subject: Option<&Subject>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
        context: Option<&GraphName>,
    ) -> Result<Vec<Statement>> {
        self.check_open()?;
        Ok(self
            .inner
            .read()
            .map_err(|_| CacheError::Store("storage lock poisoned".into()))?
            .matching(subject, predicate, object, context))
    }

    fn begin(&self) -> Result<()> {
        self.check_open()
    }

    fn commit(&self) -> Result<()> {
        self.check_open()
    }

    fn clear(&self) -> Result<()> {
        self.check_open()?;
        let mut storage = self
            .inner
            .write()
            .map_err(|_| CacheError::Store("storage lock poisoned".into()))?;
        storage.statements.clear();
        storage.context_index.clear();
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.open.store(false, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(iri: &str) -> NamedNode {
        NamedNode::new_unchecked(iri)
    }

    fn st(s: &str, p: &str, o: &str, g: Option<&str>) -> Statement {
        let context = match g {
            Some(g) => GraphName::NamedNode(n(g)),
            None => GraphName::DefaultGraph,
        };
        Statement::new(n(s), n(p), n(o), context)
    }

    #[test]
    fn test_add_and_query_by_context() {
        let store = MemoryStore::new();
        let conn = store.connection().unwrap();
        conn.add_statement(&st("http://ex/s", "http://ex/p", "http://ex/o1", Some("http://ex/g")))
            .unwrap();
        conn.add_statement(&st("http://ex/s", "http://ex/p", "http://ex/o2", Some("http://ex/g")))
            .unwrap();
        conn.add_statement(&st("http://ex/s", "http://ex/p", "http://ex/o3", None))
            .unwrap();

        let g = GraphName::NamedNode(n("http://ex/g"));
        assert_eq!(conn.statements(None, None, None, Some(&g)).unwrap().len(), 2);
        assert_eq!(
            conn.statements(None, None, None, Some(&GraphName::DefaultGraph))
                .unwrap()
                .len(),
            1
        );
        assert_eq!(conn.statements(None, None, None, None).unwrap().len(), 3);
    }

    #[test]
    fn test_remove_statements_is_scoped_to_context() {
        let store = MemoryStore::new();
        let conn = store.connection().unwrap();
        conn.add_statement(&st("http://ex/s", "http://ex/p", "http://ex/o", Some("http://ex/g1")))
            .unwrap();
        conn.add_statement(&st("http://ex/s", "http://ex/p", "http://ex/o", Some("http://ex/g2")))
            .unwrap();

        let g1 = GraphName::NamedNode(n("http://ex/g1"));
        conn.remove_statements(None, None, None, &g1).unwrap();

        assert!(conn.statements(None, None, None, Some(&g1)).unwrap().is_empty());
        let g2 = GraphName::NamedNode(n("http://ex/g2"));
        assert_eq!(conn.statements(None, None, None, Some(&g2)).unwrap().len(), 1);
    }

    #[test]
    fn test_remove_statements_by_pattern() {
        let store = MemoryStore::new();
        let conn = store.connection().unwrap();
        conn.add_statement(&st("http://ex/a", "http://ex/p", "http://ex/o", None))
            .unwrap();
        conn.add_statement(&st("http://ex/b", "http://ex/p", "http://ex/o", None))
            .unwrap();

        let subject = Subject::NamedNode(n("http://ex/a"));
        conn.remove_statements(Some(&subject), None, None, &GraphName::DefaultGraph)
            .unwrap();

        let remaining = conn.statements(None, None, None, None).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].subject().as_named_node().unwrap().as_str(), "http://ex/b");
    }

    #[test]
    fn test_closed_connection_rejects_operations() {
        let store = MemoryStore::new();
        let conn = store.connection().unwrap();
        conn.close().unwrap();
        assert!(conn
            .add_statement(&st("http://ex/s", "http://ex/p", "http://ex/o", None))
            .is_err());
    }

    #[test]
    fn test_connections_share_storage() {
        let store = MemoryStore::new();
        let c1 = store.connection().unwrap();
        let c2 = store.connection().unwrap();
        c1.add_statement(&st("http://ex/s", "http://ex/p", "http://ex/o", None))
            .unwrap();
        assert_eq!(c2.statements(None, None, None, None).unwrap().len(), 1);
        assert_eq!(store.len(), 1);
    }
}
