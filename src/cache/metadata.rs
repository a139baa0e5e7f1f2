//! Bounded in-memory metadata index with a triple-store projection.

use std::collections::{HashMap, VecDeque};

use crate::cache::entry::CacheEntry;
use crate::config::MINIMUM_CACHE_CAPACITY;
use crate::model::{GraphName, Literal, NamedNode, Statement, Subject, Term};
use crate::store::StoreConnection;
use crate::{vocab, Result};

/// Maps graph IRIs to their cache entries.
///
/// Bounded: when the index is full, the least-recently-inserted entry is
/// evicted from memory. Its projection in the triple store is unaffected, so
/// an evicted entry can be reloaded on demand. Every mutation with a
/// connection is mirrored into the store's default graph as a `memo`
/// statement.
///
/// The index itself is not synchronised; the engine serialises access behind
/// a single lock.
pub struct MetadataIndex {
    capacity: usize,
    entries: HashMap<String, CacheEntry>,
    insertion_order: VecDeque<String>,
}

impl MetadataIndex {
    /// Creates an index with the given capacity, floored at
    /// [`MINIMUM_CACHE_CAPACITY`].
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity < MINIMUM_CACHE_CAPACITY {
            tracing::warn!(
                "memory cache capacity {capacity} is suspiciously low; using {MINIMUM_CACHE_CAPACITY}"
            );
            MINIMUM_CACHE_CAPACITY
        } else {
            capacity
        };
        MetadataIndex {
            capacity,
            entries: HashMap::new(),
            insertion_order: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the in-memory entry without touching the store.
    pub fn peek(&self, graph_iri: &str) -> Option<&CacheEntry> {
        self.entries.get(graph_iri)
    }

    /// Returns the entry for a graph IRI, loading it from the store's
    /// `memo` projection if it is not in memory.
    pub fn get_memo(
        &mut self,
        graph_iri: &str,
        connection: &dyn StoreConnection,
    ) -> Result<Option<CacheEntry>> {
        if let Some(entry) = self.entries.get(graph_iri) {
            return Ok(Some(entry.clone()));
        }

        let subject = Subject::NamedNode(NamedNode::new(graph_iri)?);
        let statements = connection.statements(
            Some(&subject),
            Some(&vocab::cache::MEMO),
            None,
            Some(&GraphName::DefaultGraph),
        )?;
        for statement in statements {
            let Term::Literal(literal) = statement.object() else {
                continue;
            };
            match CacheEntry::decode(literal.value()) {
                Ok(entry) => {
                    self.insert(graph_iri, entry.clone());
                    return Ok(Some(entry));
                }
                Err(e) => {
                    tracing::warn!("discarding undecodable memo for <{graph_iri}>: {e}");
                }
            }
        }
        Ok(None)
    }

    /// Inserts or replaces the entry for a graph IRI. When a connection is
    /// supplied, the store projection is replaced as well.
    pub fn set_memo(
        &mut self,
        graph_iri: &str,
        entry: CacheEntry,
        connection: Option<&dyn StoreConnection>,
    ) -> Result<()> {
        if let Some(connection) = connection {
            let subject = Subject::NamedNode(NamedNode::new(graph_iri)?);
            connection.remove_statements(
                Some(&subject),
                Some(&vocab::cache::MEMO),
                None,
                &GraphName::DefaultGraph,
            )?;
            connection.add_statement(&Statement::new(
                subject,
                vocab::cache::MEMO.clone(),
                Literal::new(entry.encode()?),
                GraphName::DefaultGraph,
            ))?;
        }
        self.insert(graph_iri, entry);
        Ok(())
    }

    /// Drops every in-memory entry. Store projections are unaffected.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.insertion_order.clear();
    }

    fn insert(&mut self, graph_iri: &str, entry: CacheEntry) {
        if self.entries.contains_key(graph_iri) {
            self.entries.insert(graph_iri.to_owned(), entry);
            return;
        }
        while self.entries.len() >= self.capacity {
            match self.insertion_order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
        self.insertion_order.push_back(graph_iri.to_owned());
        self.entries.insert(graph_iri.to_owned(), entry);
    }
}
