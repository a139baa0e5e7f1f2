//! The caching engine: facade, retrieval orchestrator, and cache state.
//!
//! A [`LinkedDataCache`] manages a dynamic set of RDF graphs collected from
//! the Web. Configurable dereferencers and RDFizers fetch and translate
//! documents; an underlying triple store provides a unified view of the
//! collected data.

pub mod entry;
pub mod expiration;
pub mod metadata;
pub mod redirect;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::cache::entry::{CacheEntry, Status};
use crate::cache::expiration::{DefaultExpirationPolicy, ExpirationPolicy};
use crate::cache::metadata::MetadataIndex;
use crate::cache::redirect::RedirectManager;
use crate::config::CacheConfig;
use crate::deref::{Dereferencer, FileDereferencer, HttpDereferencer, NON_RDF_EXTENSIONS};
use crate::model::{iri, GraphName, NamedNode};
use crate::pipeline::{BNodeToIriFilter, Buffer, SingleContextRewriter};
use crate::rdfize::{RdfFormat, Rdfizer, RdfizerRegistry, VerbatimRdfizer};
use crate::store::{DataStoreFactory, Store, StoreConnection, StoreInserter};
use crate::Result;

/// Read-mostly view of engine state shared with dereferencers.
///
/// Dereferencers consult the cache for two things only: the Accept header
/// matching the registered RDFizers, and whether a redirect target is
/// already fresh (in which case fetching it again would be redundant).
#[derive(Clone)]
pub struct CacheView {
    metadata: Arc<Mutex<MetadataIndex>>,
    expiration: Arc<RwLock<Arc<dyn ExpirationPolicy>>>,
    rdfizers: Arc<RwLock<RdfizerRegistry>>,
}

impl CacheView {
    /// The Accept header matching the cache's collection of RDFizers.
    pub fn accept_header(&self) -> String {
        self.rdfizers.write().accept_header().to_owned()
    }

    /// Whether the in-memory entry for a graph IRI is terminal and not
    /// expired.
    pub fn is_fresh(&self, graph_iri: &str) -> bool {
        let index = self.metadata.lock();
        match index.peek(graph_iri) {
            Some(entry) if entry.status().is_terminal() => {
                !self.expiration.read().is_expired(entry)
            }
            _ => false,
        }
    }
}

/// A manager for a dynamic set of RDF graphs collected from the Web.
///
/// One instance is shared among all accessing threads, together with a
/// single triple-store connection. For any one graph IRI retrievals are
/// linearisable: concurrent callers observe either the pre-existing entry
/// or the outcome of a single fresh retrieval, never duplicate fetches.
pub struct LinkedDataCache {
    config: CacheConfig,
    connection: Mutex<Arc<dyn StoreConnection>>,
    metadata: Arc<Mutex<MetadataIndex>>,
    expiration: Arc<RwLock<Arc<dyn ExpirationPolicy>>>,
    rdfizers: Arc<RwLock<RdfizerRegistry>>,
    dereferencers: RwLock<HashMap<String, Arc<dyn Dereferencer>>>,
    redirects: Arc<RedirectManager>,
    data_store: RwLock<DataStoreFactory>,
    auto_commit: AtomicBool,
    deref_subjects: AtomicBool,
    deref_predicates: AtomicBool,
    deref_objects: AtomicBool,
    deref_contexts: AtomicBool,
}

impl LinkedDataCache {
    /// Constructs a cache over the given store with no dereferencers or
    /// RDFizers wired. A transaction is begun on the shared connection.
    pub fn new(store: &dyn Store, config: CacheConfig) -> Result<Self> {
        let connection = store.connection()?;
        connection.begin()?;

        let metadata = Arc::new(Mutex::new(MetadataIndex::new(config.memory_cache_capacity)));
        let expiration: Arc<RwLock<Arc<dyn ExpirationPolicy>>> = Arc::new(RwLock::new(Arc::new(
            DefaultExpirationPolicy::new(config.cache_lifetime()),
        )));
        let redirects = Arc::new(RedirectManager::new(connection.clone()));
        let data_store: DataStoreFactory = Arc::new(|conn| Box::new(StoreInserter::new(conn)));

        Ok(LinkedDataCache {
            auto_commit: AtomicBool::new(true),
            deref_subjects: AtomicBool::new(config.deref_subjects),
            deref_predicates: AtomicBool::new(config.deref_predicates),
            deref_objects: AtomicBool::new(config.deref_objects),
            deref_contexts: AtomicBool::new(config.deref_contexts),
            config,
            connection: Mutex::new(connection),
            metadata,
            expiration,
            rdfizers: Arc::new(RwLock::new(RdfizerRegistry::new())),
            dereferencers: RwLock::new(HashMap::new()),
            redirects,
            data_store: RwLock::new(data_store),
        })
    }

    /// Constructs a cache with the default dereferencers and RDFizers: http,
    /// https and file dereferencing, plus a verbatim RDFizer for every
    /// supported concrete syntax.
    pub fn create_default(store: &dyn Store, config: CacheConfig) -> Result<Self> {
        let cache = Self::new(store, config)?;

        let http = Arc::new(
            HttpDereferencer::new(cache.view(), cache.redirects())?
                .with_blocked_extensions(NON_RDF_EXTENSIONS.iter().copied()),
        );
        cache.register_dereferencer("http", http.clone());
        cache.register_dereferencer("https", http);
        cache.register_dereferencer("file", Arc::new(FileDereferencer::new()));

        let datatype_handling = cache.config.datatype_handling;
        let mut rdfxml: Option<Arc<dyn Rdfizer>> = None;
        for format in RdfFormat::ALL {
            let rdfizer: Arc<dyn Rdfizer> =
                Arc::new(VerbatimRdfizer::new(format, datatype_handling));
            if format == RdfFormat::RdfXml {
                rdfxml = Some(rdfizer.clone());
            }
            for media_type in format.media_types() {
                let quality = if *media_type == "application/rdf+xml" { 1.0 } else { 0.5 };
                cache.register_rdfizer(media_type, rdfizer.clone(), quality)?;
            }
        }
        if let Some(rdfxml) = rdfxml {
            // Some servers mislabel RDF/XML as text/xml; accept it reluctantly.
            cache.register_rdfizer("text/xml", rdfxml, 0.25)?;
        }

        Ok(cache)
    }

    /// Shared view handed to dereferencers.
    pub fn view(&self) -> CacheView {
        CacheView {
            metadata: self.metadata.clone(),
            expiration: self.expiration.clone(),
            rdfizers: self.rdfizers.clone(),
        }
    }

    /// The engine's redirect manager.
    pub fn redirects(&self) -> Arc<RedirectManager> {
        self.redirects.clone()
    }

    /// The single store connection shared among all accessing threads.
    pub fn connection(&self) -> Arc<dyn StoreConnection> {
        self.connection.lock().clone()
    }

    /// Associates a dereferencer with an IRI scheme.
    pub fn register_dereferencer(&self, scheme: &str, dereferencer: Arc<dyn Dereferencer>) {
        tracing::info!(
            "adding dereferencer for IRI scheme {scheme}: {}",
            dereferencer.name()
        );
        self.dereferencers
            .write()
            .insert(scheme.to_ascii_lowercase(), dereferencer);
    }

    /// Associates an RDFizer with a media type at the given content
    /// negotiation quality.
    pub fn register_rdfizer(
        &self,
        media_type: &str,
        rdfizer: Arc<dyn Rdfizer>,
        quality: f64,
    ) -> Result<()> {
        self.rdfizers.write().register(media_type, rdfizer, quality)
    }

    /// Wires an image-metadata RDFizer for the mainstream EXIF-compatible
    /// image types: JPEG and TIFF.
    pub fn register_image_rdfizer(&self, rdfizer: Arc<dyn Rdfizer>) -> Result<()> {
        for media_type in ["image/jpeg", "image/tiff", "image/tiff-fx"] {
            self.register_rdfizer(media_type, rdfizer.clone(), 0.4)?;
        }
        Ok(())
    }

    /// The HTTP Accept header matching the registered RDFizers.
    pub fn accept_header(&self) -> String {
        self.rdfizers.write().accept_header().to_owned()
    }

    /// Replaces the expiration policy.
    pub fn set_expiration_policy(&self, policy: Arc<dyn ExpirationPolicy>) {
        *self.expiration.write() = policy;
    }

    /// Replaces the statement-sink factory retrievals write through.
    pub fn set_data_store(&self, factory: DataStoreFactory) {
        *self.data_store.write() = factory;
    }

    /// Whether the cache commits to the triple store after each Web request
    /// (true by default).
    pub fn auto_commit(&self) -> bool {
        self.auto_commit.load(Ordering::Relaxed)
    }

    pub fn set_auto_commit(&self, auto_commit: bool) {
        self.auto_commit.store(auto_commit, Ordering::Relaxed);
    }

    /// Whether fetched blank nodes are kept as blank nodes.
    pub fn use_blank_nodes(&self) -> bool {
        self.config.use_blank_nodes
    }

    pub fn dereference_subjects(&self) -> bool {
        self.deref_subjects.load(Ordering::Relaxed)
    }

    pub fn set_dereference_subjects(&self, flag: bool) {
        self.deref_subjects.store(flag, Ordering::Relaxed);
    }

    pub fn dereference_predicates(&self) -> bool {
        self.deref_predicates.load(Ordering::Relaxed)
    }

    pub fn set_dereference_predicates(&self, flag: bool) {
        self.deref_predicates.store(flag, Ordering::Relaxed);
    }

    pub fn dereference_objects(&self) -> bool {
        self.deref_objects.load(Ordering::Relaxed)
    }

    pub fn set_dereference_objects(&self, flag: bool) {
        self.deref_objects.store(flag, Ordering::Relaxed);
    }

    pub fn dereference_contexts(&self) -> bool {
        self.deref_contexts.load(Ordering::Relaxed)
    }

    pub fn set_dereference_contexts(&self, flag: bool) {
        self.deref_contexts.store(flag, Ordering::Relaxed);
    }

    /// Drops the in-memory metadata index and truncates the store.
    pub fn clear(&self) -> Result<()> {
        self.metadata.lock().clear();

        let connection = self.connection.lock().clone();
        connection.clear()?;
        connection.commit()?;
        connection.begin()
    }

    /// Closes the shared store connection.
    pub fn close(&self) -> Result<()> {
        self.connection.lock().close()
    }

    /// Retrieves caching metadata for an IRI, possibly dereferencing a
    /// document from the Web first.
    ///
    /// Returns the terminal (or, when no dereferencer matches, transient)
    /// status of the IRI's cache entry. Retrieval failures are classified
    /// into the status; only store-level errors are raised.
    pub fn retrieve(&self, target: &NamedNode, connection: &dyn StoreConnection) -> Result<Status> {
        // The named graph storing all information associated with this IRI.
        let graph_iri = iri::strip_fragment(target.as_str()).to_owned();

        let mut memo = self.get_or_create_memo(&graph_iri, connection)?;
        if memo.status() != Status::CacheLookup {
            // Another retrieval owns (or already finished) this IRI.
            return Ok(memo.status());
        }
        memo.set_status(Status::Undetermined);

        // From here the IRI is a black box; it need not resemble the IRI it
        // was created from.
        let retrieval_iri = graph_iri.clone();

        let Some(dereferencer) = self.choose_dereferencer(&retrieval_iri) else {
            return Ok(Status::Undetermined);
        };

        tracing::info!("dereferencing <{target}>");
        memo.set_dereferencer(dereferencer.name());

        // From this point on we are committed to dereferencing the IRI, and
        // failures are stored as caching metadata.
        let outcome = self.retrieve_into(
            &mut memo,
            connection,
            target,
            &graph_iri,
            &retrieval_iri,
            dereferencer.as_ref(),
        );

        self.metadata
            .lock()
            .set_memo(&graph_iri, memo.clone(), Some(connection))?;

        // An auto-commit happens independently of any outer commit.
        if self.auto_commit() {
            connection.commit()?;
            connection.begin()?;
        }

        self.log_status(target, &memo);
        outcome?;
        Ok(memo.status())
    }

    /// Looks up and creates the memo for an IRI in one atomic operation,
    /// avoiding races between threads.
    ///
    /// The returned working copy carries `CacheLookup` exactly when this
    /// caller won the race and must perform the retrieval; the copy placed
    /// in the shared index is `Undetermined`, so losing threads observe an
    /// in-flight entry and do not re-dispatch work.
    fn get_or_create_memo(
        &self,
        graph_iri: &str,
        connection: &dyn StoreConnection,
    ) -> Result<CacheEntry> {
        let mut index = self.metadata.lock();

        if let Some(memo) = index.get_memo(graph_iri, connection)? {
            // A CacheLookup loaded from the store is a crash artifact and is
            // treated as expired.
            let expired = memo.status() == Status::CacheLookup
                || self.expiration.read().is_expired(&memo);
            if !expired {
                return Ok(memo);
            }
        }

        let memo = CacheEntry::new(Status::Undetermined);
        index.set_memo(graph_iri, memo.clone(), None)?;

        let mut winner = memo;
        winner.set_status(Status::CacheLookup);
        Ok(winner)
    }

    fn retrieve_into(
        &self,
        memo: &mut CacheEntry,
        connection: &dyn StoreConnection,
        target: &NamedNode,
        graph_iri: &str,
        retrieval_iri: &str,
        dereferencer: &dyn Dereferencer,
    ) -> Result<()> {
        // Pre-emptive; overwritten on every path that gets further.
        memo.set_status(Status::DereferencerError);

        let representation = match dereferencer.dereference(retrieval_iri) {
            Ok(Some(representation)) => representation,
            Ok(None) => {
                // Dereferencing would be redundant; exit early.
                memo.set_status(Status::RedirectsToCached);
                return Ok(());
            }
            Err(e) => {
                tracing::info!(
                    "dereferencer {} failed for <{retrieval_iri}>: {e}",
                    dereferencer.name()
                );
                return Ok(());
            }
        };

        // We have the representation; now try to rdfize it.
        memo.set_media_type(representation.media_type());

        let Some(rdfizer) = self.rdfizers.read().get(representation.media_type()) else {
            memo.set_status(Status::BadMediaType);
            return Ok(());
        };
        memo.set_rdfizer(rdfizer.name());

        let graph = NamedNode::new(graph_iri)?;
        let buffer = Buffer::new();

        // The namespace portion of the original IRI is the base IRI for the
        // retrieved document.
        let base_iri = iri::namespace_of(target.as_str()).to_owned();
        let mut stream = representation.into_stream();

        let status = if self.config.use_blank_nodes {
            let mut pipe = SingleContextRewriter::new(buffer.clone(), graph.clone());
            rdfizer.rdfize(&mut stream, &mut pipe, &base_iri)
        } else {
            let mut pipe = SingleContextRewriter::new(
                BNodeToIriFilter::new(buffer.clone()),
                graph.clone(),
            );
            rdfizer.rdfize(&mut stream, &mut pipe, &base_iri)
        };
        memo.set_status(status);

        // The graph is only touched when the pass succeeded; anything else
        // discards the buffer, so partial parses never pollute the graph.
        if memo.status() == Status::Success {
            connection.remove_statements(None, None, None, &GraphName::NamedNode(graph))?;

            let factory = self.data_store.read().clone();
            let mut sink = factory(connection);
            buffer.flush(sink.as_mut())?;
        }

        Ok(())
    }

    fn choose_dereferencer(&self, iri_str: &str) -> Option<Arc<dyn Dereferencer>> {
        let Some(scheme) = iri::scheme_of(iri_str) else {
            tracing::warn!("invalid IRI: {iri_str}");
            return None;
        };
        let found = self.dereferencers.read().get(&scheme).cloned();
        if found.is_none() {
            tracing::warn!("no dereferencer for {iri_str}");
        }
        found
    }

    fn log_status(&self, target: &NamedNode, memo: &CacheEntry) {
        let status = memo.status();
        if status != Status::Success && status != Status::RedirectsToCached {
            tracing::info!(
                "failed to dereference IRI <{target}> (dereferencer: {}, media type: {}, rdfizer: {}): {status}",
                memo.dereferencer().unwrap_or(""),
                memo.media_type().unwrap_or(""),
                memo.rdfizer().unwrap_or("")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn cache() -> (MemoryStore, LinkedDataCache) {
        let store = MemoryStore::new();
        let cache = LinkedDataCache::new(&store, CacheConfig::default()).unwrap();
        (store, cache)
    }

    #[test]
    fn test_first_lookup_wins_subsequent_lookups_observe_in_flight_entry() {
        let (_store, cache) = cache();
        let conn = cache.connection();

        let winner = cache
            .get_or_create_memo("http://ex/a", conn.as_ref())
            .unwrap();
        assert_eq!(winner.status(), Status::CacheLookup);

        // A second lookup while the first is in flight sees Undetermined.
        let loser = cache
            .get_or_create_memo("http://ex/a", conn.as_ref())
            .unwrap();
        assert_eq!(loser.status(), Status::Undetermined);
    }

    #[test]
    fn test_terminal_entry_is_returned_unchanged_until_expired() {
        let (_store, cache) = cache();
        let conn = cache.connection();

        cache
            .metadata
            .lock()
            .set_memo("http://ex/a", CacheEntry::new(Status::Success), Some(conn.as_ref()))
            .unwrap();

        let memo = cache
            .get_or_create_memo("http://ex/a", conn.as_ref())
            .unwrap();
        assert_eq!(memo.status(), Status::Success);
    }

    #[test]
    fn test_expired_entry_triggers_a_fresh_lookup() {
        let (_store, cache) = cache();
        let conn = cache.connection();
        cache.set_expiration_policy(Arc::new(DefaultExpirationPolicy::new(
            std::time::Duration::ZERO,
        )));

        cache
            .metadata
            .lock()
            .set_memo("http://ex/a", CacheEntry::new(Status::Success), Some(conn.as_ref()))
            .unwrap();

        let memo = cache
            .get_or_create_memo("http://ex/a", conn.as_ref())
            .unwrap();
        assert_eq!(memo.status(), Status::CacheLookup);
    }

    #[test]
    fn test_unsupported_scheme_leaves_entry_undetermined() {
        let (_store, cache) = cache();
        let conn = cache.connection();
        let target = NamedNode::new_unchecked("mailto:nobody@example.org");

        let status = cache.retrieve(&target, conn.as_ref()).unwrap();
        assert_eq!(status, Status::Undetermined);
    }

    #[test]
    fn test_view_freshness() {
        let (_store, cache) = cache();
        let view = cache.view();
        assert!(!view.is_fresh("http://ex/a"));

        cache
            .metadata
            .lock()
            .set_memo("http://ex/a", CacheEntry::new(Status::Success), None)
            .unwrap();
        assert!(view.is_fresh("http://ex/a"));

        cache
            .metadata
            .lock()
            .set_memo("http://ex/b", CacheEntry::new(Status::Undetermined), None)
            .unwrap();
        assert!(!view.is_fresh("http://ex/b"));
    }
}
