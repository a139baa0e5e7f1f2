//! End-to-end retrieval scenarios against stub dereferencers and the
//! in-memory store.

use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use ldcache::cache::redirect::RedirectManager;
use ldcache::deref::{Dereferencer, Representation};
use ldcache::model::{GraphName, Literal, NamedNode, Statement};
use ldcache::pipeline::StatementHandler;
use ldcache::rdfize::Rdfizer;
use ldcache::store::{MemoryStore, StatementSink, StoreConnection};
use ldcache::{vocab, CacheConfig, CacheEntry, LinkedDataCache, Status};

const RDFXML_THREE_TRIPLES: &str = r#"<?xml version="1.0"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
         xmlns:ex="http://ex/ns#">
  <rdf:Description rdf:about="http://ex/a">
    <ex:p1 rdf:resource="http://ex/b"/>
    <ex:p2>label</ex:p2>
    <ex:p3 rdf:resource="http://ex/c"/>
  </rdf:Description>
</rdf:RDF>"#;

const TURTLE_TRUNCATED: &str = "\
<http://ex/s1> <http://ex/p> <http://ex/o1> .
<http://ex/s2> <http://ex/p> <http://ex/o2> .
<http://ex/s3> <http://ex/p> ";

/// Serves a fixed body with a fixed media type, counting invocations.
struct StubDereferencer {
    media_type: String,
    body: String,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl StubDereferencer {
    fn new(media_type: &str, body: &str) -> Self {
        StubDereferencer {
            media_type: media_type.to_owned(),
            body: body.to_owned(),
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

impl Dereferencer for StubDereferencer {
    fn name(&self) -> &str {
        "StubDereferencer"
    }

    fn dereference(&self, _iri: &str) -> ldcache::Result<Option<Representation>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        Ok(Some(Representation::new(
            self.media_type.clone(),
            Box::new(Cursor::new(self.body.clone().into_bytes())),
        )))
    }
}

/// Records a redirect for every fetched IRI and declines to produce a
/// representation.
struct RedirectingDereferencer {
    redirects: Arc<RedirectManager>,
    target: String,
}

impl Dereferencer for RedirectingDereferencer {
    fn name(&self) -> &str {
        "RedirectingDereferencer"
    }

    fn dereference(&self, iri: &str) -> ldcache::Result<Option<Representation>> {
        self.redirects.record(iri, &self.target)?;
        Ok(None)
    }
}

fn graph_statements(conn: &dyn StoreConnection, graph: &str) -> Vec<Statement> {
    conn.statements(
        None,
        None,
        None,
        Some(&GraphName::NamedNode(NamedNode::new_unchecked(graph))),
    )
    .unwrap()
}

fn default_cache(store: &MemoryStore) -> LinkedDataCache {
    LinkedDataCache::create_default(store, CacheConfig::default()).unwrap()
}

#[test]
fn rdfxml_success_replaces_graph_with_rewritten_statements() {
    let store = MemoryStore::new();
    let cache = default_cache(&store);
    let stub = StubDereferencer::new("application/rdf+xml", RDFXML_THREE_TRIPLES);
    cache.register_dereferencer("http", Arc::new(stub));

    let conn = cache.connection();
    let target = NamedNode::new("http://ex/a").unwrap();
    let status = cache.retrieve(&target, conn.as_ref()).unwrap();
    assert_eq!(status, Status::Success);

    let statements = graph_statements(conn.as_ref(), "http://ex/a");
    assert_eq!(statements.len(), 3);
    for st in &statements {
        assert_eq!(
            st.context().as_named_node().map(NamedNode::as_str),
            Some("http://ex/a")
        );
    }
}

#[test]
fn unregistered_media_type_leaves_graph_untouched() {
    let store = MemoryStore::new();
    let cache = default_cache(&store);
    let stub = StubDereferencer::new("application/octet-stream", "garbage");
    cache.register_dereferencer("http", Arc::new(stub));

    let conn = cache.connection();
    let target = NamedNode::new("http://ex/blob").unwrap();
    let status = cache.retrieve(&target, conn.as_ref()).unwrap();
    assert_eq!(status, Status::BadMediaType);
    assert!(graph_statements(conn.as_ref(), "http://ex/blob").is_empty());
}

#[test]
fn parse_failure_discards_partial_statements() {
    let store = MemoryStore::new();
    let cache = default_cache(&store);
    let stub = StubDereferencer::new("text/turtle", TURTLE_TRUNCATED);
    cache.register_dereferencer("http", Arc::new(stub));

    let conn = cache.connection();
    let target = NamedNode::new("http://ex/broken").unwrap();
    let status = cache.retrieve(&target, conn.as_ref()).unwrap();
    assert_eq!(status, Status::ParseError);
    // Two statements parsed cleanly before the truncation; none may appear.
    assert!(graph_statements(conn.as_ref(), "http://ex/broken").is_empty());
}

#[test]
fn second_retrieval_is_answered_from_cache() {
    let store = MemoryStore::new();
    let cache = default_cache(&store);
    let stub = StubDereferencer::new("application/rdf+xml", RDFXML_THREE_TRIPLES);
    let calls = stub.calls();
    cache.register_dereferencer("http", Arc::new(stub));

    let conn = cache.connection();
    let target = NamedNode::new("http://ex/a").unwrap();
    assert_eq!(cache.retrieve(&target, conn.as_ref()).unwrap(), Status::Success);
    assert_eq!(cache.retrieve(&target, conn.as_ref()).unwrap(), Status::Success);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn redirect_to_cached_document_writes_nothing() {
    let store = MemoryStore::new();
    let cache = default_cache(&store);
    let stub = StubDereferencer::new("application/rdf+xml", RDFXML_THREE_TRIPLES);
    cache.register_dereferencer("http", Arc::new(stub));

    let conn = cache.connection();
    let a = NamedNode::new("http://ex/a").unwrap();
    assert_eq!(cache.retrieve(&a, conn.as_ref()).unwrap(), Status::Success);
    let before = graph_statements(conn.as_ref(), "http://ex/a");

    cache.register_dereferencer(
        "http",
        Arc::new(RedirectingDereferencer {
            redirects: cache.redirects(),
            target: "http://ex/a".to_owned(),
        }),
    );
    let b = NamedNode::new("http://ex/b").unwrap();
    assert_eq!(
        cache.retrieve(&b, conn.as_ref()).unwrap(),
        Status::RedirectsToCached
    );

    assert_eq!(graph_statements(conn.as_ref(), "http://ex/a"), before);
    assert!(graph_statements(conn.as_ref(), "http://ex/b").is_empty());

    // The redirect is recorded in the metadata graph.
    let redirect = conn
        .statements(
            None,
            Some(&vocab::cache::REDIRECTS_TO),
            None,
            Some(&GraphName::DefaultGraph),
        )
        .unwrap();
    assert_eq!(redirect.len(), 1);
}

#[test]
fn accept_header_lists_media_types_by_descending_quality() {
    struct NoopRdfizer;
    impl Rdfizer for NoopRdfizer {
        fn name(&self) -> &str {
            "noop"
        }
        fn rdfize(
            &self,
            _input: &mut dyn Read,
            _handler: &mut dyn StatementHandler,
            _base_iri: &str,
        ) -> Status {
            Status::Success
        }
    }

    let store = MemoryStore::new();
    let cache = LinkedDataCache::new(&store, CacheConfig::default()).unwrap();
    cache
        .register_rdfizer("application/rdf+xml", Arc::new(NoopRdfizer), 1.0)
        .unwrap();
    cache
        .register_rdfizer("text/turtle", Arc::new(NoopRdfizer), 0.8)
        .unwrap();
    cache
        .register_rdfizer("text/xml", Arc::new(NoopRdfizer), 0.25)
        .unwrap();

    assert_eq!(
        cache.accept_header(),
        "application/rdf+xml, text/turtle;q=0.8, text/xml;q=0.25"
    );
}

#[test]
fn fragment_and_fragmentless_iris_share_one_entry() {
    let store = MemoryStore::new();
    let cache = default_cache(&store);
    let stub = StubDereferencer::new("application/rdf+xml", RDFXML_THREE_TRIPLES);
    let calls = stub.calls();
    cache.register_dereferencer("http", Arc::new(stub));

    let conn = cache.connection();
    let with_fragment = NamedNode::new("http://ex/a#b").unwrap();
    let without_fragment = NamedNode::new("http://ex/a").unwrap();

    assert_eq!(
        cache.retrieve(&with_fragment, conn.as_ref()).unwrap(),
        Status::Success
    );
    assert_eq!(
        cache.retrieve(&without_fragment, conn.as_ref()).unwrap(),
        Status::Success
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(graph_statements(conn.as_ref(), "http://ex/a").len(), 3);
}

#[test]
fn concurrent_retrievals_of_one_iri_fetch_once() {
    let store = MemoryStore::new();
    let cache = Arc::new(default_cache(&store));
    let stub = StubDereferencer::new("application/rdf+xml", RDFXML_THREE_TRIPLES)
        .with_delay(Duration::from_millis(50));
    let calls = stub.calls();
    cache.register_dereferencer("http", Arc::new(stub));

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let cache = cache.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let conn = cache.connection();
                let target = NamedNode::new("http://ex/a").unwrap();
                barrier.wait();
                cache.retrieve(&target, conn.as_ref()).unwrap()
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let conn = cache.connection();
    assert_eq!(graph_statements(conn.as_ref(), "http://ex/a").len(), 3);
}

#[test]
fn concurrent_retrievals_of_distinct_iris_both_complete() {
    let store = MemoryStore::new();
    let cache = Arc::new(default_cache(&store));
    let stub = StubDereferencer::new("application/rdf+xml", RDFXML_THREE_TRIPLES)
        .with_delay(Duration::from_millis(20));
    cache.register_dereferencer("http", Arc::new(stub));

    let handles: Vec<_> = ["http://ex/one", "http://ex/two"]
        .into_iter()
        .map(|iri| {
            let cache = cache.clone();
            thread::spawn(move || {
                let conn = cache.connection();
                let target = NamedNode::new(iri).unwrap();
                cache.retrieve(&target, conn.as_ref()).unwrap()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), Status::Success);
    }

    let conn = cache.connection();
    assert_eq!(graph_statements(conn.as_ref(), "http://ex/one").len(), 3);
    assert_eq!(graph_statements(conn.as_ref(), "http://ex/two").len(), 3);
}

#[test]
fn persisted_cache_lookup_is_treated_as_expired() {
    let store = MemoryStore::new();
    let cache = default_cache(&store);
    let stub = StubDereferencer::new("application/rdf+xml", RDFXML_THREE_TRIPLES);
    let calls = stub.calls();
    cache.register_dereferencer("http", Arc::new(stub));

    // A memo left behind by a crash mid-retrieval.
    let conn = cache.connection();
    let crashed = CacheEntry::new(Status::CacheLookup);
    conn.add_statement(&Statement::new(
        NamedNode::new_unchecked("http://ex/a"),
        vocab::cache::MEMO.clone(),
        Literal::new(crashed.encode().unwrap()),
        GraphName::DefaultGraph,
    ))
    .unwrap();

    let target = NamedNode::new("http://ex/a").unwrap();
    assert_eq!(cache.retrieve(&target, conn.as_ref()).unwrap(), Status::Success);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn blocked_extension_is_rejected_without_network_io() {
    let store = MemoryStore::new();
    let cache = default_cache(&store);

    let conn = cache.connection();
    let target = NamedNode::new("http://ex/archive.zip").unwrap();
    let status = cache.retrieve(&target, conn.as_ref()).unwrap();
    assert_eq!(status, Status::DereferencerError);
}

#[test]
fn data_store_factory_intercepts_writes() {
    struct Intercept(Arc<Mutex<Vec<Statement>>>);
    impl StatementSink for Intercept {
        fn put(&mut self, statement: &Statement) -> ldcache::Result<()> {
            self.0.lock().push(statement.clone());
            Ok(())
        }
    }

    let store = MemoryStore::new();
    let cache = default_cache(&store);
    let stub = StubDereferencer::new("application/rdf+xml", RDFXML_THREE_TRIPLES);
    cache.register_dereferencer("http", Arc::new(stub));

    let intercepted: Arc<Mutex<Vec<Statement>>> = Arc::new(Mutex::new(Vec::new()));
    let sink_statements = intercepted.clone();
    cache.set_data_store(Arc::new(move |_conn| {
        Box::new(Intercept(sink_statements.clone()))
    }));

    let conn = cache.connection();
    let target = NamedNode::new("http://ex/a").unwrap();
    assert_eq!(cache.retrieve(&target, conn.as_ref()).unwrap(), Status::Success);

    assert_eq!(intercepted.lock().len(), 3);
    // Every write went through the factory, none through the connection.
    assert!(graph_statements(conn.as_ref(), "http://ex/a").is_empty());
}

#[test]
fn clear_drops_cached_state() {
    let store = MemoryStore::new();
    let cache = default_cache(&store);
    let stub = StubDereferencer::new("application/rdf+xml", RDFXML_THREE_TRIPLES);
    let calls = stub.calls();
    cache.register_dereferencer("http", Arc::new(stub));

    let conn = cache.connection();
    let target = NamedNode::new("http://ex/a").unwrap();
    assert_eq!(cache.retrieve(&target, conn.as_ref()).unwrap(), Status::Success);

    cache.clear().unwrap();
    assert!(store.is_empty());

    assert_eq!(cache.retrieve(&target, conn.as_ref()).unwrap(), Status::Success);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
