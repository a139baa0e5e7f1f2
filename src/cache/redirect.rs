//! Recording and resolution of IRI redirects.

use std::collections::HashSet;
use std::sync::Arc;

use crate::model::{GraphName, NamedNode, Statement, Subject, Term};
use crate::store::StoreConnection;
use crate::{vocab, Result};

/// Persists and resolves `redirectsTo` links in the metadata graph.
///
/// Dereferencers record each redirect hop they observe; before a retrieval,
/// a recorded chain resolves to its terminal IRI so that the cache never
/// refetches an intermediate hop.
pub struct RedirectManager {
    connection: Arc<dyn StoreConnection>,
}

impl RedirectManager {
    pub fn new(connection: Arc<dyn StoreConnection>) -> Self {
        RedirectManager { connection }
    }

    /// Follows recorded redirects from `iri` to the end of the chain.
    /// Cycles are broken with a visited set; the last IRI before the cycle
    /// closes is returned.
    pub fn resolve(&self, iri: &str) -> Result<String> {
        let mut current = iri.to_owned();
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(current.clone());

        loop {
            let subject = Subject::NamedNode(NamedNode::new(&current)?);
            let statements = self.connection.statements(
                Some(&subject),
                Some(&vocab::cache::REDIRECTS_TO),
                None,
                Some(&GraphName::DefaultGraph),
            )?;
            let target = statements.into_iter().find_map(|st| match st.object() {
                Term::NamedNode(n) => Some(n.as_str().to_owned()),
                _ => None,
            });
            match target {
                Some(target) if visited.insert(target.clone()) => current = target,
                _ => return Ok(current),
            }
        }
    }

    /// Records `source redirectsTo target`, replacing any previous record
    /// for `source`.
    pub fn record(&self, source: &str, target: &str) -> Result<()> {
        let subject = Subject::NamedNode(NamedNode::new(source)?);
        self.connection.remove_statements(
            Some(&subject),
            Some(&vocab::cache::REDIRECTS_TO),
            None,
            &GraphName::DefaultGraph,
        )?;
        self.connection.add_statement(&Statement::new(
            subject,
            vocab::cache::REDIRECTS_TO.clone(),
            NamedNode::new(target)?,
            GraphName::DefaultGraph,
        ))
    }
}
