//! Relation graph and endpoint resolution
//!
//! A relation groups one or more relation instances (ids), each joined by
//! remote units advertising string attributes. Resolution scans every unit of
//! every instance and takes the first that advertises the key. Which peer
//! wins when several advertise a key is unspecified.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const MONGODB: &str = "mongodb";
pub const ELASTICSEARCH: &str = "elasticsearch";
pub const WEBSITE: &str = "website";

/// Port assumed for a search unit that does not advertise one
pub const DEFAULT_SEARCH_PORT: u16 = 9200;

type Attributes = BTreeMap<String, String>;

/// Attributes advertised by one remote unit on one relation instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationEndpoint {
    pub relation_name: String,
    pub relation_id: String,
    pub unit_id: String,
    pub attributes: Attributes,
}

impl RelationEndpoint {
    pub fn new(
        relation_name: impl Into<String>,
        relation_id: impl Into<String>,
        unit_id: impl Into<String>,
    ) -> Self {
        Self {
            relation_name: relation_name.into(),
            relation_id: relation_id.into(),
            unit_id: unit_id.into(),
            attributes: Attributes::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Snapshot of every relation this unit takes part in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationGraph {
    /// relation name -> relation id -> unit id -> attributes
    relations: BTreeMap<String, BTreeMap<String, BTreeMap<String, Attributes>>>,
}

impl RelationGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a relation instance, possibly with no units joined yet
    pub fn add_relation(&mut self, relation_name: &str, relation_id: &str) {
        self.relations
            .entry(relation_name.to_string())
            .or_default()
            .entry(relation_id.to_string())
            .or_default();
    }

    pub fn insert(&mut self, endpoint: RelationEndpoint) {
        self.relations
            .entry(endpoint.relation_name)
            .or_default()
            .entry(endpoint.relation_id)
            .or_default()
            .insert(endpoint.unit_id, endpoint.attributes);
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: RelationEndpoint) -> Self {
        self.insert(endpoint);
        self
    }

    /// Ids of every instance of the named relation
    #[must_use]
    pub fn relation_ids(&self, relation_name: &str) -> Vec<&str> {
        self.relations
            .get(relation_name)
            .map(|ids| ids.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Look up `key` on any unit joined to the relation
    ///
    /// Empty values count as absent: the relation transport unsets a key by
    /// writing an empty value.
    #[must_use]
    pub fn resolve(&self, relation_name: &str, key: &str) -> Option<&str> {
        self.values(relation_name, key).next()
    }

    /// Every non-empty value of `key` across the relation's units
    fn values<'a, 'k>(
        &'a self,
        relation_name: &str,
        key: &'k str,
    ) -> impl Iterator<Item = &'a str> + use<'a, 'k> {
        self.relations
            .get(relation_name)
            .into_iter()
            .flat_map(BTreeMap::values)
            .flat_map(BTreeMap::values)
            .filter_map(move |attributes| attributes.get(key))
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Resolve database and search endpoints for the current pass
    #[must_use]
    pub fn resolve_endpoints(&self) -> ResolvedEndpoints {
        let database_host = self.resolve(MONGODB, "hostname").map(str::to_string);
        let database_port = self.resolve_port(MONGODB, "port");

        let search_host = self.resolve(ELASTICSEARCH, "host").map(str::to_string);
        let search_port = match self.resolve(ELASTICSEARCH, "port") {
            Some(_) => self.resolve_port(ELASTICSEARCH, "port"),
            None => search_host.as_ref().map(|_| DEFAULT_SEARCH_PORT),
        };

        ResolvedEndpoints {
            database_host,
            database_port,
            search_host,
            search_port,
        }
    }

    /// First value of `key` that parses as a port; malformed values are skipped
    fn resolve_port(&self, relation_name: &str, key: &str) -> Option<u16> {
        self.values(relation_name, key).find_map(|raw| match raw.trim().parse::<u16>() {
            Ok(port) => Some(port),
            Err(_) => {
                warn!(relation = %relation_name, key = %key, value = %raw, "ignoring invalid port");
                None
            }
        })
    }
}

/// Live dependency endpoints; absent until the relation has formed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEndpoints {
    pub database_host: Option<String>,
    pub database_port: Option<u16>,
    pub search_host: Option<String>,
    pub search_port: Option<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_without_units_is_absent() {
        let mut graph = RelationGraph::new();
        graph.add_relation(MONGODB, "mongodb:1");

        assert_eq!(graph.resolve(MONGODB, "hostname"), None);
        assert_eq!(graph.resolve("unknown", "hostname"), None);
        assert_eq!(graph.relation_ids(MONGODB), vec!["mongodb:1"]);
    }

    #[test]
    fn test_resolve_single_peer() {
        let graph = RelationGraph::new().with_endpoint(
            RelationEndpoint::new(MONGODB, "mongodb:1", "mongodb/0")
                .with_attribute("hostname", "10.0.0.5")
                .with_attribute("port", "27017"),
        );

        assert_eq!(graph.resolve(MONGODB, "hostname"), Some("10.0.0.5"));
        assert_eq!(graph.resolve(MONGODB, "replset"), None);
    }

    #[test]
    fn test_resolve_skips_units_without_key() {
        let graph = RelationGraph::new()
            .with_endpoint(RelationEndpoint::new(MONGODB, "mongodb:1", "mongodb/0"))
            .with_endpoint(
                RelationEndpoint::new(MONGODB, "mongodb:1", "mongodb/1")
                    .with_attribute("hostname", ""),
            )
            .with_endpoint(
                RelationEndpoint::new(MONGODB, "mongodb:2", "mongodb/7")
                    .with_attribute("hostname", "db.internal"),
            );

        assert_eq!(graph.resolve(MONGODB, "hostname"), Some("db.internal"));
    }

    #[test]
    fn test_resolve_many_peers_returns_one_of_them() {
        let graph = RelationGraph::new()
            .with_endpoint(
                RelationEndpoint::new(ELASTICSEARCH, "elasticsearch:3", "es/0")
                    .with_attribute("host", "10.0.0.1"),
            )
            .with_endpoint(
                RelationEndpoint::new(ELASTICSEARCH, "elasticsearch:3", "es/1")
                    .with_attribute("host", "10.0.0.2"),
            );

        let host = graph.resolve(ELASTICSEARCH, "host");
        assert!(matches!(host, Some("10.0.0.1" | "10.0.0.2")));
    }

    #[test]
    fn test_resolve_endpoints() {
        let graph = RelationGraph::new()
            .with_endpoint(
                RelationEndpoint::new(MONGODB, "mongodb:1", "mongodb/0")
                    .with_attribute("hostname", "10.0.0.5")
                    .with_attribute("port", "27017"),
            )
            .with_endpoint(
                RelationEndpoint::new(ELASTICSEARCH, "elasticsearch:3", "es/0")
                    .with_attribute("host", "10.0.0.9"),
            );

        let resolved = graph.resolve_endpoints();

        assert_eq!(resolved.database_host.as_deref(), Some("10.0.0.5"));
        assert_eq!(resolved.database_port, Some(27017));
        assert_eq!(resolved.search_host.as_deref(), Some("10.0.0.9"));
        assert_eq!(resolved.search_port, Some(DEFAULT_SEARCH_PORT));
    }

    #[test]
    fn test_resolve_endpoints_empty_graph() {
        assert_eq!(
            RelationGraph::new().resolve_endpoints(),
            ResolvedEndpoints::default()
        );
    }

    #[test]
    fn test_invalid_port_is_absent() {
        let graph = RelationGraph::new().with_endpoint(
            RelationEndpoint::new(MONGODB, "mongodb:1", "mongodb/0")
                .with_attribute("hostname", "10.0.0.5")
                .with_attribute("port", "not-a-port"),
        );

        let resolved = graph.resolve_endpoints();
        assert_eq!(resolved.database_host.as_deref(), Some("10.0.0.5"));
        assert_eq!(resolved.database_port, None);
    }

    #[test]
    fn test_malformed_peer_port_does_not_mask_valid_one() {
        let graph = RelationGraph::new()
            .with_endpoint(
                RelationEndpoint::new(MONGODB, "mongodb:1", "mongodb/0")
                    .with_attribute("hostname", "10.0.0.5")
                    .with_attribute("port", "abc"),
            )
            .with_endpoint(
                RelationEndpoint::new(MONGODB, "mongodb:1", "mongodb/1")
                    .with_attribute("port", "27017"),
            );

        assert_eq!(graph.resolve(MONGODB, "port"), Some("abc"));
        assert_eq!(graph.resolve_endpoints().database_port, Some(27017));
    }
}
