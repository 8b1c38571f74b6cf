//! Knowledge-graph concept storage
//!
//! `GraphStore` is the capability boundary a Dgraph-equivalent backend
//! plugs into; `InMemoryGraphStore` is the reference implementation the
//! server runs with. Upsert is by name and logically atomic: one call
//! either updates the existing concept in place or mints a new uid, so
//! two upserts of the same name can never race into duplicates as long
//! as callers serialize mutations (the server holds the store behind a
//! single lock).

use log::info;
use shared::{Concept, ConceptLink, ErrorKind};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphStoreError {
    #[error("concept {0} not found")]
    ConceptNotFound(String),
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
}

impl GraphStoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GraphStoreError::ConceptNotFound(_) => ErrorKind::NotFound,
            GraphStoreError::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
        }
    }
}

/// Fields accepted by an upsert; everything about a concept except its
/// uid and connections.
#[derive(Debug, Clone, PartialEq)]
pub struct ConceptFields {
    pub name: String,
    pub category: String,
    pub difficulty: String,
    pub description: String,
    pub tags: Vec<String>,
}

/// Capability boundary for the persistent graph backend.
pub trait GraphStore: Send {
    /// Inserts or updates the concept with this name and returns its uid.
    fn upsert_concept(&mut self, fields: ConceptFields) -> Result<String, GraphStoreError>;

    fn get_concept(&self, uid: &str) -> Result<Concept, GraphStoreError>;

    fn find_by_name(&self, name: &str) -> Option<Concept>;

    /// All concepts in insertion order.
    fn list_concepts(&self) -> Vec<Concept>;

    fn delete_concept(&mut self, uid: &str) -> Result<(), GraphStoreError>;

    /// Attaches a directed link to the source concept.
    fn add_connection(&mut self, from: &str, link: ConceptLink) -> Result<(), GraphStoreError>;
}

/// Reference in-memory graph store with monotonic uids.
pub struct InMemoryGraphStore {
    concepts: HashMap<String, Concept>,
    /// name -> uid, backing atomic upsert-by-name
    name_index: HashMap<String, String>,
    /// Insertion order for stable listings.
    order: Vec<String>,
    next_uid: u64,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self {
            concepts: HashMap::new(),
            name_index: HashMap::new(),
            order: Vec::new(),
            next_uid: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }

    fn mint_uid(&mut self) -> String {
        let uid = format!("0x{:x}", self.next_uid);
        self.next_uid += 1;
        uid
    }
}

impl Default for InMemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore for InMemoryGraphStore {
    fn upsert_concept(&mut self, fields: ConceptFields) -> Result<String, GraphStoreError> {
        if let Some(uid) = self.name_index.get(&fields.name).cloned() {
            // Update in place, keeping uid and connections
            if let Some(concept) = self.concepts.get_mut(&uid) {
                concept.category = fields.category;
                concept.difficulty = fields.difficulty;
                concept.description = fields.description;
                concept.tags = fields.tags;
            }
            info!("Updated concept {} ({})", fields.name, uid);
            return Ok(uid);
        }

        let uid = self.mint_uid();
        let concept = Concept {
            uid: uid.clone(),
            name: fields.name.clone(),
            category: fields.category,
            difficulty: fields.difficulty,
            description: fields.description,
            tags: fields.tags,
            connections: Vec::new(),
        };

        info!("Created concept {} ({})", fields.name, uid);
        self.name_index.insert(fields.name, uid.clone());
        self.order.push(uid.clone());
        self.concepts.insert(uid.clone(), concept);

        Ok(uid)
    }

    fn get_concept(&self, uid: &str) -> Result<Concept, GraphStoreError> {
        self.concepts
            .get(uid)
            .cloned()
            .ok_or_else(|| GraphStoreError::ConceptNotFound(uid.to_string()))
    }

    fn find_by_name(&self, name: &str) -> Option<Concept> {
        self.name_index
            .get(name)
            .and_then(|uid| self.concepts.get(uid))
            .cloned()
    }

    fn list_concepts(&self) -> Vec<Concept> {
        self.order
            .iter()
            .filter_map(|uid| self.concepts.get(uid))
            .cloned()
            .collect()
    }

    fn delete_concept(&mut self, uid: &str) -> Result<(), GraphStoreError> {
        let concept = self
            .concepts
            .remove(uid)
            .ok_or_else(|| GraphStoreError::ConceptNotFound(uid.to_string()))?;

        self.name_index.remove(&concept.name);
        self.order.retain(|u| u != uid);
        info!("Deleted concept {} ({})", concept.name, uid);
        Ok(())
    }

    fn add_connection(&mut self, from: &str, link: ConceptLink) -> Result<(), GraphStoreError> {
        let concept = self
            .concepts
            .get_mut(from)
            .ok_or_else(|| GraphStoreError::ConceptNotFound(from.to_string()))?;

        concept.connections.push(link);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::LinkKind;

    fn fields(name: &str) -> ConceptFields {
        ConceptFields {
            name: name.to_string(),
            category: "Algebra".to_string(),
            difficulty: "Advanced".to_string(),
            description: format!("{} description", name),
            tags: vec!["tag".to_string()],
        }
    }

    #[test]
    fn test_upsert_creates_then_updates_in_place() {
        let mut store = InMemoryGraphStore::new();

        let uid = store.upsert_concept(fields("Linear Algebra")).unwrap();
        assert_eq!(store.len(), 1);

        let mut updated = fields("Linear Algebra");
        updated.difficulty = "Expert".to_string();
        let uid2 = store.upsert_concept(updated).unwrap();

        // Same uid, no duplicate, new fields
        assert_eq!(uid, uid2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_concept(&uid).unwrap().difficulty, "Expert");
    }

    #[test]
    fn test_upsert_keeps_connections_on_update() {
        let mut store = InMemoryGraphStore::new();
        let a = store.upsert_concept(fields("Linear Algebra")).unwrap();
        let b = store.upsert_concept(fields("Vector Spaces")).unwrap();

        store
            .add_connection(
                &a,
                ConceptLink {
                    target: b.clone(),
                    weight: 0.8,
                    kind: LinkKind::Prerequisite,
                },
            )
            .unwrap();

        store.upsert_concept(fields("Linear Algebra")).unwrap();
        assert_eq!(store.get_concept(&a).unwrap().connections.len(), 1);
    }

    #[test]
    fn test_uids_are_distinct() {
        let mut store = InMemoryGraphStore::new();
        let a = store.upsert_concept(fields("A")).unwrap();
        let b = store.upsert_concept(fields("B")).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_get_unknown_concept() {
        let store = InMemoryGraphStore::new();
        assert_eq!(
            store.get_concept("0xdead"),
            Err(GraphStoreError::ConceptNotFound("0xdead".to_string()))
        );
    }

    #[test]
    fn test_find_by_name() {
        let mut store = InMemoryGraphStore::new();
        store.upsert_concept(fields("Graph Theory")).unwrap();

        assert_eq!(store.find_by_name("Graph Theory").unwrap().name, "Graph Theory");
        assert!(store.find_by_name("Topology").is_none());
    }

    #[test]
    fn test_list_preserves_insertion_order() {
        let mut store = InMemoryGraphStore::new();
        store.upsert_concept(fields("A")).unwrap();
        store.upsert_concept(fields("B")).unwrap();
        store.upsert_concept(fields("C")).unwrap();

        let names: Vec<String> = store.list_concepts().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_delete_clears_name_index() {
        let mut store = InMemoryGraphStore::new();
        let uid = store.upsert_concept(fields("A")).unwrap();

        store.delete_concept(&uid).unwrap();
        assert!(store.is_empty());
        assert!(store.find_by_name("A").is_none());

        // Re-upserting after delete mints a new uid
        let uid2 = store.upsert_concept(fields("A")).unwrap();
        assert_ne!(uid, uid2);
    }

    #[test]
    fn test_delete_unknown_concept() {
        let mut store = InMemoryGraphStore::new();
        assert_eq!(
            store.delete_concept("0x1"),
            Err(GraphStoreError::ConceptNotFound("0x1".to_string()))
        );
    }

    #[test]
    fn test_add_connection_to_unknown_source() {
        let mut store = InMemoryGraphStore::new();
        let link = ConceptLink {
            target: "0x2".to_string(),
            weight: 0.5,
            kind: LinkKind::Related,
        };

        assert_eq!(
            store.add_connection("0x1", link),
            Err(GraphStoreError::ConceptNotFound("0x1".to_string()))
        );
    }
}
