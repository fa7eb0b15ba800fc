// LocationRegistry - bidirectional location name <-> id mapping
//
// Identifiers are assigned densely from 0 in first-seen order and never
// change for the lifetime of a trained instance.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct LocationRegistry {
    names: Vec<String>,
    ids: HashMap<String, usize>,
}

impl LocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id for `name`, assigning the next free id on first sight
    pub fn register(&mut self, name: &str) -> usize {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.names.len();
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        id
    }

    pub fn id_of(&self, name: &str) -> Option<usize> {
        self.ids.get(name).copied()
    }

    pub fn name_of(&self, id: usize) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterate `(id, name)` in id order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.names.iter().enumerate().map(|(id, n)| (id, n.as_str()))
    }
}

impl From<Vec<String>> for LocationRegistry {
    fn from(names: Vec<String>) -> Self {
        let mut registry = LocationRegistry::new();
        for name in &names {
            registry.register(name);
        }
        registry
    }
}

impl From<LocationRegistry> for Vec<String> {
    fn from(registry: LocationRegistry) -> Self {
        registry.names
    }
}
