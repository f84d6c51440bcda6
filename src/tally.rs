// src/tally.rs
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;

use crate::catalog::Catalog;

/// Confirmed catches per canonical category, kept in catalog order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    counts: Vec<(String, u64)>,
    index: HashMap<String, usize>,
}

/// Serialized as a JSON object whose keys follow catalog order.
impl Serialize for Tally {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.counts.len()))?;
        for (category, n) in &self.counts {
            map.serialize_entry(category, n)?;
        }
        map.end()
    }
}

impl Tally {
    /// Every catalog category starts at zero.
    pub fn new(catalog: &Catalog) -> Self {
        let counts: Vec<(String, u64)> = catalog
            .categories()
            .iter()
            .map(|c| (c.clone(), 0))
            .collect();
        let index = counts
            .iter()
            .enumerate()
            .map(|(i, (c, _))| (c.clone(), i))
            .collect();
        Self { counts, index }
    }

    /// Add one catch. Returns `false` (and changes nothing) for a category
    /// the tally does not know.
    pub fn increment(&mut self, category: &str) -> bool {
        match self.index.get(category) {
            Some(&i) => {
                self.counts[i].1 += 1;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, category: &str) -> Option<u64> {
        self.index.get(category).map(|&i| self.counts[i].1)
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(|(_, n)| n).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(c, n)| (c.as_str(), *n))
    }
}
