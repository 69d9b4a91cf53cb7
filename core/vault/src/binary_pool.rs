//! Shared attachment storage addressed by pool id.

use std::collections::BTreeMap;

/// Mapping from pool-local id to attachment bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinaryPool {
    items: BTreeMap<String, Vec<u8>>,
}

impl BinaryPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `data` under `id`, returning the bytes it replaced.
    pub fn insert(&mut self, id: impl Into<String>, data: Vec<u8>) -> Option<Vec<u8>> {
        self.items.insert(id.into(), data)
    }

    pub fn get(&self, id: &str) -> Option<&[u8]> {
        self.items.get(id).map(|data| data.as_slice())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(|id| id.as_str())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl FromIterator<(String, Vec<u8>)> for BinaryPool {
    fn from_iter<I: IntoIterator<Item = (String, Vec<u8>)>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}
