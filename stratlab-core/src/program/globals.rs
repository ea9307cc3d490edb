//! User-declared numeric variables that persist across bars within one run.

use std::collections::{BTreeMap, HashMap};

/// Run-scoped variable store.
///
/// Reads never fail: an undeclared or never-assigned key reads as `NaN`.
#[derive(Debug, Clone, Default)]
pub struct GlobalStore {
    values: HashMap<String, Option<f64>>,
}

impl GlobalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `key` without a value. An existing value is kept.
    pub fn declare(&mut self, key: &str) {
        self.values.entry(key.to_string()).or_insert(None);
    }

    pub fn get(&self, key: &str) -> f64 {
        self.values.get(key).copied().flatten().unwrap_or(f64::NAN)
    }

    pub fn set(&mut self, key: &str, value: f64) {
        self.values.insert(key.to_string(), Some(value));
    }

    pub fn is_declared(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Assigned values sorted by key.
    pub fn snapshot(&self) -> BTreeMap<String, f64> {
        self.values
            .iter()
            .filter_map(|(k, v)| v.map(|v| (k.clone(), v)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undeclared_reads_nan() {
        let store = GlobalStore::new();
        assert!(store.get("missing").is_nan());
    }

    #[test]
    fn declared_but_unset_reads_nan() {
        let mut store = GlobalStore::new();
        store.declare("x");
        assert!(store.is_declared("x"));
        assert!(store.get("x").is_nan());
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn declare_does_not_clobber() {
        let mut store = GlobalStore::new();
        store.set("entry", 42.0);
        store.declare("entry");
        assert_eq!(store.get("entry"), 42.0);
    }

    #[test]
    fn set_creates_key() {
        let mut store = GlobalStore::new();
        store.set("n", 1.5);
        assert!(store.is_declared("n"));
        assert_eq!(store.snapshot().get("n"), Some(&1.5));
        store.clear();
        assert!(store.is_empty());
    }
}
