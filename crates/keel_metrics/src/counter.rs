//! Named counters for tracking events

use std::collections::HashMap;

pub struct Counter {
    counters: HashMap<String, usize>,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            counters: HashMap::new(),
        }
    }

    pub fn increment(&mut self, name: &str, value: usize) {
        *self.counters.entry(name.to_string()).or_insert(0) += value;
    }

    pub fn set(&mut self, name: &str, value: usize) {
        self.counters.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> usize {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn reset(&mut self, name: &str) {
        self.counters.insert(name.to_string(), 0);
    }

    pub fn reset_all(&mut self) {
        self.counters.clear();
    }

    /// Sorted copy of all counters, for logging at shutdown.
    pub fn snapshot(&self) -> Vec<(String, usize)> {
        let mut entries: Vec<_> = self
            .counters
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        entries.sort();
        entries
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_increment() {
        let mut counter = Counter::new();
        counter.increment("pool_hit", 1);
        counter.increment("pool_hit", 2);
        assert_eq!(counter.get("pool_hit"), 3);
        assert_eq!(counter.get("missing"), 0);
    }

    #[test]
    fn test_snapshot_sorted() {
        let mut counter = Counter::new();
        counter.set("b", 2);
        counter.set("a", 1);
        let snap = counter.snapshot();
        assert_eq!(snap, vec![("a".to_string(), 1), ("b".to_string(), 2)]);
    }
}
