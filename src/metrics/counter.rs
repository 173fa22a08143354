//! Hierarchical step counters shared between loops.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// Shared counter handle.
pub type SharedCounter = Arc<Counter>;

/// Thread-safe named counter with an optional parent.
///
/// Incrementing a child immediately forwards the increment to its parent
/// under a prefixed key, so sibling loops (train/eval) report into one merged
/// view without sharing a key space.
pub struct Counter {
    parent: Option<SharedCounter>,
    prefix: String,
    counts: Mutex<HashMap<String, u64>>,
}

impl Counter {
    /// Create a root counter with no parent and no prefix.
    pub fn root() -> SharedCounter {
        Arc::new(Self {
            parent: None,
            prefix: String::new(),
            counts: Mutex::new(HashMap::new()),
        })
    }

    /// Create a child whose increments also land on `parent` under
    /// `{prefix}_{key}`.
    pub fn child(parent: &SharedCounter, prefix: impl Into<String>) -> SharedCounter {
        Arc::new(Self {
            parent: Some(Arc::clone(parent)),
            prefix: prefix.into(),
            counts: Mutex::new(HashMap::new()),
        })
    }

    fn prefixed(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}_{}", self.prefix, key)
        }
    }

    /// Add `value` to `key` and return the new total for this counter.
    pub fn increment(&self, key: &str, value: u64) -> u64 {
        let total = {
            let mut counts = self.counts.lock();
            let entry = counts.entry(key.to_string()).or_insert(0);
            *entry += value;
            *entry
        };
        // Own lock is released before walking up; parents never call back down.
        if let Some(parent) = &self.parent {
            parent.increment(&self.prefixed(key), value);
        }
        total
    }

    /// Current total for `key` in this counter's own key space.
    pub fn get(&self, key: &str) -> u64 {
        self.counts.lock().get(key).copied().unwrap_or(0)
    }

    /// Merged view: the parent's counts overlaid with this counter's own
    /// keys under their prefix. On a root this is just its own counts.
    pub fn get_counts(&self) -> HashMap<String, u64> {
        let mut merged = match &self.parent {
            Some(parent) => parent.get_counts(),
            None => HashMap::new(),
        };
        let counts = self.counts.lock();
        for (key, value) in counts.iter() {
            merged.insert(self.prefixed(key), *value);
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_root_counter() {
        let root = Counter::root();
        assert_eq!(root.get("steps"), 0);
        root.increment("steps", 5);
        assert_eq!(root.get("steps"), 5);
        assert_eq!(root.get_counts().get("steps"), Some(&5));
    }

    #[test]
    fn test_increment_returns_new_total() {
        let root = Counter::root();
        assert_eq!(root.increment("steps", 2), 2);
        assert_eq!(root.increment("steps", 5), 7);
    }

    #[test]
    fn test_child_propagates_prefixed() {
        let root = Counter::root();
        let train = Counter::child(&root, "train");

        train.increment("steps", 3);

        assert_eq!(train.get("steps"), 3);
        assert_eq!(root.get("train_steps"), 3);
        assert_eq!(root.get("steps"), 0);
    }

    #[test]
    fn test_grandchild_prefixes_chain() {
        let root = Counter::root();
        let train = Counter::child(&root, "train");
        let actor = Counter::child(&train, "actor");

        actor.increment("steps", 4);

        assert_eq!(actor.get("steps"), 4);
        assert_eq!(train.get("actor_steps"), 4);
        assert_eq!(root.get("train_actor_steps"), 4);
    }

    #[test]
    fn test_siblings_merge_in_parent_view() {
        let root = Counter::root();
        let train = Counter::child(&root, "train");
        let eval = Counter::child(&root, "eval");

        train.increment("steps", 10);
        train.increment("episodes", 2);
        eval.increment("steps", 6);

        let merged = root.get_counts();
        assert_eq!(merged.get("train_steps"), Some(&10));
        assert_eq!(merged.get("train_episodes"), Some(&2));
        assert_eq!(merged.get("eval_steps"), Some(&6));

        // A child's view includes its siblings through the parent.
        let from_train = train.get_counts();
        assert_eq!(from_train.get("train_steps"), Some(&10));
        assert_eq!(from_train.get("eval_steps"), Some(&6));
    }

    #[test]
    fn test_concurrent_increments() {
        let root = Counter::root();
        let child = Counter::child(&root, "train");

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let child = Arc::clone(&child);
                thread::spawn(move || {
                    for _ in 0..100 {
                        child.increment("steps", 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(child.get("steps"), 400);
        assert_eq!(root.get("train_steps"), 400);
    }
}
