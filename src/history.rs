//! Bounded per-line log of recorded values.

use std::collections::{BTreeMap, VecDeque};
use std::num::NonZeroUsize;

use crate::interpreter::Value;

pub const DEFAULT_MAX_DEPTH: NonZeroUsize = NonZeroUsize::new(10).unwrap();

/// One recorded `(label, value)` pair. Conditions, comparisons and printed
/// output carry no label.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub label: Option<String>,
    pub value: Value,
}

impl Entry {
    pub fn new(label: Option<String>, value: Value) -> Self {
        Self { label, value }
    }
}

/// Snapshot of a run: source line to the retained entries, oldest first.
pub type History = BTreeMap<usize, Vec<Entry>>;

/// Keeps at most `max_depth` entries per line, evicting the oldest first.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    max_depth: NonZeroUsize,
    lines: BTreeMap<usize, VecDeque<Entry>>,
}

impl HistoryStore {
    pub fn new(max_depth: NonZeroUsize) -> Self {
        Self {
            max_depth,
            lines: BTreeMap::new(),
        }
    }

    pub fn max_depth(&self) -> NonZeroUsize {
        self.max_depth
    }

    pub fn record(&mut self, line: usize, label: Option<String>, value: Value) {
        let entries = self.lines.entry(line).or_default();
        if entries.len() == self.max_depth.get() {
            entries.pop_front();
        }
        entries.push_back(Entry::new(label, value));
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn snapshot(&self) -> History {
        self.lines
            .iter()
            .map(|(line, entries)| (*line, entries.iter().cloned().collect()))
            .collect()
    }

    pub fn into_history(self) -> History {
        self.lines
            .into_iter()
            .map(|(line, entries)| (line, entries.into()))
            .collect()
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth(value: usize) -> NonZeroUsize {
        NonZeroUsize::new(value).expect("non-zero depth")
    }

    fn values(history: &History, line: usize) -> Vec<Value> {
        history[&line].iter().map(|entry| entry.value.clone()).collect()
    }

    #[test]
    fn creates_lines_on_first_use_in_order() {
        let mut store = HistoryStore::default();
        assert!(store.is_empty());
        store.record(3, Some("c".to_string()), Value::Integer(3));
        store.record(1, None, Value::Boolean(true));
        store.record(3, Some("c".to_string()), Value::Integer(4));

        let history = store.snapshot();
        assert_eq!(history.keys().copied().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(history[&1], vec![Entry::new(None, Value::Boolean(true))]);
        assert_eq!(values(&history, 3), vec![Value::Integer(3), Value::Integer(4)]);
    }

    #[test]
    fn evicts_oldest_entry_once_full() {
        let mut store = HistoryStore::new(depth(3));
        for value in 0..4 {
            store.record(1, Some("i".to_string()), Value::Integer(value));
        }
        store.record(2, None, Value::None);

        let history = store.into_history();
        assert_eq!(
            values(&history, 1),
            vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]
        );
        assert_eq!(history[&2].len(), 1);
    }

    #[test]
    fn depth_of_one_keeps_only_latest() {
        let mut store = HistoryStore::new(depth(1));
        store.record(5, Some("x".to_string()), Value::from("old"));
        store.record(5, Some("x".to_string()), Value::from("new"));
        assert_eq!(values(&store.snapshot(), 5), vec![Value::from("new")]);
        assert_eq!(store.max_depth(), depth(1));
    }
}
