// SPDX-License-Identifier: MIT

//! Thread-safe session state shared by the nodes of one run

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

/// Key/value session state guarded by a read/write lock.
///
/// `Clone` produces a structurally independent copy: values are owned
/// `serde_json::Value`s, so mutating the clone never touches the original.
#[derive(Debug, Default)]
pub struct SessionState {
    data: RwLock<HashMap<String, Value>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session state from a plain map
    pub fn from_map(data: HashMap<String, Value>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.data.write().insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.data.read().get(key).cloned()
    }

    /// Get a nested value using dot notation (e.g., "result.intent")
    pub fn get_path(&self, path: &str) -> Option<Value> {
        let data = self.data.read();
        let mut parts = path.split('.');
        let mut current = data.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current.clone())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.read().contains_key(key)
    }

    pub fn delete(&self, key: &str) -> Option<Value> {
        self.data.write().remove(key)
    }

    pub fn clear(&self) {
        self.data.write().clear();
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Copy of all entries
    pub fn get_all(&self) -> HashMap<String, Value> {
        self.data.read().clone()
    }

    pub fn to_map(&self) -> HashMap<String, Value> {
        self.get_all()
    }

    /// Overwrite keys present in `other` (last write wins)
    pub fn merge(&self, other: &SessionState) {
        if std::ptr::eq(self, other) {
            return;
        }
        let incoming = other.get_all();
        self.data.write().extend(incoming);
    }

    /// Replace every entry with the contents of `other`
    pub fn replace_with(&self, other: SessionState) {
        *self.data.write() = other.data.into_inner();
    }
}

impl Clone for SessionState {
    fn clone(&self) -> Self {
        Self::from_map(self.get_all())
    }
}

/// Fold the session states of parallel branches back into `original`.
///
/// Starts from a clone of `original` and, branch by branch in the given
/// order, applies only the keys that are new or whose value differs from
/// `original`. A key changed by several branches resolves to the last
/// branch in the list.
pub fn merge_parallel_session_states(
    original: &SessionState,
    modified: &[SessionState],
) -> SessionState {
    let base = original.get_all();
    let merged = SessionState::from_map(base.clone());

    for branch in modified {
        let changes: Vec<(String, Value)> = branch
            .get_all()
            .into_iter()
            .filter(|(key, value)| base.get(key) != Some(value))
            .collect();
        let mut data = merged.data.write();
        data.extend(changes);
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_empty_state() {
        let state = SessionState::new();
        assert!(state.get("anything").is_none());
        assert!(state.is_empty());
    }

    #[test]
    fn test_set_get_delete_clear() {
        let state = SessionState::new();
        state.set("a", json!(1));
        state.set("b", json!("two"));
        assert_eq!(state.get("a"), Some(json!(1)));
        assert_eq!(state.len(), 2);

        assert_eq!(state.delete("a"), Some(json!(1)));
        assert!(!state.contains_key("a"));

        state.clear();
        assert!(state.is_empty());
    }

    #[test]
    fn test_get_path() {
        let state = SessionState::new();
        state.set("result", json!({"data": {"value": 42}}));

        assert_eq!(state.get_path("result.data"), Some(json!({"value": 42})));
        assert_eq!(state.get_path("result.data.value"), Some(json!(42)));
        assert_eq!(state.get_path("result.nonexistent"), None);
    }

    #[test]
    fn test_clone_is_independent() {
        let original = SessionState::new();
        original.set("nested", json!({"list": [1, 2, 3]}));

        let cloned = original.clone();
        cloned.set("nested", json!({"list": [9]}));
        cloned.set("extra", json!(true));

        assert_eq!(original.get("nested"), Some(json!({"list": [1, 2, 3]})));
        assert!(original.get("extra").is_none());
    }

    #[test]
    fn test_merge_last_write_wins() {
        let a = SessionState::new();
        a.set("shared", json!("a"));
        a.set("only_a", json!(1));

        let b = SessionState::new();
        b.set("shared", json!("b"));
        b.set("only_b", json!(2));

        a.merge(&b);
        assert_eq!(a.get("shared"), Some(json!("b")));
        assert_eq!(a.get("only_a"), Some(json!(1)));
        assert_eq!(a.get("only_b"), Some(json!(2)));

        a.merge(&a);
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn test_merge_parallel_applies_only_changes() {
        let original = SessionState::new();
        original.set("counter", json!(0));
        original.set("untouched", json!("keep"));

        // branch 0 changes counter, branch 1 leaves it as it was
        let branch0 = original.clone();
        branch0.set("counter", json!(5));
        branch0.set("b0", json!(true));

        let branch1 = original.clone();
        branch1.set("b1", json!(true));

        let merged = merge_parallel_session_states(&original, &[branch0, branch1]);
        assert_eq!(merged.get("counter"), Some(json!(5)));
        assert_eq!(merged.get("b0"), Some(json!(true)));
        assert_eq!(merged.get("b1"), Some(json!(true)));
        assert_eq!(merged.get("untouched"), Some(json!("keep")));

        // original is not modified
        assert_eq!(original.get("counter"), Some(json!(0)));
    }

    #[test]
    fn test_merge_parallel_conflict_resolves_to_last_branch() {
        let original = SessionState::new();
        original.set("winner", json!("none"));

        let first = original.clone();
        first.set("winner", json!("first"));
        let second = original.clone();
        second.set("winner", json!("second"));

        let merged = merge_parallel_session_states(&original, &[first, second]);
        assert_eq!(merged.get("winner"), Some(json!("second")));
    }

    #[test]
    fn test_merge_parallel_with_no_branches() {
        let original = SessionState::new();
        original.set("k", json!(1));
        let merged = merge_parallel_session_states(&original, &[]);
        assert_eq!(merged.get_all(), original.get_all());
    }

    #[test]
    fn test_replace_with() {
        let state = SessionState::new();
        state.set("old", json!(1));
        let replacement = SessionState::new();
        replacement.set("new", json!(2));

        state.replace_with(replacement);
        assert!(state.get("old").is_none());
        assert_eq!(state.get("new"), Some(json!(2)));
    }

    #[test]
    fn test_concurrent_writers() {
        let state = Arc::new(SessionState::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let state = state.clone();
                std::thread::spawn(move || {
                    for j in 0..50 {
                        state.set(format!("k{}_{}", i, j), json!(j));
                        let _ = state.get_all();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(state.len(), 400);
    }
}
