//! Single-entry memoization of the built graph forest.
//!
//! Rebuilding the forest is cheap but not free, and navigation operations
//! want to see the *same* forest a renderer produced. The cache keys on a
//! stable `(run_id, version)` pair instead of object identity: the run id
//! names the loaded run, and the version counter lets a caller force a
//! rebuild (config edits) without changing runs. Loading a different run
//! or bumping the version drops the previous forest.

use std::sync::Arc;

use crate::node::GraphNode;

/// Caches the most recently built forest for one `(run_id, version)` key.
#[derive(Debug, Default)]
pub struct GraphCache {
    key: Option<(String, u64)>,
    forest: Option<Arc<Vec<GraphNode>>>,
}

impl GraphCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached forest for `(run_id, version)`, building and
    /// caching it when the key does not match the current entry.
    pub fn get_or_build<F>(&mut self, run_id: &str, version: u64, build: F) -> Arc<Vec<GraphNode>>
    where
        F: FnOnce() -> Vec<GraphNode>,
    {
        if let (Some((cached_run, cached_version)), Some(forest)) = (&self.key, &self.forest) {
            if cached_run == run_id && *cached_version == version {
                tracing::debug!(run_id, version, "graph cache hit");
                return Arc::clone(forest);
            }
        }
        tracing::debug!(run_id, version, "graph cache miss, rebuilding");
        let forest = Arc::new(build());
        self.key = Some((run_id.to_string(), version));
        self.forest = Some(Arc::clone(&forest));
        forest
    }

    /// Drops the cached entry. The next lookup rebuilds.
    pub fn invalidate(&mut self) {
        self.key = None;
        self.forest = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;
    use serde_json::json;
    use smallvec::smallvec;

    fn toy_forest(tag: &str) -> Vec<GraphNode> {
        vec![GraphNode {
            kind: NodeKind::Service,
            path: format!("action/0/{tag}"),
            config: json!({}),
            indices: smallvec![0],
            is_tracked: false,
            is_active: false,
            children: Vec::new(),
        }]
    }

    #[test]
    fn same_key_reuses_the_same_forest() {
        let mut cache = GraphCache::new();
        let first = cache.get_or_build("run-1", 0, || toy_forest("a"));
        let second = cache.get_or_build("run-1", 0, || panic!("must not rebuild"));
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn new_run_or_version_rebuilds() {
        let mut cache = GraphCache::new();
        let first = cache.get_or_build("run-1", 0, || toy_forest("a"));

        let other_run = cache.get_or_build("run-2", 0, || toy_forest("b"));
        assert!(!Arc::ptr_eq(&first, &other_run));
        assert_eq!(other_run[0].path, "action/0/b");

        let bumped = cache.get_or_build("run-2", 1, || toy_forest("c"));
        assert_eq!(bumped[0].path, "action/0/c");
    }

    #[test]
    fn invalidate_forces_rebuild() {
        let mut cache = GraphCache::new();
        cache.get_or_build("run-1", 0, || toy_forest("a"));
        cache.invalidate();
        let rebuilt = cache.get_or_build("run-1", 0, || toy_forest("b"));
        assert_eq!(rebuilt[0].path, "action/0/b");
    }
}
