//! Session bags — per-node memoization stores with single-flight factories.
//!
//! A bag maps `(namespace, key)` to an arbitrary shared object. Concurrent
//! `get_or_put` calls for the same slot run the factory exactly once; every
//! caller receives the same instance. Typical use is caching expensive
//! per-session resources (SDK clients, parsed corpora) across sibling
//! nodes.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

/// A value stored in a session bag. Callers downcast to the concrete type
/// they stored.
pub type SessionValue = Arc<dyn Any + Send + Sync>;

/// Thread-safe namespaced memoization store.
#[derive(Default)]
pub struct SessionBag {
    cells: Mutex<HashMap<(String, String), Arc<OnceCell<SessionValue>>>>,
}

impl SessionBag {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the value under `(namespace, key)`, running `factory` to
    /// produce it if absent. The factory runs at most once per slot across
    /// all concurrent callers; losers of the race await the winner's value.
    pub async fn get_or_put<F, Fut>(&self, namespace: &str, key: &str, factory: F) -> SessionValue
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SessionValue>,
    {
        let cell = {
            let mut cells = self.cells.lock().expect("session bag mutex poisoned");
            cells
                .entry((namespace.to_string(), key.to_string()))
                .or_default()
                .clone()
        };
        cell.get_or_init(factory).await.clone()
    }

    /// Fetch the value under `(namespace, key)` without creating it.
    pub async fn get(&self, namespace: &str, key: &str) -> Option<SessionValue> {
        let cell = {
            let cells = self.cells.lock().expect("session bag mutex poisoned");
            cells.get(&(namespace.to_string(), key.to_string())).cloned()
        };
        cell.and_then(|c| c.get().cloned())
    }
}

impl std::fmt::Debug for SessionBag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self.cells.lock().map(|c| c.len()).unwrap_or(0);
        f.debug_struct("SessionBag").field("slots", &len).finish()
    }
}
