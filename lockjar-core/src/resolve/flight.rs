// lockjar-core/src/resolve/flight.rs
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use lockjar_common::error::{LockjarError, Result};
use once_cell::sync::OnceCell;
use tracing::debug;

type Cell<T> = Arc<OnceCell<Result<Arc<T>>>>;

/// Concurrent map of key to in-flight result. The first caller for a key runs
/// the fetch; every later caller blocks on the same cell and receives the
/// same value or the same error.
pub struct SingleFlight<T> {
    name: &'static str,
    cells: Mutex<HashMap<String, Cell<T>>>,
}

impl<T> SingleFlight<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            cells: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_or_fetch<F>(&self, key: &str, fetch: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        let cell = {
            let mut cells = self.cells.lock().map_err(|_| {
                LockjarError::Generic(format!("{} cache lock poisoned", self.name))
            })?;
            Arc::clone(cells.entry(key.to_string()).or_default())
        };

        // The map lock is released before fetching, so unrelated keys proceed
        // in parallel while waiters on this key block inside the cell.
        cell.get_or_init(|| {
            debug!("[{}] fetching {}", self.name, key);
            fetch().map(Arc::new)
        })
        .clone()
    }

    /// Number of distinct keys requested so far.
    pub fn len(&self) -> usize {
        self.cells.lock().map(|c| c.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
