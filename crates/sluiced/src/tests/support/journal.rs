//! Ordered record of side effects shared by every test double.

use std::sync::{Arc, Mutex};

/// Cloneable list of entries such as `monitor:stop` or `plugin:drop:proxy`.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.entries
            .lock()
            .expect("journal mutex poisoned")
            .push(entry.into());
    }

    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().expect("journal mutex poisoned").clone()
    }

    /// Entries starting with `prefix`, in order.
    #[must_use]
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.starts_with(prefix))
            .collect()
    }

    /// Index of the first entry equal to `entry`.
    #[must_use]
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|recorded| recorded == entry)
    }

    #[must_use]
    pub fn contains(&self, entry: &str) -> bool {
        self.position(entry).is_some()
    }
}
