use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use msuite_types::Identifier;

/// Per-identifier mutual exclusion within one process.
///
/// Entries are dropped again once no caller holds or waits on them, so the
/// table only grows with the number of identifiers in flight.
#[derive(Debug, Default)]
pub struct IdentifierLocks {
    table: Mutex<HashMap<Identifier, Arc<Mutex<()>>>>,
}

impl IdentifierLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `id`.
    pub fn with_lock<R>(&self, id: &Identifier, f: impl FnOnce() -> R) -> R {
        let slot = {
            let mut table = self.table.lock().expect("lock poisoned");
            Arc::clone(table.entry(id.clone()).or_default())
        };
        let result = {
            let _guard = slot.lock().expect("lock poisoned");
            f()
        };
        let mut table = self.table.lock().expect("lock poisoned");
        // One reference in the table, one here: nobody else is waiting.
        if Arc::strong_count(&slot) == 2 {
            table.remove(id);
        }
        result
    }

    /// Number of identifiers currently tracked.
    pub fn len(&self) -> usize {
        self.table.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn same_identifier_is_serialized() {
        let locks = Arc::new(IdentifierLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let id = Identifier::parse("doc1").unwrap();

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let (locks, inside, peak, id) = (locks.clone(), inside.clone(), peak.clone(), id.clone());
                thread::spawn(move || {
                    locks.with_lock(&id, || {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(5));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    })
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }

    #[test]
    fn returns_closure_result_and_cleans_up() {
        let locks = IdentifierLocks::new();
        let id = Identifier::parse("doc1").unwrap();
        assert_eq!(locks.with_lock(&id, || 41 + 1), 42);
        assert_eq!(locks.len(), 0);
    }
}
