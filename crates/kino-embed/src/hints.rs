//! Connection hinting
//!
//! Tracks every connection key a preconnect was issued for so each key is
//! warmed up at most once for the lifetime of the owning context. The ledger
//! only grows: there is no eviction.

use crate::host::Preconnector;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use tracing::debug;

/// Idempotent preconnect issuer
pub struct ConnectionHinter {
    connector: Rc<dyn Preconnector>,
    seen: RefCell<HashSet<String>>,
}

impl ConnectionHinter {
    pub fn new(connector: Rc<dyn Preconnector>) -> Self {
        Self {
            connector,
            seen: RefCell::new(HashSet::new()),
        }
    }

    /// Issue a preconnect for `key` unless one was already issued.
    ///
    /// Returns true when a hint was issued by this call.
    pub fn hint(&self, key: &str) -> bool {
        if key.is_empty() || !self.seen.borrow_mut().insert(key.to_string()) {
            return false;
        }

        match self.connector.preconnect(key) {
            Ok(()) => debug!(key, "Preconnect issued"),
            Err(e) => debug!(key, error = %e, "Preconnect failed, ignoring"),
        }
        true
    }

    /// Whether a hint was already issued for `key`
    pub fn has_hinted(&self, key: &str) -> bool {
        self.seen.borrow().contains(key)
    }

    /// Number of distinct keys hinted so far
    pub fn len(&self) -> usize {
        self.seen.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.borrow().is_empty()
    }
}

impl std::fmt::Debug for ConnectionHinter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHinter")
            .field("hinted", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, Result};
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct Recorder {
        issued: RefCell<Vec<String>>,
        fail: Cell<bool>,
    }

    impl Preconnector for Recorder {
        fn preconnect(&self, url: &str) -> Result<()> {
            self.issued.borrow_mut().push(url.to_string());
            if self.fail.get() {
                return Err(Error::Unsupported("preconnect".into()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_hint_once_per_key() {
        let recorder = Rc::new(Recorder::default());
        let hinter = ConnectionHinter::new(recorder.clone());

        assert!(hinter.hint("https://cdn.a"));
        assert!(!hinter.hint("https://cdn.a"));
        assert!(!hinter.hint("https://cdn.a"));
        assert!(hinter.hint("https://cdn.b"));

        assert_eq!(*recorder.issued.borrow(), vec!["https://cdn.a", "https://cdn.b"]);
        assert_eq!(hinter.len(), 2);
    }

    #[test]
    fn test_failure_is_swallowed_and_recorded() {
        let recorder = Rc::new(Recorder::default());
        recorder.fail.set(true);
        let hinter = ConnectionHinter::new(recorder.clone());

        assert!(hinter.hint("https://cdn.a"));
        assert!(hinter.has_hinted("https://cdn.a"));
        assert!(!hinter.hint("https://cdn.a"));
        assert_eq!(recorder.issued.borrow().len(), 1);
    }

    #[test]
    fn test_empty_key_ignored() {
        let recorder = Rc::new(Recorder::default());
        let hinter = ConnectionHinter::new(recorder.clone());

        assert!(!hinter.hint(""));
        assert!(hinter.is_empty());
        assert!(recorder.issued.borrow().is_empty());
    }
}
