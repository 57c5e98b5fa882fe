//! Import events.
//!
//! Observers hear about every row twice: `importing` before anything is
//! looked up or saved, `imported` after the main record was saved (or failed
//! to). Observers only get shared references and cannot change the outcome.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::store::Record;

/// A source row keyed by header cell, or by 1-based column number when the
/// source has no header.
pub type RowMap = BTreeMap<String, String>;

pub trait ImportObserver: Send + Sync {
    /// Before a row is imported. `record` is always `None` today.
    fn importing(&self, _model: &str, _record: Option<&Record>, _row: &RowMap) {}

    /// After the main record of a row was saved.
    fn imported(&self, _model: &str, _created: bool, _record: &Record, _row: &RowMap) {}
}

/// Registered observers, called in registration order.
#[derive(Clone, Default)]
pub struct Signals {
    observers: Vec<Arc<dyn ImportObserver>>,
}

impl Signals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&mut self, observer: Arc<dyn ImportObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn send_importing(&self, model: &str, record: Option<&Record>, row: &RowMap) {
        for observer in &self.observers {
            observer.importing(model, record, row);
        }
    }

    pub fn send_imported(&self, model: &str, created: bool, record: &Record, row: &RowMap) {
        for observer in &self.observers {
            observer.imported(model, created, record, row);
        }
    }
}

impl fmt::Debug for Signals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signals")
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Tape(&'static str, Arc<Mutex<Vec<String>>>);

    impl ImportObserver for Tape {
        fn importing(&self, model: &str, _record: Option<&Record>, _row: &RowMap) {
            self.1.lock().unwrap().push(format!("{} importing {}", self.0, model));
        }

        fn imported(&self, model: &str, created: bool, _record: &Record, _row: &RowMap) {
            self.1
                .lock()
                .unwrap()
                .push(format!("{} imported {} {}", self.0, model, created));
        }
    }

    #[test]
    fn test_observers_called_in_order() {
        let tape = Arc::new(Mutex::new(Vec::new()));
        let mut signals = Signals::new();
        signals.connect(Arc::new(Tape("a", tape.clone())));
        signals.connect(Arc::new(Tape("b", tape.clone())));

        let row = RowMap::new();
        let record = Record::new("Item", Default::default());
        signals.send_importing("Item", None, &row);
        signals.send_imported("Item", true, &record, &row);

        assert_eq!(
            *tape.lock().unwrap(),
            vec![
                "a importing Item",
                "b importing Item",
                "a imported Item true",
                "b imported Item true",
            ]
        );
    }

    #[test]
    fn test_default_hooks_do_nothing() {
        struct Silent;
        impl ImportObserver for Silent {}

        let mut signals = Signals::new();
        signals.connect(Arc::new(Silent));
        signals.send_importing("Item", None, &RowMap::new());
        assert_eq!(signals.len(), 1);
    }
}
