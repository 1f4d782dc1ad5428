//! In-memory record collection shared between the front end and the vault.

use parking_lot::Mutex;
use std::collections::BTreeMap;

use crate::record::Record;
use keevault_common::{Error, Result};

/// Mutex-guarded set of records keyed by id.
///
/// Readers get clones, so a snapshot is consistent even while another
/// thread keeps editing.
#[derive(Debug, Default)]
pub struct RecordCollection {
    records: Mutex<BTreeMap<String, Record>>,
}

impl RecordCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from loaded records; later duplicates win.
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let collection = Self::new();
        collection.replace_all(records);
        collection
    }

    /// Add a new record.
    ///
    /// # Errors
    /// - Returns `Error::Validation` if a record with the same id exists
    pub fn add(&self, record: Record) -> Result<()> {
        let mut records = self.records.lock();
        if records.contains_key(record.id()) {
            return Err(Error::Validation(format!(
                "Item already exists: {}",
                record.id()
            )));
        }
        records.insert(record.id().to_string(), record);
        Ok(())
    }

    /// Insert or replace a record, returning the one it replaced.
    pub fn upsert(&self, record: Record) -> Option<Record> {
        self.records.lock().insert(record.id().to_string(), record)
    }

    pub fn get(&self, id: &str) -> Option<Record> {
        self.records.lock().get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> Option<Record> {
        self.records.lock().remove(id)
    }

    /// Swap the whole content for `records`.
    pub fn replace_all(&self, records: impl IntoIterator<Item = Record>) {
        let replacement: BTreeMap<_, _> = records
            .into_iter()
            .map(|record| (record.id().to_string(), record))
            .collect();
        *self.records.lock() = replacement;
    }

    /// Copy of every record, in id order.
    pub fn snapshot(&self) -> Vec<Record> {
        self.records.lock().values().cloned().collect()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_add_rejects_duplicate() {
        let collection = RecordCollection::new();
        let record = Record::new("a").unwrap();
        collection.add(record.clone()).unwrap();
        assert!(collection.add(record.clone()).is_err());
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn test_upsert_replaces() {
        let collection = RecordCollection::new();
        let mut record = Record::new("a").unwrap();
        assert!(collection.upsert(record.clone()).is_none());

        record.put("k", "v").unwrap();
        let previous = collection.upsert(record.clone()).unwrap();
        assert_eq!(previous.get("k"), None);
        assert_eq!(collection.get(record.id()).unwrap().get("k"), Some("v"));
    }

    #[test]
    fn test_get_returns_copy() {
        let collection = RecordCollection::new();
        let record = Record::new("a").unwrap();
        collection.add(record.clone()).unwrap();

        let mut copy = collection.get(record.id()).unwrap();
        copy.put("k", "v").unwrap();
        assert_eq!(collection.get(record.id()).unwrap(), record);
    }

    #[test]
    fn test_replace_remove_clear() {
        let a = Record::new("a").unwrap();
        let b = Record::new("b").unwrap();
        let collection = RecordCollection::from_records(vec![a.clone()]);

        collection.replace_all(vec![b.clone()]);
        assert!(collection.get(a.id()).is_none());
        assert_eq!(collection.snapshot(), vec![b.clone()]);

        assert_eq!(collection.remove(b.id()), Some(b));
        assert!(collection.is_empty());

        collection.add(a).unwrap();
        collection.clear();
        assert_eq!(collection.len(), 0);
    }

    #[test]
    fn test_concurrent_adds() {
        let collection = Arc::new(RecordCollection::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let collection = Arc::clone(&collection);
                thread::spawn(move || {
                    for j in 0..25 {
                        let record = Record::new(format!("{}-{}", i, j)).unwrap();
                        collection.add(record).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(collection.snapshot().len(), 100);
    }
}
