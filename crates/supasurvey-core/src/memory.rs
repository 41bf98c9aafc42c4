//! In-memory collaborators used by the CLI and tests.

use std::collections::BTreeMap;

use crate::error::StoreError;
use crate::traits::{FileStorage, OccurrenceKey, ResponseRecord, ResponseStore, Upload};

/// Response records held in a map, ordered by occurrence key.
#[derive(Debug, Default, Clone)]
pub struct InMemoryResponseStore {
    records: BTreeMap<OccurrenceKey, ResponseRecord>,
}

impl InMemoryResponseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store from previously loaded records.
    pub fn from_records(records: impl IntoIterator<Item = ResponseRecord>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.key.clone(), r)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &ResponseRecord> {
        self.records.values()
    }

    /// Records belonging to one survey response.
    pub fn for_response<'a>(&'a self, response: &'a str) -> impl Iterator<Item = &'a ResponseRecord> {
        self.records.values().filter(move |r| r.key.response == response)
    }
}

impl ResponseStore for InMemoryResponseStore {
    fn get(&self, key: &OccurrenceKey) -> Result<Option<ResponseRecord>, StoreError> {
        Ok(self.records.get(key).cloned())
    }

    fn get_or_create(&mut self, key: &OccurrenceKey) -> Result<ResponseRecord, StoreError> {
        let record = self
            .records
            .entry(key.clone())
            .or_insert_with(|| {
                tracing::debug!(%key, "creating response record");
                ResponseRecord::new(key.clone())
            });
        Ok(record.clone())
    }

    fn save(&mut self, mut record: ResponseRecord) -> Result<(), StoreError> {
        record.touch();
        self.records.insert(record.key.clone(), record);
        Ok(())
    }
}

/// Files kept as byte buffers under sequential ids.
#[derive(Debug, Clone)]
pub struct InMemoryFileStorage {
    base_url: String,
    files: BTreeMap<String, Upload>,
    next_id: u64,
}

impl Default for InMemoryFileStorage {
    fn default() -> Self {
        Self::new("/files")
    }
}

impl InMemoryFileStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            files: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn get(&self, file_id: &str) -> Option<&Upload> {
        self.files.get(file_id)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FileStorage for InMemoryFileStorage {
    fn save(&mut self, upload: &Upload) -> Result<String, StoreError> {
        let id = format!("file-{}", self.next_id);
        self.next_id += 1;
        self.files.insert(id.clone(), upload.clone());
        Ok(id)
    }

    fn delete(&mut self, file_id: &str) -> Result<(), StoreError> {
        self.files
            .remove(file_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(file_id.to_string()))
    }

    fn url_for(&self, file_id: &str) -> String {
        let name = self.files.get(file_id).map_or("", |f| f.name.as_str());
        if name.is_empty() {
            format!("{}/{file_id}", self.base_url)
        } else {
            format!("{}/{file_id}/{name}", self.base_url)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_is_idempotent() {
        let mut store = InMemoryResponseStore::new();
        let key = OccurrenceKey::new("r1", 3);
        assert!(store.get(&key).unwrap().is_none());

        let first = store.get_or_create(&key).unwrap();
        let second = store.get_or_create(&key).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn save_replaces_record() {
        let mut store = InMemoryResponseStore::new();
        let key = OccurrenceKey::new("r1", 3);
        let mut record = store.get_or_create(&key).unwrap();
        record.instances.push(Default::default());
        store.save(record).unwrap();

        let loaded = store.get(&key).unwrap().unwrap();
        assert_eq!(loaded.instances.len(), 1);
        assert!(loaded.updated >= loaded.created);
    }

    #[test]
    fn records_filtered_by_response() {
        let store = InMemoryResponseStore::from_records([
            ResponseRecord::new(OccurrenceKey::new("a", 1)),
            ResponseRecord::new(OccurrenceKey::new("a", 2)),
            ResponseRecord::new(OccurrenceKey::new("b", 1)),
        ]);
        assert_eq!(store.for_response("a").count(), 2);
        assert_eq!(store.for_response("c").count(), 0);
    }

    #[test]
    fn file_storage_lifecycle() {
        let mut files = InMemoryFileStorage::new("https://cdn.example.org/");
        let id = files
            .save(&Upload {
                name: "plan.pdf".into(),
                content: b"%PDF".to_vec(),
            })
            .unwrap();
        assert_eq!(id, "file-1");
        assert_eq!(files.url_for(&id), "https://cdn.example.org/file-1/plan.pdf");

        files.delete(&id).unwrap();
        assert!(files.is_empty());
        assert!(matches!(files.delete(&id), Err(StoreError::NotFound(_))));
    }
}
