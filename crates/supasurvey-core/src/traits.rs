//! Collaborator contracts.
//!
//! Rendering, file storage, and persistence are owned by the host
//! application. The core only talks to them through these traits;
//! in-memory implementations live in [`crate::memory`].

use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::ScoreState;
use crate::error::StoreError;
use crate::value::{FormData, RawValue};

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Attributes handed to a renderer, in insertion order.
pub type Attrs = IndexMap<String, String>;

/// Renders one input control. The returned markup is opaque to the core.
pub trait FieldRenderer {
    fn render(&self, name: &str, value: Option<&RawValue>, attrs: &Attrs) -> String;
}

// ---------------------------------------------------------------------------
// File storage
// ---------------------------------------------------------------------------

/// An uploaded file waiting to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub name: String,
    pub content: Vec<u8>,
}

/// Add/remove deltas submitted for a multi-file answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileChanges {
    pub add: Vec<Upload>,
    /// Ids of stored files to drop.
    pub remove: Vec<String>,
}

impl FileChanges {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// Storage backend for multi-file answers.
pub trait FileStorage: Send + Sync {
    /// Store a file and return its id.
    fn save(&mut self, upload: &Upload) -> Result<String, StoreError>;

    fn delete(&mut self, file_id: &str) -> Result<(), StoreError>;

    /// Public URL of a stored file.
    fn url_for(&self, file_id: &str) -> String;
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Identifies one question set's answers within one survey response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OccurrenceKey {
    pub response: String,
    pub questionset: u32,
}

impl OccurrenceKey {
    pub fn new(response: impl Into<String>, questionset: u32) -> Self {
        Self {
            response: response.into(),
            questionset,
        }
    }
}

impl fmt::Display for OccurrenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/questionset_{}", self.response, self.questionset)
    }
}

/// Persisted answers for one question-set occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub id: Uuid,
    pub key: OccurrenceKey,
    /// One entry per submitted instance; repeaters may hold several.
    #[serde(default)]
    pub instances: Vec<FormData>,
    /// Score state as of the last refresh.
    #[serde(default)]
    pub score: ScoreState,
    #[serde(default)]
    pub verified_score: Option<Decimal>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl ResponseRecord {
    pub fn new(key: OccurrenceKey) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            key,
            instances: Vec::new(),
            score: ScoreState::default(),
            verified_score: None,
            created: now,
            updated: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated = Utc::now();
    }
}

/// Persistence backend for response records.
pub trait ResponseStore: Send + Sync {
    fn get(&self, key: &OccurrenceKey) -> Result<Option<ResponseRecord>, StoreError>;

    /// Fetch the record, creating an empty one if absent.
    fn get_or_create(&mut self, key: &OccurrenceKey) -> Result<ResponseRecord, StoreError>;

    fn save(&mut self, record: ResponseRecord) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occurrence_key_display() {
        let key = OccurrenceKey::new("resp-1", 12);
        assert_eq!(key.to_string(), "resp-1/questionset_12");
    }

    #[test]
    fn record_serde_roundtrip() {
        let mut record = ResponseRecord::new(OccurrenceKey::new("r", 1));
        let mut data = FormData::new();
        data.insert("questionset_1__answer_1".into(), RawValue::text("Yes"));
        record.instances.push(data);

        let json = serde_json::to_string(&record).unwrap();
        let back: ResponseRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.key, record.key);
        assert_eq!(back.instances, record.instances);
        assert!(back.verified_score.is_none());
    }
}
