//! File-system backed entity store.
//!
//! Layout:
//! ```text
//! {root}/
//!   patients/
//!     {id}.json
//!   doctors/
//!   admins/
//!   consultations/
//! ```
//!
//! Each record is one pretty-printed JSON file named after its id. Ids are
//! assigned here, on insert, and never reused.

use std::fs;
use std::path::{Path, PathBuf};

use medilink_core::store::{EntityStore, StoreError};
use medilink_core::types::{EntityId, NewRecord, Record, RecordKind};

/// JSON-file document store rooted at a configurable directory.
pub struct JsonEntityStore {
    root: PathBuf,
}

impl JsonEntityStore {
    /// Create a store rooted at the given directory, creating it and the
    /// per-collection subdirectories if they do not exist.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        for kind in [
            RecordKind::Patient,
            RecordKind::Doctor,
            RecordKind::Admin,
            RecordKind::Consultation,
        ] {
            fs::create_dir_all(root.join(kind.collection()))?;
        }
        Ok(Self { root })
    }

    fn record_path(&self, kind: RecordKind, id: &EntityId) -> PathBuf {
        self.root
            .join(kind.collection())
            .join(format!("{}.json", id.as_str()))
    }

    fn read_record(path: &Path) -> Result<Record, StoreError> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    fn write_record(&self, record: &Record) -> Result<(), StoreError> {
        let path = self.record_path(record.kind(), record.id());
        let json = serde_json::to_string_pretty(record)?;
        fs::write(&path, json)?;

        tracing::debug!(
            kind = %record.kind(),
            id = %record.id(),
            path = %path.display(),
            "Record written"
        );
        Ok(())
    }
}

impl EntityStore for JsonEntityStore {
    fn insert(&self, draft: NewRecord) -> Result<Record, StoreError> {
        let record = draft.into_record(EntityId::generate());
        self.write_record(&record)?;
        Ok(record)
    }

    fn get(&self, kind: RecordKind, id: &EntityId) -> Result<Option<Record>, StoreError> {
        let path = self.record_path(kind, id);
        if !path.is_file() {
            return Ok(None);
        }
        Self::read_record(&path).map(Some)
    }

    fn find_by_field(
        &self,
        kind: RecordKind,
        field: &str,
        value: &str,
    ) -> Result<Option<Record>, StoreError> {
        for record in self.list(kind)? {
            let doc = serde_json::to_value(&record)?;
            if doc.get(field).and_then(|v| v.as_str()) == Some(value) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    fn put(&self, record: &Record) -> Result<(), StoreError> {
        self.write_record(record)
    }

    fn delete(&self, kind: RecordKind, id: &EntityId) -> Result<(), StoreError> {
        let path = self.record_path(kind, id);
        if !path.is_file() {
            return Err(StoreError::NotFound {
                kind,
                id: id.clone(),
            });
        }
        fs::remove_file(&path)?;
        tracing::debug!(kind = %kind, id = %id, "Record deleted");
        Ok(())
    }

    fn list(&self, kind: RecordKind) -> Result<Vec<Record>, StoreError> {
        let dir = self.root.join(kind.collection());
        let mut records = Vec::new();
        if !dir.is_dir() {
            return Ok(records);
        }

        for entry in fs::read_dir(&dir)?.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                records.push(Self::read_record(&path)?);
            }
        }

        records.sort_by(|a, b| a.id().as_str().cmp(b.id().as_str()));
        Ok(records)
    }
}
