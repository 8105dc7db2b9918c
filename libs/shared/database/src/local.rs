//! Local Store Adapter: typed collections over a [`KeyValueStore`].
//!
//! Layout per collection: the index key `clinic:<collection>` holds the
//! ordered id list and each record lives at `clinic:<collection>:<id>`.
//! Writes are ordered so an interrupted operation leaves at worst an
//! unreferenced record behind, never an index entry without a record:
//! create writes the record before the index, delete drops the index entry
//! before the record. Index read-modify-write cycles run under one write
//! lock so concurrent writers never drop each other's entries.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use shared_models::{Envelope, Record};
use shared_utils::IdGenerator;

use crate::error::StorageError;
use crate::store::{namespaced, KeyValueStore, MemoryStore};

/// Fields a patch can never overwrite.
const PROTECTED_FIELDS: [&str; 2] = ["id", "createdAt"];

pub struct LocalStore {
    kv: Arc<dyn KeyValueStore>,
    ids: IdGenerator,
    write_lock: Mutex<()>,
}

impl LocalStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            ids: IdGenerator::new(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    fn index_key(collection: &str) -> String {
        namespaced(collection)
    }

    fn record_key(collection: &str, id: &str) -> String {
        namespaced(&format!("{}:{}", collection, id))
    }

    fn decode<D: DeserializeOwned>(key: &str, raw: &str) -> Result<D, StorageError> {
        serde_json::from_str(raw).map_err(|source| {
            error!("Corrupted entry at {}: {}", key, source);
            StorageError::Corrupted {
                key: key.to_string(),
                source,
            }
        })
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load_index(&self, collection: &str) -> Result<Option<Vec<String>>, StorageError> {
        let key = Self::index_key(collection);
        let Some(raw) = self.kv.get(&key)? else {
            return Ok(None);
        };

        let ids: Vec<String> = Self::decode(&key, &raw)?;
        for id in &ids {
            self.ids.observe(id);
        }
        Ok(Some(ids))
    }

    /// Lazily initializes a missing collection to empty.
    fn index(&self, collection: &str) -> Result<Vec<String>, StorageError> {
        if let Some(ids) = self.load_index(collection)? {
            return Ok(ids);
        }
        let _guard = self.lock();
        self.index_locked(collection)
    }

    /// Same as [`Self::index`]; the caller holds the write lock.
    fn index_locked(&self, collection: &str) -> Result<Vec<String>, StorageError> {
        match self.load_index(collection)? {
            Some(ids) => Ok(ids),
            None => {
                debug!("Initializing empty collection {}", collection);
                self.save_index(collection, &[])?;
                Ok(Vec::new())
            }
        }
    }

    fn save_index(&self, collection: &str, ids: &[String]) -> Result<(), StorageError> {
        let raw = serde_json::to_string(ids)?;
        self.kv.set(&Self::index_key(collection), &raw)
    }

    fn load_record<T: Record>(&self, id: &str) -> Result<Option<T>, StorageError> {
        let key = Self::record_key(T::COLLECTION, id);
        match self.kv.get(&key)? {
            Some(raw) => Self::decode(&key, &raw).map(Some),
            None => Ok(None),
        }
    }

    fn save_record<T: Record>(&self, record: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(record)?;
        self.kv.set(&Self::record_key(T::COLLECTION, record.id()), &raw)
    }

    fn to_object<S: Serialize>(value: &S) -> Result<Map<String, Value>, StorageError> {
        match serde_json::to_value(value)? {
            Value::Object(map) => Ok(map),
            other => Err(StorageError::Serialization(serde::ser::Error::custom(format!(
                "expected a JSON object, got {}",
                other
            )))),
        }
    }

    pub fn read<T: Record>(&self) -> Result<Vec<T>, StorageError> {
        let ids = self.index(T::COLLECTION)?;
        self.load_records(&ids)
    }

    fn load_records<T: Record>(&self, ids: &[String]) -> Result<Vec<T>, StorageError> {
        let mut records = Vec::with_capacity(ids.len());

        for id in ids {
            match self.load_record::<T>(id)? {
                Some(record) => records.push(record),
                None => warn!("{} index references missing record {}, skipping", T::COLLECTION, id),
            }
        }

        Ok(records)
    }

    pub fn find<T: Record>(&self, id: &str) -> Result<Option<T>, StorageError> {
        let ids = self.index(T::COLLECTION)?;
        self.find_in(&ids, id)
    }

    fn find_in<T: Record>(&self, ids: &[String], id: &str) -> Result<Option<T>, StorageError> {
        if !ids.iter().any(|existing| existing == id) {
            return Ok(None);
        }
        self.load_record(id)
    }

    pub fn create<T, I>(&self, input: &I) -> Result<Envelope<T>, StorageError>
    where
        T: Record,
        I: Serialize,
    {
        let _guard = self.lock();
        let mut ids = self.index_locked(T::COLLECTION)?;
        let mut id = self.ids.next_id();
        while ids.contains(&id) {
            id = self.ids.next_id();
        }

        let mut fields = Self::to_object(input)?;
        fields.insert("id".to_string(), Value::String(id.clone()));
        fields.insert("createdAt".to_string(), serde_json::to_value(Utc::now())?);

        let record: T = serde_json::from_value(Value::Object(fields))?;
        self.save_record(&record)?;
        ids.push(id);
        self.save_index(T::COLLECTION, &ids)?;

        debug!("Created {} {}", T::SINGULAR, record.id());
        Ok(Envelope::new(format!("{} created", T::SINGULAR), record))
    }

    /// Shallow-merges `patch` into the stored record.
    pub fn update<T, P>(&self, id: &str, patch: &P) -> Result<Envelope<T>, StorageError>
    where
        T: Record,
        P: Serialize,
    {
        let _guard = self.lock();
        let ids = self.index_locked(T::COLLECTION)?;
        let existing: T = self.find_in(&ids, id)?.ok_or_else(|| StorageError::NotFound {
            collection: T::COLLECTION.to_string(),
            id: id.to_string(),
        })?;

        let mut fields = Self::to_object(&existing)?;
        for (field, value) in Self::to_object(patch)? {
            if PROTECTED_FIELDS.contains(&field.as_str()) {
                continue;
            }
            fields.insert(field, value);
        }
        fields.insert("updatedAt".to_string(), serde_json::to_value(Utc::now())?);

        let record: T = serde_json::from_value(Value::Object(fields))?;
        self.save_record(&record)?;

        debug!("Updated {} {}", T::SINGULAR, id);
        Ok(Envelope::new(format!("{} updated", T::SINGULAR), record))
    }

    /// Returns whether a record was removed; a missing id is not an error.
    pub fn delete<T: Record>(&self, id: &str) -> Result<bool, StorageError> {
        let _guard = self.lock();
        let mut ids = self.index_locked(T::COLLECTION)?;
        let Some(position) = ids.iter().position(|existing| existing == id) else {
            debug!("Delete of missing {} {} ignored", T::SINGULAR, id);
            return Ok(false);
        };

        ids.remove(position);
        self.save_index(T::COLLECTION, &ids)?;
        self.kv.remove(&Self::record_key(T::COLLECTION, id))?;

        debug!("Deleted {} {}", T::SINGULAR, id);
        Ok(true)
    }

    /// Keeps only the records matching `keep`; returns how many were removed.
    pub fn retain<T, F>(&self, keep: F) -> Result<usize, StorageError>
    where
        T: Record,
        F: Fn(&T) -> bool,
    {
        let _guard = self.lock();
        let ids = self.index_locked(T::COLLECTION)?;
        let records = self.load_records::<T>(&ids)?;
        let doomed: HashSet<String> = records
            .iter()
            .filter(|record| !keep(record))
            .map(|record| record.id().to_string())
            .collect();

        if doomed.is_empty() {
            return Ok(0);
        }

        let remaining: Vec<String> = ids
            .into_iter()
            .filter(|id| !doomed.contains(id))
            .collect();
        self.save_index(T::COLLECTION, &remaining)?;

        for id in &doomed {
            self.kv.remove(&Self::record_key(T::COLLECTION, id))?;
        }

        debug!("Removed {} records from {}", doomed.len(), T::COLLECTION);
        Ok(doomed.len())
    }

    /// Overwrites the whole collection.
    pub fn replace_all<T: Record>(&self, records: &[T]) -> Result<(), StorageError> {
        let _guard = self.lock();
        let previous = self.index_locked(T::COLLECTION)?;

        for record in records {
            self.save_record(record)?;
        }
        let ids: Vec<String> = records.iter().map(|record| record.id().to_string()).collect();
        self.save_index(T::COLLECTION, &ids)?;

        let kept: HashSet<&String> = ids.iter().collect();
        for stale in previous.iter().filter(|id| !kept.contains(id)) {
            self.kv.remove(&Self::record_key(T::COLLECTION, stale))?;
        }

        Ok(())
    }

    pub fn load_document<D: DeserializeOwned>(&self, key: &str) -> Result<Option<D>, StorageError> {
        let key = namespaced(key);
        match self.kv.get(&key)? {
            Some(raw) => Self::decode(&key, &raw).map(Some),
            None => Ok(None),
        }
    }

    pub fn save_document<D: Serialize>(&self, key: &str, document: &D) -> Result<(), StorageError> {
        let raw = serde_json::to_string(document)?;
        self.kv.set(&namespaced(key), &raw)
    }

    pub fn remove_document(&self, key: &str) -> Result<(), StorageError> {
        self.kv.remove(&namespaced(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use shared_models::{ClinicalSession, NewPatient, Patient, PatientPatch};
    use std::collections::HashSet;

    fn store_with_backend() -> (LocalStore, Arc<MemoryStore>) {
        let kv = Arc::new(MemoryStore::new());
        (LocalStore::new(kv.clone()), kv)
    }

    #[test]
    fn test_missing_collection_initializes_empty() {
        let (store, kv) = store_with_backend();

        let patients = store.read::<Patient>().unwrap();

        assert!(patients.is_empty());
        assert_eq!(kv.get("clinic:patients").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_create_assigns_id_and_timestamp() {
        let (store, kv) = store_with_backend();

        let envelope = store.create::<Patient, _>(&NewPatient::named("Ana")).unwrap();

        assert_eq!(envelope.message, "patient created");
        assert!(!envelope.record.id.is_empty());
        assert!(envelope.record.updated_at.is_none());

        let index = kv.get("clinic:patients").unwrap().unwrap();
        assert!(index.contains(&envelope.record.id));
        assert_eq!(store.read::<Patient>().unwrap(), vec![envelope.record]);
    }

    #[test]
    fn test_created_ids_are_pairwise_distinct() {
        let store = LocalStore::in_memory();

        let ids: HashSet<String> = (0..50)
            .map(|i| {
                store
                    .create::<Patient, _>(&NewPatient::named(format!("P{}", i)))
                    .unwrap()
                    .record
                    .id
            })
            .collect();

        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn test_concurrent_creates_are_all_kept() {
        let store = Arc::new(LocalStore::in_memory());

        let created: Vec<String> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|worker| {
                    let store = Arc::clone(&store);
                    scope.spawn(move || {
                        (0..50)
                            .map(|i| {
                                store
                                    .create::<Patient, _>(&NewPatient::named(format!("W{}-{}", worker, i)))
                                    .unwrap()
                                    .record
                                    .id
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            workers.into_iter().flat_map(|w| w.join().unwrap()).collect()
        });

        let stored: HashSet<String> = store.read::<Patient>().unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(created.len(), 400);
        assert_eq!(stored.len(), 400);
        assert!(created.iter().all(|id| stored.contains(id)));
    }

    #[test]
    fn test_concurrent_deletes_and_creates_keep_survivors() {
        let store = Arc::new(LocalStore::in_memory());
        let doomed: Vec<String> = (0..100)
            .map(|i| store.create::<Patient, _>(&NewPatient::named(format!("D{}", i))).unwrap().record.id)
            .collect();

        let kept: Vec<String> = std::thread::scope(|scope| {
            let deleter = {
                let store = Arc::clone(&store);
                let doomed = doomed.clone();
                scope.spawn(move || {
                    for id in &doomed {
                        assert!(store.delete::<Patient>(id).unwrap());
                    }
                })
            };
            let creator = {
                let store = Arc::clone(&store);
                scope.spawn(move || {
                    (0..100)
                        .map(|i| store.create::<Patient, _>(&NewPatient::named(format!("K{}", i))).unwrap().record.id)
                        .collect::<Vec<_>>()
                })
            };
            deleter.join().unwrap();
            creator.join().unwrap()
        });

        let stored: HashSet<String> = store.read::<Patient>().unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(stored, kept.into_iter().collect::<HashSet<_>>());
    }

    #[test]
    fn test_update_merges_patch_and_protects_identity() {
        let store = LocalStore::in_memory();
        let created = store.create::<Patient, _>(&NewPatient::named("Ana")).unwrap().record;

        let patch = serde_json::json!({ "id": "hijack", "phone": "555", "createdAt": "2000-01-01T00:00:00Z" });
        let updated = store.update::<Patient, _>(&created.id, &patch).unwrap().record;

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.name, "Ana");
        assert_eq!(updated.phone.as_deref(), Some("555"));
        assert!(updated.updated_at.is_some());
    }

    #[test]
    fn test_update_miss_is_not_found_and_leaves_collection_unchanged() {
        let store = LocalStore::in_memory();
        store.create::<Patient, _>(&NewPatient::named("Ana")).unwrap();
        let before = store.read::<Patient>().unwrap();

        let patch = PatientPatch {
            name: Some("Bia".to_string()),
            ..Default::default()
        };
        let result = store.update::<Patient, _>("nonexistent-id", &patch);

        assert_matches!(result, Err(StorageError::NotFound { .. }));
        assert_eq!(store.read::<Patient>().unwrap(), before);
    }

    #[test]
    fn test_delete_is_tolerant_of_missing_ids() {
        let store = LocalStore::in_memory();
        let created = store.create::<Patient, _>(&NewPatient::named("Ana")).unwrap().record;

        assert!(store.delete::<Patient>(&created.id).unwrap());
        assert!(!store.delete::<Patient>(&created.id).unwrap());
        assert!(store.find::<Patient>(&created.id).unwrap().is_none());
    }

    #[test]
    fn test_corrupted_record_fails_fast() {
        let (store, kv) = store_with_backend();
        let created = store.create::<Patient, _>(&NewPatient::named("Ana")).unwrap().record;
        kv.set(&format!("clinic:patients:{}", created.id), "{not json").unwrap();

        assert_matches!(store.read::<Patient>(), Err(StorageError::Corrupted { .. }));
    }

    #[test]
    fn test_record_with_wrong_shape_is_corrupted() {
        let (store, kv) = store_with_backend();
        kv.set("clinic:sessions", "[\"1\"]").unwrap();
        kv.set("clinic:sessions:1", "{\"id\":\"1\",\"patientId\":\"2\"}").unwrap();

        assert_matches!(store.read::<ClinicalSession>(), Err(StorageError::Corrupted { .. }));
    }

    #[test]
    fn test_retain_removes_only_non_matching() {
        let store = LocalStore::in_memory();
        for name in ["Ana", "Bia", "Ana"] {
            store.create::<Patient, _>(&NewPatient::named(name)).unwrap();
        }

        let removed = store.retain::<Patient, _>(|p| p.name != "Ana").unwrap();

        assert_eq!(removed, 2);
        let names: Vec<String> = store.read::<Patient>().unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Bia".to_string()]);
    }

    #[test]
    fn test_replace_all_drops_stale_records() {
        let (store, kv) = store_with_backend();
        let old = store.create::<Patient, _>(&NewPatient::named("Old")).unwrap().record;

        store.replace_all::<Patient>(&[]).unwrap();

        assert!(store.read::<Patient>().unwrap().is_empty());
        assert!(kv.get(&format!("clinic:patients:{}", old.id)).unwrap().is_none());
    }

    #[test]
    fn test_documents_roundtrip() {
        let store = LocalStore::in_memory();

        assert!(store.load_document::<Vec<String>>("notifications").unwrap().is_none());
        store.save_document("notifications", &vec!["a".to_string()]).unwrap();
        assert_eq!(
            store.load_document::<Vec<String>>("notifications").unwrap(),
            Some(vec!["a".to_string()])
        );

        store.remove_document("notifications").unwrap();
        assert!(store.load_document::<Vec<String>>("notifications").unwrap().is_none());
    }
}
