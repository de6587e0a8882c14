//! An in-process document store
//!
//! This is the [`DocumentStore`] every test and demo runs against: documents
//! live in process memory, optionally persisted to a JSON file. Integration
//! tests also use it to mock the *remote* store, the same way a cached source
//! can stand in for a server.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::traits::{Document, DocumentStore};

#[cfg(feature = "local_store_mocks_remote_store")]
use std::sync::{Arc, Mutex};
#[cfg(feature = "local_store_mocks_remote_store")]
use crate::mock_behaviour::MockBehaviour;

/// A document store backed by process memory, optionally persisted to a file
pub struct LocalStore {
    backing_file: Option<PathBuf>,
    data: RwLock<StoreData>,

    #[cfg(feature = "local_store_mocks_remote_store")]
    mock_behaviour: Option<Arc<Mutex<MockBehaviour>>>,
}

#[derive(Default, Debug, PartialEq, Serialize, Deserialize)]
struct StoreData {
    /// user id -> collection -> document id -> document
    users: HashMap<String, HashMap<String, HashMap<String, Document>>>,
}

impl LocalStore {
    /// A store that lives in memory only
    pub fn new() -> Self {
        Self {
            backing_file: None,
            data: RwLock::new(StoreData::default()),
            #[cfg(feature = "local_store_mocks_remote_store")]
            mock_behaviour: None,
        }
    }

    /// A fresh store that will persist to `path` on every write
    pub fn new_with_file(path: &Path) -> Self {
        Self {
            backing_file: Some(PathBuf::from(path)),
            data: RwLock::new(StoreData::default()),
            #[cfg(feature = "local_store_mocks_remote_store")]
            mock_behaviour: None,
        }
    }

    /// Initialize a store from the content of a valid backing file if it exists.
    /// Returns an error otherwise
    pub fn from_file(path: &Path) -> Result<Self, StoreError> {
        let data = match std::fs::File::open(path) {
            Err(err) => {
                return Err(StoreError::Permanent(format!("Unable to open file {:?}: {}", path, err)));
            },
            Ok(file) => serde_json::from_reader(file)
                .map_err(|err| StoreError::Permanent(format!("Unable to parse file {:?}: {}", path, err)))?,
        };

        Ok(Self {
            backing_file: Some(PathBuf::from(path)),
            data: RwLock::new(data),
            #[cfg(feature = "local_store_mocks_remote_store")]
            mock_behaviour: None,
        })
    }

    #[cfg(feature = "local_store_mocks_remote_store")]
    pub fn set_mock_behaviour(&mut self, behaviour: Option<Arc<Mutex<MockBehaviour>>>) {
        self.mock_behaviour = behaviour;
    }

    /// Store the current contents to the backing file, if any
    fn save_to_file(&self) {
        let path = match &self.backing_file {
            None => return,
            Some(path) => path,
        };

        let file = match std::fs::File::create(path) {
            Err(err) => {
                log::warn!("Unable to save file {:?}: {}", path, err);
                return;
            },
            Ok(f) => f,
        };

        let data = self.data.read().unwrap();
        if let Err(err) = serde_json::to_writer(file, &*data) {
            log::warn!("Unable to serialize: {}", err);
        }
    }

    /// Compares two stores to check they have the same current content
    #[cfg(any(test, feature = "integration_tests"))]
    pub fn has_same_contents_than(&self, other: &Self) -> bool {
        let data_l = self.data.read().unwrap();
        let data_r = other.data.read().unwrap();
        *data_l == *data_r
    }
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for LocalStore {
    async fn get(&self, user_id: &str, collection: &str, document_id: &str) -> Result<Option<Document>, StoreError> {
        #[cfg(feature = "local_store_mocks_remote_store")]
        if let Some(behaviour) = &self.mock_behaviour {
            behaviour.lock().unwrap().can_get()?;
        }

        let data = self.data.read().unwrap();
        Ok(data.users
            .get(user_id)
            .and_then(|collections| collections.get(collection))
            .and_then(|documents| documents.get(document_id))
            .cloned())
    }

    async fn set(&self, user_id: &str, collection: &str, document_id: &str, document: Document) -> Result<(), StoreError> {
        #[cfg(feature = "local_store_mocks_remote_store")]
        if let Some(behaviour) = &self.mock_behaviour {
            behaviour.lock().unwrap().can_set()?;
        }

        {
            let mut data = self.data.write().unwrap();
            data.users
                .entry(user_id.to_string())
                .or_default()
                .entry(collection.to_string())
                .or_default()
                .insert(document_id.to_string(), document);
        }
        self.save_to_file();
        Ok(())
    }

    async fn merge(&self, user_id: &str, collection: &str, document_id: &str, fields: Document) -> Result<(), StoreError> {
        #[cfg(feature = "local_store_mocks_remote_store")]
        if let Some(behaviour) = &self.mock_behaviour {
            behaviour.lock().unwrap().can_merge()?;
        }

        {
            let mut data = self.data.write().unwrap();
            let document = data.users
                .entry(user_id.to_string())
                .or_default()
                .entry(collection.to_string())
                .or_default()
                .entry(document_id.to_string())
                .or_default();
            for (key, value) in fields {
                document.insert(key, value);
            }
        }
        self.save_to_file();
        Ok(())
    }

    async fn list(&self, user_id: &str, collection: &str) -> Result<HashMap<String, Document>, StoreError> {
        #[cfg(feature = "local_store_mocks_remote_store")]
        if let Some(behaviour) = &self.mock_behaviour {
            behaviour.lock().unwrap().can_list()?;
        }

        let data = self.data.read().unwrap();
        Ok(data.users
            .get(user_id)
            .and_then(|collections| collections.get(collection))
            .cloned()
            .unwrap_or_default())
    }

    async fn delete(&self, user_id: &str, collection: &str, document_id: &str) -> Result<(), StoreError> {
        #[cfg(feature = "local_store_mocks_remote_store")]
        if let Some(behaviour) = &self.mock_behaviour {
            behaviour.lock().unwrap().can_delete()?;
        }

        {
            let mut data = self.data.write().unwrap();
            if let Some(documents) = data.users
                .get_mut(user_id)
                .and_then(|collections| collections.get_mut(collection))
            {
                documents.remove(document_id);
            }
        }
        self.save_to_file();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn document(pairs: &[(&str, serde_json::Value)]) -> Document {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = LocalStore::new();

        store.set("user-1", "events", "a", document(&[("title", json!("A"))])).await.unwrap();
        let fetched = store.get("user-1", "events", "a").await.unwrap().unwrap();
        assert_eq!(fetched.get("title"), Some(&json!("A")));

        // No cross-user visibility
        assert!(store.get("user-2", "events", "a").await.unwrap().is_none());

        store.delete("user-1", "events", "a").await.unwrap();
        assert!(store.get("user-1", "events", "a").await.unwrap().is_none());
        // Deleting an absent document is not an error
        store.delete("user-1", "events", "a").await.unwrap();
    }

    #[tokio::test]
    async fn test_merge_is_key_level() {
        let store = LocalStore::new();

        store.merge("user-1", "settings", "preferences", document(&[
            ("theme", json!("dark")),
            ("sync_on_launch", json!(true)),
        ])).await.unwrap();
        store.merge("user-1", "settings", "preferences", document(&[
            ("theme", json!("light")),
        ])).await.unwrap();

        let merged = store.get("user-1", "settings", "preferences").await.unwrap().unwrap();
        assert_eq!(merged.get("theme"), Some(&json!("light")));
        assert_eq!(merged.get("sync_on_launch"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_list_is_scoped_to_one_collection() {
        let store = LocalStore::new();
        store.set("user-1", "events", "a", document(&[("title", json!("A"))])).await.unwrap();
        store.set("user-1", "events", "b", document(&[("title", json!("B"))])).await.unwrap();
        store.set("user-1", "settings", "preferences", document(&[])).await.unwrap();

        let listed = store.list("user-1", "events").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.contains_key("a") && listed.contains_key("b"));
    }

    #[tokio::test]
    async fn test_serde_store() {
        let store_path = std::env::temp_dir().join("datebook-store-test.json");

        let store = LocalStore::new_with_file(&store_path);
        store.set("user-1", "events", "a", document(&[("title", json!("A"))])).await.unwrap();

        let retrieved_store = LocalStore::from_file(&store_path).unwrap();
        assert!(store.has_same_contents_than(&retrieved_store));

        let _ = std::fs::remove_file(&store_path);
    }
}
