//! Database handle - open semantics, CRUD, and index maintenance.
//!
//! A [`Database`] starts closed and becomes usable after [`Database::open`].
//! Opening loads the on-disk image (or creates a fresh one), creates the
//! collections declared by the schemas on first creation or version upgrade,
//! and rebuilds all secondary indexes in memory. Every mutation rewrites the
//! image atomically (temp file + rename).

use crate::{
    error::Result, image::DatabaseImage, schema::CollectionSchema, CollectionName, Error,
    IndexName, Key, SchemaVersion,
};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use tokio::sync::RwLock;

/// In-memory entries of one secondary index.
///
/// Values are keyed by their canonical JSON encoding; items lacking the
/// indexed field are simply absent from the index.
#[derive(Debug)]
struct IndexEntries {
    key_path: String,
    unique: bool,
    entries: BTreeMap<String, BTreeSet<Key>>,
}

impl IndexEntries {
    fn remove(&mut self, value: &str, key: Key) {
        if let Some(keys) = self.entries.get_mut(value) {
            keys.remove(&key);
            if keys.is_empty() {
                self.entries.remove(value);
            }
        }
    }
}

/// Per-collection runtime state: the schema it was opened with plus its
/// rebuilt indexes. Items live in the image.
#[derive(Debug)]
struct CollectionState {
    schema: CollectionSchema,
    indexes: HashMap<IndexName, IndexEntries>,
}

#[derive(Debug)]
struct DbState {
    image: DatabaseImage,
    collections: HashMap<CollectionName, CollectionState>,
}

/// Handle to a versioned, file-backed database.
///
/// Construction does no IO; all operations other than [`Database::open`]
/// fail with [`Error::NotInitialized`] until the database has been opened.
#[derive(Debug)]
pub struct Database {
    dir: PathBuf,
    path: PathBuf,
    name: String,
    version: SchemaVersion,
    state: RwLock<Option<DbState>>,
}

impl Database {
    /// Create a closed handle for a database stored under `dir`.
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>, version: SchemaVersion) -> Self {
        let dir = dir.into();
        let name = name.into();
        let path = dir.join(format!("{name}.json"));
        Self {
            dir,
            path,
            name,
            version,
            state: RwLock::new(None),
        }
    }

    /// Database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schema version this handle was constructed with.
    pub fn version(&self) -> SchemaVersion {
        self.version
    }

    /// Whether `open` has completed on this handle.
    pub async fn is_open(&self) -> bool {
        self.state.read().await.is_some()
    }

    /// Open the database, creating it if absent.
    ///
    /// Collections declared in `schemas` are created on first creation or
    /// when the requested version is higher than the stored one; an open
    /// with the same version leaves existing collections untouched. Opening
    /// with a version lower than the stored one fails. Calling `open` on an
    /// already-open handle is a no-op.
    pub async fn open(&self, schemas: Vec<CollectionSchema>) -> Result<()> {
        let mut guard = self.state.write().await;
        if guard.is_some() {
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::Database(format!("failed to create data directory: {e}")))?;

        let (mut image, upgrading) = match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => {
                let image = DatabaseImage::from_json(&json)?;
                if self.version < image.version {
                    return Err(Error::Database(format!(
                        "requested version {} is older than stored version {}",
                        self.version, image.version
                    )));
                }
                let upgrading = self.version > image.version;
                (image, upgrading)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                (DatabaseImage::new(&self.name, self.version), true)
            }
            Err(e) => {
                return Err(Error::Database(format!("failed to read image: {e}")));
            }
        };

        if upgrading {
            image.version = self.version;
            for schema in &schemas {
                image.create_collection(&schema.name);
            }
        }

        let mut collections = HashMap::new();
        for schema in schemas {
            let Some(items) = image.collection(&schema.name) else {
                // Declared but never created (no upgrade happened); skip.
                continue;
            };
            let indexes = build_indexes(&schema, items)?;
            collections.insert(schema.name.clone(), CollectionState { schema, indexes });
        }

        self.persist(&image).await?;
        *guard = Some(DbState { image, collections });
        Ok(())
    }

    /// Insert a new item, returning its extracted primary key.
    ///
    /// Fails with [`Error::Constraint`] when the key or a unique-indexed
    /// field value is already present.
    pub async fn add(&self, collection: &str, item: Value) -> Result<Key> {
        let mut guard = self.state.write().await;
        let state = guard.as_mut().ok_or(Error::NotInitialized)?;
        let col = lookup_mut(&mut state.collections, collection)?;
        let key = col.schema.extract_key(&item)?;

        let items = state
            .image
            .collection_mut(collection)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;
        if items.contains_key(&key) {
            return Err(Error::Constraint {
                collection: collection.to_string(),
                reason: format!("key {key} already exists"),
            });
        }
        for index in col.indexes.values() {
            if !index.unique {
                continue;
            }
            if let Some(value) = index_value(&item, &index.key_path) {
                if index.entries.get(&value).is_some_and(|keys| !keys.is_empty()) {
                    return Err(Error::Constraint {
                        collection: collection.to_string(),
                        reason: format!("duplicate value {value} for unique index"),
                    });
                }
            }
        }

        for index in col.indexes.values_mut() {
            if let Some(value) = index_value(&item, &index.key_path) {
                index.entries.entry(value).or_default().insert(key);
            }
        }
        items.insert(key, item);
        self.persist(&state.image).await?;
        Ok(key)
    }

    /// Look up an item by primary key. Absent items are `None`, not errors.
    pub async fn get(&self, collection: &str, key: Key) -> Result<Option<Value>> {
        let guard = self.state.read().await;
        let state = guard.as_ref().ok_or(Error::NotInitialized)?;
        lookup(&state.collections, collection)?;
        Ok(state
            .image
            .collection(collection)
            .and_then(|items| items.get(&key))
            .cloned())
    }

    /// All items of a collection in primary-key order.
    pub async fn get_all(&self, collection: &str) -> Result<Vec<Value>> {
        let guard = self.state.read().await;
        let state = guard.as_ref().ok_or(Error::NotInitialized)?;
        lookup(&state.collections, collection)?;
        Ok(state
            .image
            .collection(collection)
            .map(|items| items.values().cloned().collect())
            .unwrap_or_default())
    }

    /// All items whose indexed field equals `value`, in primary-key order.
    pub async fn get_by_index(
        &self,
        collection: &str,
        index: &str,
        value: &Value,
    ) -> Result<Vec<Value>> {
        let guard = self.state.read().await;
        let state = guard.as_ref().ok_or(Error::NotInitialized)?;
        let col = lookup(&state.collections, collection)?;
        let entries = col
            .indexes
            .get(index)
            .ok_or_else(|| Error::IndexNotFound(index.to_string()))?;

        let Some(items) = state.image.collection(collection) else {
            return Ok(Vec::new());
        };
        Ok(entries
            .entries
            .get(&value.to_string())
            .into_iter()
            .flatten()
            .filter_map(|key| items.get(key).cloned())
            .collect())
    }

    /// Insert or overwrite the item identified by its extracted key.
    ///
    /// Unique-index checks exclude the item being replaced, so rewriting a
    /// record with its own values is always allowed.
    pub async fn update(&self, collection: &str, item: Value) -> Result<Key> {
        let mut guard = self.state.write().await;
        let state = guard.as_mut().ok_or(Error::NotInitialized)?;
        let col = lookup_mut(&mut state.collections, collection)?;
        let key = col.schema.extract_key(&item)?;

        let items = state
            .image
            .collection_mut(collection)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;
        for index in col.indexes.values() {
            if !index.unique {
                continue;
            }
            if let Some(value) = index_value(&item, &index.key_path) {
                let taken = index
                    .entries
                    .get(&value)
                    .is_some_and(|keys| keys.iter().any(|k| *k != key));
                if taken {
                    return Err(Error::Constraint {
                        collection: collection.to_string(),
                        reason: format!("duplicate value {value} for unique index"),
                    });
                }
            }
        }

        let previous = items.insert(key, item.clone());
        for index in col.indexes.values_mut() {
            if let Some(old) = previous
                .as_ref()
                .and_then(|p| index_value(p, &index.key_path))
            {
                index.remove(&old, key);
            }
            if let Some(value) = index_value(&item, &index.key_path) {
                index.entries.entry(value).or_default().insert(key);
            }
        }
        self.persist(&state.image).await?;
        Ok(key)
    }

    /// Remove the item with the given key. Absent keys are a no-op.
    pub async fn delete(&self, collection: &str, key: Key) -> Result<()> {
        let mut guard = self.state.write().await;
        let state = guard.as_mut().ok_or(Error::NotInitialized)?;
        let col = lookup_mut(&mut state.collections, collection)?;

        let items = state
            .image
            .collection_mut(collection)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;
        let Some(removed) = items.remove(&key) else {
            return Ok(());
        };
        for index in col.indexes.values_mut() {
            if let Some(value) = index_value(&removed, &index.key_path) {
                index.remove(&value, key);
            }
        }
        self.persist(&state.image).await?;
        Ok(())
    }

    /// Remove all items and index entries of a collection.
    pub async fn clear(&self, collection: &str) -> Result<()> {
        let mut guard = self.state.write().await;
        let state = guard.as_mut().ok_or(Error::NotInitialized)?;
        let col = lookup_mut(&mut state.collections, collection)?;

        let items = state
            .image
            .collection_mut(collection)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;
        items.clear();
        for index in col.indexes.values_mut() {
            index.entries.clear();
        }
        self.persist(&state.image).await?;
        Ok(())
    }

    async fn persist(&self, image: &DatabaseImage) -> Result<()> {
        let json = image.to_json()?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| Error::Database(format!("failed to write image: {e}")))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| Error::Database(format!("failed to replace image: {e}")))?;
        Ok(())
    }
}

fn lookup<'a>(
    collections: &'a HashMap<CollectionName, CollectionState>,
    name: &str,
) -> Result<&'a CollectionState> {
    collections
        .get(name)
        .ok_or_else(|| Error::CollectionNotFound(name.to_string()))
}

fn lookup_mut<'a>(
    collections: &'a mut HashMap<CollectionName, CollectionState>,
    name: &str,
) -> Result<&'a mut CollectionState> {
    collections
        .get_mut(name)
        .ok_or_else(|| Error::CollectionNotFound(name.to_string()))
}

/// Canonical index key for an item's field, if the field is present.
fn index_value(item: &Value, key_path: &str) -> Option<String> {
    item.get(key_path)
        .filter(|v| !v.is_null())
        .map(Value::to_string)
}

fn build_indexes(
    schema: &CollectionSchema,
    items: &BTreeMap<Key, Value>,
) -> Result<HashMap<IndexName, IndexEntries>> {
    let mut indexes = HashMap::new();
    for def in &schema.indexes {
        let mut index = IndexEntries {
            key_path: def.key_path.clone(),
            unique: def.unique,
            entries: BTreeMap::new(),
        };
        for (key, item) in items {
            let Some(value) = index_value(item, &def.key_path) else {
                continue;
            };
            let keys = index.entries.entry(value.clone()).or_default();
            if def.unique && !keys.is_empty() {
                return Err(Error::Constraint {
                    collection: schema.name.clone(),
                    reason: format!("duplicate value {value} for unique index '{}'", def.name),
                });
            }
            keys.insert(*key);
        }
        indexes.insert(def.name.clone(), index);
    }
    Ok(indexes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::IndexDef;
    use serde_json::json;
    use tempfile::TempDir;

    fn schemas() -> Vec<CollectionSchema> {
        vec![
            CollectionSchema::new("customers", "id")
                .with_index(IndexDef::unique("email", "email"))
                .with_index(IndexDef::non_unique("name", "name")),
            CollectionSchema::new("pendingSync", "timestamp"),
        ]
    }

    async fn open_db(dir: &TempDir) -> Database {
        let db = Database::new(dir.path(), "testdb", 1);
        db.open(schemas()).await.unwrap();
        db
    }

    #[tokio::test]
    async fn operations_before_open_fail() {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path(), "testdb", 1);

        let err = db.add("customers", json!({"id": 1})).await.unwrap_err();
        assert_eq!(err, Error::NotInitialized);
        let err = db.get("customers", 1).await.unwrap_err();
        assert_eq!(err, Error::NotInitialized);
        let err = db.get_all("customers").await.unwrap_err();
        assert_eq!(err, Error::NotInitialized);
        let err = db.delete("customers", 1).await.unwrap_err();
        assert_eq!(err, Error::NotInitialized);
    }

    #[tokio::test]
    async fn add_and_get() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir).await;

        let item = json!({"id": 1, "name": "Alice", "email": "alice@example.com"});
        let key = db.add("customers", item.clone()).await.unwrap();
        assert_eq!(key, 1);

        assert_eq!(db.get("customers", 1).await.unwrap(), Some(item));
        assert_eq!(db.get("customers", 2).await.unwrap(), None);
    }

    #[tokio::test]
    async fn add_duplicate_key_fails() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir).await;

        db.add("customers", json!({"id": 1, "email": "a@x.com"}))
            .await
            .unwrap();
        let err = db
            .add("customers", json!({"id": 1, "email": "b@x.com"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Constraint { .. }));
    }

    #[tokio::test]
    async fn unique_index_rejects_duplicates() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir).await;

        db.add("customers", json!({"id": 1, "email": "a@x.com"}))
            .await
            .unwrap();
        let err = db
            .add("customers", json!({"id": 2, "email": "a@x.com"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Constraint { .. }));

        // The rejected item must not be visible.
        assert_eq!(db.get_all("customers").await.unwrap().len(), 1);
        assert_eq!(db.get("customers", 2).await.unwrap(), None);
    }

    #[tokio::test]
    async fn get_all_is_key_ordered() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir).await;

        for id in [3u64, 1, 2] {
            db.add("customers", json!({"id": id, "email": format!("{id}@x.com")}))
                .await
                .unwrap();
        }

        let ids: Vec<u64> = db
            .get_all("customers")
            .await
            .unwrap()
            .iter()
            .map(|v| v["id"].as_u64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn update_overwrites_in_place() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir).await;

        db.add("customers", json!({"id": 1, "name": "Alice", "email": "a@x.com"}))
            .await
            .unwrap();
        db.update("customers", json!({"id": 1, "name": "Alicia", "email": "a@x.com"}))
            .await
            .unwrap();

        let all = db.get_all("customers").await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0]["name"], "Alicia");
    }

    #[tokio::test]
    async fn update_inserts_when_absent() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir).await;

        db.update("customers", json!({"id": 5, "email": "e@x.com"}))
            .await
            .unwrap();
        assert!(db.get("customers", 5).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn update_unique_check_excludes_self() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir).await;

        db.add("customers", json!({"id": 1, "email": "a@x.com"}))
            .await
            .unwrap();
        db.add("customers", json!({"id": 2, "email": "b@x.com"}))
            .await
            .unwrap();

        // Keeping your own email is fine.
        db.update("customers", json!({"id": 1, "email": "a@x.com", "name": "Alice"}))
            .await
            .unwrap();

        // Taking someone else's is not.
        let err = db
            .update("customers", json!({"id": 2, "email": "a@x.com"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Constraint { .. }));
    }

    #[tokio::test]
    async fn update_moves_index_entries() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir).await;

        db.add("customers", json!({"id": 1, "email": "old@x.com"}))
            .await
            .unwrap();
        db.update("customers", json!({"id": 1, "email": "new@x.com"}))
            .await
            .unwrap();

        // The old value is free for someone else now.
        db.add("customers", json!({"id": 2, "email": "old@x.com"}))
            .await
            .unwrap();

        let hits = db
            .get_by_index("customers", "email", &json!("new@x.com"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["id"], 1);
    }

    #[tokio::test]
    async fn delete_removes_item_and_index_entry() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir).await;

        db.add("customers", json!({"id": 1, "email": "a@x.com"}))
            .await
            .unwrap();
        db.delete("customers", 1).await.unwrap();

        assert!(db.get_all("customers").await.unwrap().is_empty());

        // Email is available again.
        db.add("customers", json!({"id": 2, "email": "a@x.com"}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn delete_absent_is_noop() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir).await;

        db.add("customers", json!({"id": 1, "email": "a@x.com"}))
            .await
            .unwrap();
        db.delete("customers", 999).await.unwrap();
        assert_eq!(db.get_all("customers").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn clear_empties_collection() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir).await;

        for id in 1..=3u64 {
            db.add("customers", json!({"id": id, "email": format!("{id}@x.com")}))
                .await
                .unwrap();
        }
        db.clear("customers").await.unwrap();
        assert!(db.get_all("customers").await.unwrap().is_empty());

        // Unique values are released by clear.
        db.add("customers", json!({"id": 10, "email": "1@x.com"}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn get_by_index_non_unique() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir).await;

        db.add("customers", json!({"id": 1, "name": "Alice", "email": "a@x.com"}))
            .await
            .unwrap();
        db.add("customers", json!({"id": 2, "name": "Alice", "email": "b@x.com"}))
            .await
            .unwrap();
        db.add("customers", json!({"id": 3, "name": "Bob", "email": "c@x.com"}))
            .await
            .unwrap();

        let hits = db
            .get_by_index("customers", "name", &json!("Alice"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);

        let none = db
            .get_by_index("customers", "name", &json!("Carol"))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn unknown_collection_and_index() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir).await;

        let err = db.get_all("orders").await.unwrap_err();
        assert!(matches!(err, Error::CollectionNotFound(_)));

        let err = db
            .get_by_index("customers", "phone", &json!("555"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::IndexNotFound(_)));
    }

    #[tokio::test]
    async fn open_twice_is_noop() {
        let dir = TempDir::new().unwrap();
        let db = open_db(&dir).await;
        db.add("customers", json!({"id": 1, "email": "a@x.com"}))
            .await
            .unwrap();

        db.open(schemas()).await.unwrap();
        assert_eq!(db.get_all("customers").await.unwrap().len(), 1);
    }
}
