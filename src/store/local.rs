//! File-backed document store with live snapshots.
//!
//! All collections live in one JSON file. Writes go through a temp file and
//! a rename. Every successful write publishes the new state on a watch
//! channel, which is what [`DocumentStore::watch`] streams from. A reload
//! watcher can poll the file so that writes made by another process reach
//! open feeds as well.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::StoreError;
use crate::store::{Document, DocumentStore, Fields, Query, SnapshotStream};

/// On-disk layout: collection name to documents in insertion order.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Collections {
    #[serde(default)]
    pub collections: BTreeMap<String, Vec<Document>>,
}

impl Collections {
    fn docs(&self, collection: &str) -> &[Document] {
        self.collections.get(collection).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// What the live feed currently publishes.
#[derive(Debug, Clone, Default)]
struct FeedState {
    data: Arc<Collections>,
    error: Option<String>,
}

impl FeedState {
    fn result(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        if let Some(e) = &self.error {
            return Err(StoreError::Feed(e.clone()));
        }
        Ok(self.data.docs(&query.collection).iter().filter(|d| query.matches(d)).cloned().collect())
    }
}

struct Loaded {
    data: Collections,
    modified: Option<SystemTime>,
}

pub struct LocalDocumentStore {
    path: PathBuf,
    state: Mutex<Loaded>,
    feed: watch::Sender<FeedState>,
}

impl LocalDocumentStore {
    /// Open the store at `path`. A missing file is an empty store; a file
    /// that cannot be parsed is an error.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let data = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            parse(&raw)?
        } else {
            Collections::default()
        };
        let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok();
        let (feed, _) = watch::channel(FeedState { data: Arc::new(data.clone()), error: None });

        tracing::debug!(path = %path.display(), "opened document store");
        Ok(LocalDocumentStore {
            path: path.to_path_buf(),
            state: Mutex::new(Loaded { data, modified }),
            feed,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Poll the backing file every `every` and publish changes made by
    /// other processes. The task ends once the store is dropped.
    pub fn spawn_reload_watcher(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else { break };
                store.reload().await;
            }
        })
    }

    /// Re-read the backing file if it changed on disk.
    pub async fn reload(&self) {
        let mut loaded = self.state.lock().await;
        match refresh(&self.path, &mut loaded).await {
            Ok(true) => {
                tracing::debug!(path = %self.path.display(), "store file changed on disk");
                self.publish(&loaded.data);
            }
            Ok(false) => {}
            Err(e) => {
                let msg = e.to_string();
                let changed = self.feed.send_if_modified(|s| {
                    if s.error.as_deref() == Some(msg.as_str()) {
                        false
                    } else {
                        s.error = Some(msg.clone());
                        true
                    }
                });
                if changed {
                    tracing::warn!(error = %msg, "store reload failed");
                }
            }
        }
    }

    fn publish(&self, data: &Collections) {
        self.feed.send_replace(FeedState { data: Arc::new(data.clone()), error: None });
    }

    /// Apply `change` on top of the latest on-disk state, persist, publish.
    async fn mutate<R, F>(&self, change: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Collections) -> Result<R, StoreError> + Send,
    {
        let mut loaded = self.state.lock().await;
        refresh(&self.path, &mut loaded).await?;

        let mut next = loaded.data.clone();
        let out = change(&mut next)?;
        save(&self.path, &next).await?;

        loaded.data = next;
        loaded.modified = modified_at(&self.path).await;
        self.publish(&loaded.data);
        Ok(out)
    }
}

fn parse(raw: &str) -> Result<Collections, StoreError> {
    if raw.trim().is_empty() {
        return Ok(Collections::default());
    }
    serde_json::from_str(raw).map_err(|e| StoreError::Corrupt(e.to_string()))
}

async fn modified_at(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.and_then(|m| m.modified()).ok()
}

/// Reload `loaded` from disk when the file's mtime moved. Returns whether
/// anything was reloaded.
async fn refresh(path: &Path, loaded: &mut Loaded) -> Result<bool, StoreError> {
    let modified = modified_at(path).await;
    if modified.is_none() || modified == loaded.modified {
        return Ok(false);
    }
    let raw = tokio::fs::read_to_string(path).await?;
    loaded.data = parse(&raw)?;
    loaded.modified = modified;
    Ok(true)
}

/// Atomic-ish write via temp file + rename.
async fn save(path: &Path, data: &Collections) -> Result<(), StoreError> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    let tmp = path.with_extension("json.tmp");
    let body = serde_json::to_string_pretty(data).map_err(|e| StoreError::Io(e.to_string()))?;
    tokio::fs::write(&tmp, body).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl DocumentStore for LocalDocumentStore {
    async fn add(&self, collection: &str, fields: Fields) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let doc = Document { id: id.clone(), fields };
        self.mutate(|data| {
            data.collections.entry(collection.to_string()).or_default().push(doc);
            Ok(())
        })
        .await?;
        tracing::info!(collection, %id, "document added");
        Ok(id)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let mut loaded = self.state.lock().await;
        refresh(&self.path, &mut loaded).await?;
        Ok(loaded.data.docs(collection).iter().find(|d| d.id == id).cloned())
    }

    async fn update(&self, collection: &str, id: &str, patch: Fields) -> Result<(), StoreError> {
        self.mutate(|data| {
            let doc = data
                .collections
                .get_mut(collection)
                .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
                .ok_or_else(|| StoreError::NotFound { collection: collection.into(), id: id.into() })?;
            doc.fields.extend(patch);
            Ok(())
        })
        .await?;
        tracing::info!(collection, id, "document updated");
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.mutate(|data| {
            if let Some(docs) = data.collections.get_mut(collection) {
                docs.retain(|d| d.id != id);
            }
            Ok(())
        })
        .await?;
        tracing::info!(collection, id, "document deleted");
        Ok(())
    }

    fn watch(&self, query: Query) -> SnapshotStream {
        let rx = self.feed.subscribe();
        stream::unfold((rx, query, true), |(mut rx, query, first)| async move {
            if !first && rx.changed().await.is_err() {
                return None;
            }
            let item = rx.borrow_and_update().result(&query);
            Some((item, (rx, query, false)))
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> Fields {
        match value {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn add_update_delete_persist_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        let store = LocalDocumentStore::open(&path).unwrap();

        let id = store.add("tasks", fields(json!({"userId": "u1", "title": "a"}))).await.unwrap();
        store.update("tasks", &id, fields(json!({"title": "b"}))).await.unwrap();

        let reopened = LocalDocumentStore::open(&path).unwrap();
        let doc = reopened.get("tasks", &id).await.unwrap().unwrap();
        assert_eq!(doc.fields["title"], json!("b"));
        assert_eq!(doc.fields["userId"], json!("u1"));

        reopened.delete("tasks", &id).await.unwrap();
        assert!(reopened.get("tasks", &id).await.unwrap().is_none());
        // Deleting twice is fine.
        reopened.delete("tasks", &id).await.unwrap();
    }

    #[tokio::test]
    async fn update_of_missing_document_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDocumentStore::open(&dir.path().join("db.json")).unwrap();
        let err = store.update("tasks", "nope", Fields::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn watch_yields_current_then_changes_for_matching_docs() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDocumentStore::open(&dir.path().join("db.json")).unwrap();
        store.add("tasks", fields(json!({"userId": "u2", "title": "theirs"}))).await.unwrap();

        let mut feed = store.watch(Query::eq("tasks", "userId", "u1"));
        assert!(feed.next().await.unwrap().unwrap().is_empty());

        store.add("tasks", fields(json!({"userId": "u1", "title": "mine"}))).await.unwrap();
        let snapshot = feed.next().await.unwrap().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].fields["title"], json!("mine"));
    }

    #[tokio::test]
    async fn reload_picks_up_writes_from_another_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        let reader = LocalDocumentStore::open(&path).unwrap();
        let writer = LocalDocumentStore::open(&path).unwrap();

        let mut feed = reader.watch(Query::eq("tasks", "userId", "u1"));
        assert!(feed.next().await.unwrap().unwrap().is_empty());

        writer.add("tasks", fields(json!({"userId": "u1", "title": "elsewhere"}))).await.unwrap();
        reader.reload().await;
        assert_eq!(feed.next().await.unwrap().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn corrupt_file_surfaces_on_the_feed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        let store = LocalDocumentStore::open(&path).unwrap();
        store.add("tasks", fields(json!({"userId": "u1"}))).await.unwrap();

        let mut feed = store.watch(Query::eq("tasks", "userId", "u1"));
        feed.next().await.unwrap().unwrap();

        // Make sure the mtime moves even on coarse filesystems.
        tokio::time::sleep(Duration::from_millis(20)).await;
        std::fs::write(&path, "{ not json").unwrap();
        store.reload().await;
        assert!(matches!(feed.next().await.unwrap(), Err(StoreError::Feed(_))));
    }

    #[test]
    fn open_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        std::fs::write(&path, "[1, 2").unwrap();
        assert!(matches!(LocalDocumentStore::open(&path), Err(StoreError::Corrupt(_))));
    }
}
