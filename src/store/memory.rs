use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::debug;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio::sync::mpsc;

use crate::errors::StoreError;
use crate::store::{Document, Fields, Filter, Snapshot, Store, Subscription};

// Store-assigned ids look like the cloud store's: 20 alphanumeric characters.
const ID_LEN: usize = 20;

enum Scope {
    Query { filters: Vec<Filter> },
    Document { id: String },
}

struct Subscriber {
    collection: String,
    scope: Scope,
    tx: mpsc::UnboundedSender<Result<Snapshot, StoreError>>,
}

#[derive(Default)]
struct Inner {
    collections: HashMap<String, Vec<Document>>,
    subscribers: HashMap<u64, Subscriber>,
    next_subscriber: u64,
}

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// In-memory implementation of the shared store. Every client handed a clone
// of the same MemoryStore sees the same collections and gets snapshot
// notifications for its subscriptions, which is all the demo binary and the
// tests need to play both sides of the protocol.
///////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    fn random_id() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(ID_LEN)
            .map(char::from)
            .collect()
    }

    fn snapshot_for(inner: &Inner, collection: &str, subscriber: &Subscriber) -> Snapshot {
        let documents = inner.collections.get(collection).map(Vec::as_slice).unwrap_or(&[]);
        match &subscriber.scope {
            Scope::Query { filters } => documents
                .iter()
                .filter(|doc| filters.iter().all(|f| f.matches(doc)))
                .cloned()
                .collect(),
            Scope::Document { id } => {
                documents.iter().filter(|doc| &doc.id == id).cloned().collect()
            }
        }
    }

    // Push the current snapshot to every subscriber of the collection.
    // Senders whose receiving end is gone are skipped; the cancel guard on
    // the Subscription removes them for real.
    fn notify(inner: &Inner, collection: &str) {
        for subscriber in inner.subscribers.values() {
            if subscriber.collection == collection {
                let snapshot = MemoryStore::snapshot_for(inner, collection, subscriber);
                let _ = subscriber.tx.send(Ok(snapshot));
            }
        }
    }

    fn attach(&self, collection: &str, scope: Scope) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().map_err(|_| StoreError::Read("store mutex poisoned".to_string()))?;
        let key = inner.next_subscriber;
        inner.next_subscriber += 1;
        let subscriber = Subscriber { collection: collection.to_string(), scope, tx };
        // Deliver the current snapshot on attach, like the cloud listener
        // the protocol was written against.
        let initial = MemoryStore::snapshot_for(&inner, collection, &subscriber);
        let _ = subscriber.tx.send(Ok(initial));
        inner.subscribers.insert(key, subscriber);

        let registry = Arc::clone(&self.inner);
        Ok(Subscription::new(
            rx,
            Box::new(move || {
                if let Ok(mut inner) = registry.lock() {
                    inner.subscribers.remove(&key);
                }
            }),
        ))
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.inner.lock().expect("store mutex poisoned").subscribers.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create(&self, collection: &str, fields: Fields) -> Result<String, StoreError> {
        let mut inner = self.inner.lock().map_err(|_| StoreError::Write("store mutex poisoned".to_string()))?;
        let id = MemoryStore::random_id();
        debug!("create {}/{}", collection, id);
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(Document { id: id.clone(), fields });
        MemoryStore::notify(&inner, collection);
        Ok(id)
    }

    async fn update(&self, collection: &str, id: &str, deltas: Fields) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().map_err(|_| StoreError::Write("store mutex poisoned".to_string()))?;
        let document = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|doc| doc.id == id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        debug!("update {}/{}", collection, id);
        for (field, value) in deltas {
            document.fields.insert(field, value);
        }
        MemoryStore::notify(&inner, collection);
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let inner = self.inner.lock().map_err(|_| StoreError::Read("store mutex poisoned".to_string()))?;
        Ok(inner
            .collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| doc.id == id))
            .cloned())
    }

    async fn query(&self, collection: &str, filters: &[Filter]) -> Result<Snapshot, StoreError> {
        let inner = self.inner.lock().map_err(|_| StoreError::Read("store mutex poisoned".to_string()))?;
        let documents = inner.collections.get(collection).map(Vec::as_slice).unwrap_or(&[]);
        Ok(documents
            .iter()
            .filter(|doc| filters.iter().all(|f| f.matches(doc)))
            .cloned()
            .collect())
    }

    fn subscribe(&self, collection: &str, filters: &[Filter]) -> Result<Subscription, StoreError> {
        self.attach(collection, Scope::Query { filters: filters.to_vec() })
    }

    fn watch(&self, collection: &str, id: &str) -> Result<Subscription, StoreError> {
        self.attach(collection, Scope::Document { id: id.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn fields(pairs: &[(&str, serde_json::Value)]) -> Fields {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[tokio::test]
    async fn create_then_get_and_query() {
        let store = MemoryStore::new();
        let id = store
            .create("players", fields(&[("name", json!("alice")), ("status", json!("online"))]))
            .await
            .unwrap();
        assert_eq!(id.len(), 20);

        let doc = store.get("players", &id).await.unwrap().unwrap();
        assert_eq!(doc.str_field("name"), Some("alice"));

        let hits = store
            .query("players", &[Filter::eq("status", "online")])
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        let misses = store
            .query("players", &[Filter::eq("status", "offline")])
            .await
            .unwrap();
        assert!(misses.is_empty());
    }

    #[tokio::test]
    async fn update_merges_fields_last_write_wins() {
        let store = MemoryStore::new();
        let id = store
            .create("players", fields(&[("name", json!("bob")), ("status", json!("online"))]))
            .await
            .unwrap();
        store
            .update("players", &id, fields(&[("status", json!("offline"))]))
            .await
            .unwrap();
        let doc = store.get("players", &id).await.unwrap().unwrap();
        assert_eq!(doc.str_field("name"), Some("bob"));
        assert_eq!(doc.str_field("status"), Some("offline"));
    }

    #[tokio::test]
    async fn update_missing_document_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update("players", "nope", fields(&[("status", json!("offline"))]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn subscribe_delivers_initial_and_changed_snapshots() {
        let store = MemoryStore::new();
        let mut sub = store
            .subscribe("challenges", &[Filter::eq("status", "pending")])
            .unwrap();
        assert!(sub.next().await.unwrap().unwrap().is_empty());

        let id = store
            .create("challenges", fields(&[("status", json!("pending"))]))
            .await
            .unwrap();
        let snapshot = sub.next().await.unwrap().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, id);

        // Leaving the filtered set shows up as an empty snapshot.
        store
            .update("challenges", &id, fields(&[("status", json!("accepted"))]))
            .await
            .unwrap();
        assert!(sub.next().await.unwrap().unwrap().is_empty());
    }

    #[tokio::test]
    async fn watch_follows_a_single_document() {
        let store = MemoryStore::new();
        let id = store
            .create("challenges", fields(&[("status", json!("pending"))]))
            .await
            .unwrap();
        store
            .create("challenges", fields(&[("status", json!("pending"))]))
            .await
            .unwrap();

        let mut sub = store.watch("challenges", &id).unwrap();
        let initial = sub.next().await.unwrap().unwrap();
        assert_eq!(initial.len(), 1);

        store
            .update("challenges", &id, fields(&[("status", json!("declined"))]))
            .await
            .unwrap();
        let snapshot = sub.next().await.unwrap().unwrap();
        assert_eq!(snapshot[0].str_field("status"), Some("declined"));
    }

    #[tokio::test]
    async fn dropping_a_subscription_releases_the_listener() {
        let store = MemoryStore::new();
        let sub = store.subscribe("players", &[]).unwrap();
        assert_eq!(store.subscriber_count(), 1);
        drop(sub);
        assert_eq!(store.subscriber_count(), 0);
    }
}
