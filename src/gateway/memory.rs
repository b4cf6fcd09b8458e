use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::models::{Association, Entry, EntryFields, Tag, TagFields};
use super::{Gateway, GatewayError, SnapshotEvent};

const FEED_CHANNEL_CAPACITY: usize = 64;

#[derive(Default)]
struct Store {
    entries: Vec<Entry>,
    tags: Vec<Tag>,
    associations: Vec<Association>,
}

/// In-process gateway used when no hosted gateway is configured (development
/// mode) and by the test suite. Every mutation publishes a full snapshot of
/// the affected collection, mimicking the hosted live-query behaviour.
pub struct MemoryGateway {
    store: Mutex<Store>,
    feed_tx: broadcast::Sender<SnapshotEvent>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        let (feed_tx, _) = broadcast::channel(FEED_CHANNEL_CAPACITY);
        MemoryGateway {
            store: Mutex::new(Store::default()),
            feed_tx,
        }
    }

    /// Locks the store, recovering the guard if a previous holder panicked.
    /// The store is only ever mutated through whole-value replacements and
    /// pushes, so a poisoned lock still holds a coherent snapshot.
    fn lock_store(&self) -> std::sync::MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, event: SnapshotEvent) {
        // No subscribers is fine; the snapshot is simply not observed.
        let _ = self.feed_tx.send(event);
    }

    fn not_found(kind: &str, id: &str) -> GatewayError {
        GatewayError::Rejected {
            status: 404,
            message: format!("{kind} {id} not found"),
        }
    }

    fn mint_id() -> String {
        Uuid::new_v4().to_string()
    }
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn list_entries(&self) -> Result<Vec<Entry>, GatewayError> {
        let store = self.lock_store();
        Ok(store.entries.clone())
    }

    async fn get_entry(&self, id: &str) -> Result<Option<Entry>, GatewayError> {
        let store = self.lock_store();
        Ok(store.entries.iter().find(|e| e.id == id).cloned())
    }

    async fn create_entry(&self, fields: &EntryFields) -> Result<Entry, GatewayError> {
        let now = Utc::now();
        let entry = Entry {
            id: Self::mint_id(),
            name: fields.name.clone(),
            source_url: fields.source_url.clone(),
            demo_url: fields.demo_url.clone(),
            image_url: fields.image_url.clone(),
            created_at: now,
            updated_at: now,
        };
        let snapshot = {
            let mut store = self.lock_store();
            store.entries.push(entry.clone());
            store.entries.clone()
        };
        self.publish(SnapshotEvent::Entries(snapshot));
        Ok(entry)
    }

    async fn update_entry(&self, id: &str, fields: &EntryFields) -> Result<Entry, GatewayError> {
        let (entry, snapshot) = {
            let mut store = self.lock_store();
            let entry = store
                .entries
                .iter_mut()
                .find(|e| e.id == id)
                .ok_or_else(|| Self::not_found("entry", id))?;
            entry.name = fields.name.clone();
            entry.source_url = fields.source_url.clone();
            entry.demo_url = fields.demo_url.clone();
            entry.image_url = fields.image_url.clone();
            entry.updated_at = Utc::now();
            (entry.clone(), store.entries.clone())
        };
        self.publish(SnapshotEvent::Entries(snapshot));
        Ok(entry)
    }

    async fn delete_entry(&self, id: &str) -> Result<(), GatewayError> {
        let snapshot = {
            let mut store = self.lock_store();
            let before = store.entries.len();
            store.entries.retain(|e| e.id != id);
            if store.entries.len() == before {
                return Err(Self::not_found("entry", id));
            }
            store.entries.clone()
        };
        self.publish(SnapshotEvent::Entries(snapshot));
        Ok(())
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, GatewayError> {
        let store = self.lock_store();
        Ok(store.tags.clone())
    }

    async fn create_tag(&self, fields: &TagFields) -> Result<Tag, GatewayError> {
        let tag = Tag {
            id: Self::mint_id(),
            name: fields.name.clone(),
            color: fields.color.clone(),
        };
        let snapshot = {
            let mut store = self.lock_store();
            store.tags.push(tag.clone());
            store.tags.clone()
        };
        self.publish(SnapshotEvent::Tags(snapshot));
        Ok(tag)
    }

    async fn update_tag(&self, id: &str, fields: &TagFields) -> Result<Tag, GatewayError> {
        let (tag, snapshot) = {
            let mut store = self.lock_store();
            let tag = store
                .tags
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or_else(|| Self::not_found("tag", id))?;
            tag.name = fields.name.clone();
            tag.color = fields.color.clone();
            (tag.clone(), store.tags.clone())
        };
        self.publish(SnapshotEvent::Tags(snapshot));
        Ok(tag)
    }

    async fn delete_tag(&self, id: &str) -> Result<(), GatewayError> {
        let snapshot = {
            let mut store = self.lock_store();
            let before = store.tags.len();
            store.tags.retain(|t| t.id != id);
            if store.tags.len() == before {
                return Err(Self::not_found("tag", id));
            }
            store.tags.clone()
        };
        self.publish(SnapshotEvent::Tags(snapshot));
        Ok(())
    }

    async fn list_associations(
        &self,
        entry_id: Option<&str>,
    ) -> Result<Vec<Association>, GatewayError> {
        let store = self.lock_store();
        Ok(store
            .associations
            .iter()
            .filter(|a| entry_id.is_none_or(|id| a.entry_id == id))
            .cloned()
            .collect())
    }

    async fn create_association(
        &self,
        entry_id: &str,
        tag_id: &str,
    ) -> Result<Association, GatewayError> {
        let association = Association {
            id: Self::mint_id(),
            entry_id: entry_id.to_string(),
            tag_id: tag_id.to_string(),
        };
        let snapshot = {
            let mut store = self.lock_store();
            store.associations.push(association.clone());
            store.associations.clone()
        };
        self.publish(SnapshotEvent::Associations(snapshot));
        Ok(association)
    }

    async fn delete_association(&self, id: &str) -> Result<(), GatewayError> {
        let snapshot = {
            let mut store = self.lock_store();
            let before = store.associations.len();
            store.associations.retain(|a| a.id != id);
            if store.associations.len() == before {
                return Err(Self::not_found("association", id));
            }
            store.associations.clone()
        };
        self.publish(SnapshotEvent::Associations(snapshot));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SnapshotEvent> {
        self.feed_tx.subscribe()
    }
}
