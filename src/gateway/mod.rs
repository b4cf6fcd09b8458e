use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

pub mod http;
pub mod memory;
pub mod models;

pub use http::HttpGateway;
pub use memory::MemoryGateway;
pub use models::{Association, Entry, EntryFields, Tag, TagFields};

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Request(String),
    #[error("gateway rejected the call ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("gateway response could not be decoded: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            GatewayError::Request(err.to_string())
        }
    }
}

/// One push from a live query: the full current item sequence for a collection.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "collection", content = "items", rename_all = "camelCase")]
pub enum SnapshotEvent {
    Entries(Vec<Entry>),
    Tags(Vec<Tag>),
    Associations(Vec<Association>),
}

/// The remote data gateway contract: per-collection CRUD plus a live-query
/// feed that delivers full collection snapshots whenever the data changes.
///
/// `HttpGateway` talks to the hosted service; `MemoryGateway` backs
/// development mode and the test suite.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn list_entries(&self) -> Result<Vec<Entry>, GatewayError>;
    async fn get_entry(&self, id: &str) -> Result<Option<Entry>, GatewayError>;
    async fn create_entry(&self, fields: &EntryFields) -> Result<Entry, GatewayError>;
    async fn update_entry(&self, id: &str, fields: &EntryFields) -> Result<Entry, GatewayError>;
    async fn delete_entry(&self, id: &str) -> Result<(), GatewayError>;

    async fn list_tags(&self) -> Result<Vec<Tag>, GatewayError>;
    async fn create_tag(&self, fields: &TagFields) -> Result<Tag, GatewayError>;
    async fn update_tag(&self, id: &str, fields: &TagFields) -> Result<Tag, GatewayError>;
    async fn delete_tag(&self, id: &str) -> Result<(), GatewayError>;

    /// `entry_id` is the one filter predicate the contract guarantees:
    /// equality on the entry reference.
    async fn list_associations(
        &self,
        entry_id: Option<&str>,
    ) -> Result<Vec<Association>, GatewayError>;
    async fn create_association(
        &self,
        entry_id: &str,
        tag_id: &str,
    ) -> Result<Association, GatewayError>;
    async fn delete_association(&self, id: &str) -> Result<(), GatewayError>;

    /// Subscribe to the live-query feed. The feed is long-lived; transport
    /// errors are handled inside the gateway (logged, reconnected) and never
    /// terminate the returned channel.
    fn subscribe(&self) -> broadcast::Receiver<SnapshotEvent>;
}
