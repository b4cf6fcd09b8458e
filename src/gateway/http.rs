use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tracing::{debug, info, warn};

use super::models::{Association, Entry, EntryFields, Tag, TagFields};
use super::{Gateway, GatewayError, SnapshotEvent};

const FEED_CHANNEL_CAPACITY: usize = 64;
const RECONNECT_INITIAL_DELAY: Duration = Duration::from_secs(1);
const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(30);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewAssociation<'a> {
    entry_id: &'a str,
    tag_id: &'a str,
}

/// Client for the hosted data gateway: JSON CRUD over HTTP, live queries over
/// a websocket feed that delivers full collection snapshots.
pub struct HttpGateway {
    base_url: String,
    client: reqwest::Client,
    feed_tx: broadcast::Sender<SnapshotEvent>,
}

impl HttpGateway {
    /// Builds the client and starts the background feed task. The task owns
    /// reconnection: a dropped or failed websocket is retried with capped
    /// exponential backoff and never surfaces to subscribers as a terminal
    /// error.
    pub fn connect(base_url: &str, ws_url: &str) -> Self {
        let (feed_tx, _) = broadcast::channel(FEED_CHANNEL_CAPACITY);
        let gateway = HttpGateway {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            feed_tx: feed_tx.clone(),
        };
        tokio::spawn(run_feed(ws_url.to_string(), feed_tx));
        gateway
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn rejection(response: reqwest::Response) -> GatewayError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        GatewayError::Rejected { status, message }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let response = self.client.get(self.url(path)).send().await?;
        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }
        Ok(response.json::<T>().await?)
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }
        Ok(response.json::<T>().await?)
    }

    async fn put_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        let response = self.client.put(self.url(path)).json(body).send().await?;
        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }
        Ok(response.json::<T>().await?)
    }

    async fn delete_path(&self, path: &str) -> Result<(), GatewayError> {
        let response = self.client.delete(self.url(path)).send().await?;
        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }
        Ok(())
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn list_entries(&self) -> Result<Vec<Entry>, GatewayError> {
        self.get_json("/entries").await
    }

    async fn get_entry(&self, id: &str) -> Result<Option<Entry>, GatewayError> {
        let response = self
            .client
            .get(self.url(&format!("/entries/{id}")))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }
        Ok(Some(response.json::<Entry>().await?))
    }

    async fn create_entry(&self, fields: &EntryFields) -> Result<Entry, GatewayError> {
        self.post_json("/entries", fields).await
    }

    async fn update_entry(&self, id: &str, fields: &EntryFields) -> Result<Entry, GatewayError> {
        self.put_json(&format!("/entries/{id}"), fields).await
    }

    async fn delete_entry(&self, id: &str) -> Result<(), GatewayError> {
        self.delete_path(&format!("/entries/{id}")).await
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, GatewayError> {
        self.get_json("/tags").await
    }

    async fn create_tag(&self, fields: &TagFields) -> Result<Tag, GatewayError> {
        self.post_json("/tags", fields).await
    }

    async fn update_tag(&self, id: &str, fields: &TagFields) -> Result<Tag, GatewayError> {
        self.put_json(&format!("/tags/{id}"), fields).await
    }

    async fn delete_tag(&self, id: &str) -> Result<(), GatewayError> {
        self.delete_path(&format!("/tags/{id}")).await
    }

    async fn list_associations(
        &self,
        entry_id: Option<&str>,
    ) -> Result<Vec<Association>, GatewayError> {
        let mut request = self.client.get(self.url("/associations"));
        if let Some(entry_id) = entry_id {
            request = request.query(&[("entryId", entry_id)]);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }
        Ok(response.json::<Vec<Association>>().await?)
    }

    async fn create_association(
        &self,
        entry_id: &str,
        tag_id: &str,
    ) -> Result<Association, GatewayError> {
        self.post_json("/associations", &NewAssociation { entry_id, tag_id })
            .await
    }

    async fn delete_association(&self, id: &str) -> Result<(), GatewayError> {
        self.delete_path(&format!("/associations/{id}")).await
    }

    fn subscribe(&self) -> broadcast::Receiver<SnapshotEvent> {
        self.feed_tx.subscribe()
    }
}

/// Long-lived websocket consumer for the gateway's live-query feed.
async fn run_feed(ws_url: String, feed_tx: broadcast::Sender<SnapshotEvent>) {
    let mut delay = RECONNECT_INITIAL_DELAY;
    loop {
        match connect_async(ws_url.as_str()).await {
            Ok((ws_stream, _)) => {
                info!(url = %ws_url, "Connected to gateway live-query feed.");
                delay = RECONNECT_INITIAL_DELAY;
                let (_, mut read) = ws_stream.split();
                while let Some(message) = read.next().await {
                    match message {
                        Ok(WsMessage::Text(text)) => {
                            match serde_json::from_str::<SnapshotEvent>(text.as_str()) {
                                Ok(event) => {
                                    if feed_tx.send(event).is_err() {
                                        debug!("No feed subscribers, snapshot dropped.");
                                    }
                                }
                                Err(e) => {
                                    warn!(error = %e, "Discarding malformed feed message.");
                                }
                            }
                        }
                        Ok(WsMessage::Close(_)) => {
                            info!("Gateway closed the live-query feed.");
                            break;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(error = %e, "Live-query feed receive error.");
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, url = %ws_url, "Failed to connect to gateway feed.");
            }
        }
        warn!(delay_secs = delay.as_secs(), "Reconnecting to gateway feed.");
        tokio::time::sleep(delay).await;
        delay = (delay * 2).min(RECONNECT_MAX_DELAY);
    }
}
