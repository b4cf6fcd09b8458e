use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::catalog::mirror::CatalogMirror;
use crate::gateway::{Gateway, GatewayError, SnapshotEvent};
use crate::web::models::push_models::WsMessage;

const PRIME_INITIAL_DELAY: Duration = Duration::from_secs(1);
const PRIME_MAX_DELAY: Duration = Duration::from_secs(30);

/// Drives the local mirror: one initial full fetch per collection, then the
/// gateway's live-query feed. Every mirror refresh is followed by a
/// full-state broadcast to the catalog websocket clients.
///
/// Runs for the lifetime of the process. Feed transport errors are handled
/// inside the gateway client; this task only sees whole snapshots.
pub async fn run(
    gateway: Arc<dyn Gateway>,
    mirror: Arc<CatalogMirror>,
    broadcaster: broadcast::Sender<WsMessage>,
) {
    // Subscribe before the initial fetch so a push landing in between is not
    // lost; snapshots are idempotent to replay.
    let mut feed = gateway.subscribe();

    prime(gateway.as_ref(), mirror.as_ref()).await;
    info!("Catalog mirror primed.");
    broadcast_snapshot(&mirror, &broadcaster).await;

    loop {
        match feed.recv().await {
            Ok(event) => {
                mirror.apply(event).await;
                broadcast_snapshot(&mirror, &broadcaster).await;
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                // Each snapshot supersedes the previous one, so dropped
                // intermediates only cost freshness, not correctness.
                warn!(skipped, "Sync task lagged behind the gateway feed.");
            }
            Err(broadcast::error::RecvError::Closed) => {
                error!("Gateway feed channel closed; mirror will go stale.");
                break;
            }
        }
    }
}

/// Initial full fetch of all three collections, retried with capped
/// exponential backoff until the first success. Tags land first so the
/// association snapshot resolves against a populated index.
async fn prime(gateway: &dyn Gateway, mirror: &CatalogMirror) {
    let mut delay = PRIME_INITIAL_DELAY;
    loop {
        match fetch_all(gateway).await {
            Ok((tags, associations, entries)) => {
                mirror.apply(SnapshotEvent::Tags(tags)).await;
                mirror.apply(SnapshotEvent::Associations(associations)).await;
                mirror.apply(SnapshotEvent::Entries(entries)).await;
                return;
            }
            Err(e) => {
                warn!(error = %e, delay_secs = delay.as_secs(), "Initial catalog fetch failed, retrying.");
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(PRIME_MAX_DELAY);
            }
        }
    }
}

async fn fetch_all(
    gateway: &dyn Gateway,
) -> Result<
    (
        Vec<crate::gateway::Tag>,
        Vec<crate::gateway::Association>,
        Vec<crate::gateway::Entry>,
    ),
    GatewayError,
> {
    let tags = gateway.list_tags().await?;
    let associations = gateway.list_associations(None).await?;
    let entries = gateway.list_entries().await?;
    Ok((tags, associations, entries))
}

async fn broadcast_snapshot(mirror: &CatalogMirror, broadcaster: &broadcast::Sender<WsMessage>) {
    if broadcaster.receiver_count() == 0 {
        debug!("No catalog websocket clients, skipping broadcast.");
        return;
    }
    if let Some(push) = mirror.catalog_push().await {
        if broadcaster.send(WsMessage::FullCatalog(push)).is_err() {
            debug!("Catalog broadcast failed: no clients were listening.");
        } else {
            debug!(
                clients = broadcaster.receiver_count(),
                "Broadcasted full catalog state."
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::filter::CatalogQuery;
    use crate::gateway::models::{EntryFields, TagFields};
    use crate::gateway::MemoryGateway;

    #[tokio::test]
    async fn prime_loads_all_collections_into_the_mirror() {
        let gateway = MemoryGateway::new();
        let tag = gateway
            .create_tag(&TagFields {
                name: "web".to_string(),
                color: "#fff".to_string(),
            })
            .await
            .unwrap();
        let entry = gateway
            .create_entry(&EntryFields {
                name: "Demo".to_string(),
                source_url: "s".to_string(),
                demo_url: "d".to_string(),
                image_url: "i".to_string(),
            })
            .await
            .unwrap();
        gateway.create_association(&entry.id, &tag.id).await.unwrap();

        let mirror = CatalogMirror::new();
        prime(&gateway, &mirror).await;

        assert!(mirror.is_primed().await);
        let (items, total) = mirror.query(&CatalogQuery::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].tags.len(), 1);
        assert_eq!(items[0].tags[0].name, "web");
    }
}
