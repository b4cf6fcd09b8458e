use serde::{Deserialize, Serialize};

use crate::gateway::models::{Entry, Tag};

/// An entry as it is sent to the frontend, with its tag set denormalized.
/// Shared by the REST list/detail responses and the websocket push so both
/// surfaces stay consistent.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct EntryWithTags {
    #[serde(flatten)]
    pub entry: Entry,
    pub tags: Vec<Tag>,
}

/// Full-state catalog push: every visible entry plus the tag palette the
/// filter bar needs.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CatalogPush {
    pub entries: Vec<EntryWithTags>,
    pub tags: Vec<Tag>,
}

#[derive(Serialize, Clone, Debug)]
#[serde(tag = "type", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum WsMessage {
    FullCatalog(CatalogPush),
}
