use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::gateway::models::{Association, Tag};

/// An association with its tag reference resolved against the cached index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedAssociation {
    pub id: String,
    pub entry_id: String,
    pub tag_id: String,
    pub tag_name: String,
    pub tag_color: String,
}

/// Cached `tag id -> tag` mapping. Rebuilt only when the tag collection
/// snapshot changes, so resolving a push of associations never issues a
/// per-item lookup against the gateway.
#[derive(Default)]
pub struct TagIndex {
    by_id: HashMap<String, Tag>,
}

impl TagIndex {
    pub fn rebuild(&mut self, tags: &[Tag]) {
        self.by_id = tags.iter().map(|t| (t.id.clone(), t.clone())).collect();
    }

    pub fn get(&self, tag_id: &str) -> Option<&Tag> {
        self.by_id.get(tag_id)
    }

    /// Resolves a snapshot of raw associations. Items referencing a tag the
    /// index does not know are dropped and logged, never surfaced.
    pub fn resolve(&self, associations: &[Association]) -> Vec<ResolvedAssociation> {
        associations
            .iter()
            .filter_map(|assoc| match self.by_id.get(&assoc.tag_id) {
                Some(tag) => Some(ResolvedAssociation {
                    id: assoc.id.clone(),
                    entry_id: assoc.entry_id.clone(),
                    tag_id: assoc.tag_id.clone(),
                    tag_name: tag.name.clone(),
                    tag_color: tag.color.clone(),
                }),
                None => {
                    warn!(
                        association_id = %assoc.id,
                        tag_id = %assoc.tag_id,
                        "Dropping association with unknown tag."
                    );
                    None
                }
            })
            .collect()
    }
}
