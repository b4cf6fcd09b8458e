use tokio::sync::RwLock;
use tracing::debug;

use crate::catalog::enricher::{ResolvedAssociation, TagIndex};
use crate::catalog::filter::{self, CatalogQuery};
use crate::gateway::models::{Association, Entry, Tag};
use crate::gateway::SnapshotEvent;
use crate::web::models::push_models::{CatalogPush, EntryWithTags};

#[derive(Default)]
struct MirrorState {
    entries: Vec<Entry>,
    tags: Vec<Tag>,
    associations: Vec<Association>,
    tag_index: TagIndex,
    resolved: Vec<ResolvedAssociation>,
    entries_primed: bool,
    tags_primed: bool,
    associations_primed: bool,
}

impl MirrorState {
    fn entry_with_tags(&self, entry: &Entry) -> EntryWithTags {
        let tags = self
            .resolved
            .iter()
            .filter(|a| a.entry_id == entry.id)
            .map(|a| Tag {
                id: a.tag_id.clone(),
                name: a.tag_name.clone(),
                color: a.tag_color.clone(),
            })
            .collect();
        EntryWithTags {
            entry: entry.clone(),
            tags,
        }
    }
}

/// The local mirror: the most recent snapshot of each gateway collection,
/// replaced wholesale on every push. Readers see a consistent enriched view;
/// nothing here talks to the gateway.
pub struct CatalogMirror {
    inner: RwLock<MirrorState>,
}

impl CatalogMirror {
    pub fn new() -> Self {
        CatalogMirror {
            inner: RwLock::new(MirrorState::default()),
        }
    }

    /// Replaces one collection with the pushed sequence. The enriched
    /// association view is rebuilt whenever tags or associations change.
    pub async fn apply(&self, event: SnapshotEvent) {
        let mut state = self.inner.write().await;
        match event {
            SnapshotEvent::Entries(entries) => {
                debug!(count = entries.len(), "Mirror: replacing entry snapshot.");
                state.entries = entries;
                state.entries_primed = true;
            }
            SnapshotEvent::Tags(tags) => {
                debug!(count = tags.len(), "Mirror: replacing tag snapshot.");
                state.tag_index.rebuild(&tags);
                state.tags = tags;
                let resolved = state.tag_index.resolve(&state.associations);
                state.resolved = resolved;
                state.tags_primed = true;
            }
            SnapshotEvent::Associations(associations) => {
                debug!(
                    count = associations.len(),
                    "Mirror: replacing association snapshot."
                );
                let resolved = state.tag_index.resolve(&associations);
                state.resolved = resolved;
                state.associations = associations;
                state.associations_primed = true;
            }
        }
    }

    /// True once every collection has received its first snapshot. The
    /// serving layer keeps catalog reads behind this.
    pub async fn is_primed(&self) -> bool {
        let state = self.inner.read().await;
        state.entries_primed && state.tags_primed && state.associations_primed
    }

    /// The full enriched catalog for the websocket push, or `None` while the
    /// mirror is still unprimed.
    pub async fn catalog_push(&self) -> Option<CatalogPush> {
        let state = self.inner.read().await;
        if !(state.entries_primed && state.tags_primed && state.associations_primed) {
            return None;
        }
        Some(CatalogPush {
            entries: state
                .entries
                .iter()
                .map(|e| state.entry_with_tags(e))
                .collect(),
            tags: state.tags.clone(),
        })
    }

    /// Derives the filtered view plus the total entry count, so callers can
    /// tell "no matches" apart from "no entries at all". `None` while
    /// unprimed.
    pub async fn query(&self, query: &CatalogQuery) -> Option<(Vec<EntryWithTags>, usize)> {
        let state = self.inner.read().await;
        if !(state.entries_primed && state.tags_primed && state.associations_primed) {
            return None;
        }
        let visible = filter::visible_entries(&state.entries, &state.resolved, query);
        let items = visible
            .into_iter()
            .map(|e| state.entry_with_tags(e))
            .collect();
        Some((items, state.entries.len()))
    }

    /// Point lookup in the mirrored entry sequence. Outer `None` means the
    /// mirror is unprimed, inner `None` means no such entry.
    pub async fn find_entry(&self, id: &str) -> Option<Option<EntryWithTags>> {
        let state = self.inner.read().await;
        if !(state.entries_primed && state.tags_primed && state.associations_primed) {
            return None;
        }
        Some(
            state
                .entries
                .iter()
                .find(|e| e.id == id)
                .map(|e| state.entry_with_tags(e)),
        )
    }

    pub async fn tags(&self) -> Option<Vec<Tag>> {
        let state = self.inner.read().await;
        if !state.tags_primed {
            return None;
        }
        Some(state.tags.clone())
    }
}

impl Default for CatalogMirror {
    fn default() -> Self {
        Self::new()
    }
}
