use thiserror::Error;
use tracing::{info, warn};

use crate::gateway::models::{Association, Entry, EntryFields};
use crate::gateway::{Gateway, GatewayError};

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("required field `{0}` must not be empty")]
    MissingField(&'static str),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Everything the administrator form submits for a create or edit.
#[derive(Clone, Debug)]
pub struct EntryDraft {
    pub name: String,
    pub source_url: String,
    pub demo_url: String,
    pub image_url: String,
    pub tag_ids: Vec<String>,
}

impl EntryDraft {
    fn validate(&self) -> Result<(), WorkflowError> {
        let required: [(&'static str, &str); 4] = [
            ("name", &self.name),
            ("sourceUrl", &self.source_url),
            ("demoUrl", &self.demo_url),
            ("imageUrl", &self.image_url),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(WorkflowError::MissingField(field));
            }
        }
        Ok(())
    }

    fn fields(&self) -> EntryFields {
        EntryFields {
            name: self.name.clone(),
            source_url: self.source_url.clone(),
            demo_url: self.demo_url.clone(),
            image_url: self.image_url.clone(),
        }
    }
}

/// Creates the entry, then one association per selected tag, sequentially
/// awaited. A failed association create is returned as-is; the entry stays
/// and the mirror converges on whatever the gateway holds via the next push.
pub async fn create_entry(
    gateway: &dyn Gateway,
    draft: &EntryDraft,
) -> Result<Entry, WorkflowError> {
    draft.validate()?;
    let entry = gateway.create_entry(&draft.fields()).await?;
    for tag_id in &draft.tag_ids {
        gateway.create_association(&entry.id, tag_id).await?;
    }
    info!(entry_id = %entry.id, tags = draft.tag_ids.len(), "Created catalog entry.");
    Ok(entry)
}

/// Updates the entry fields, then replaces its tag set with a
/// delete-then-recreate pass. If the replacement fails part-way, the
/// compensation pass removes the associations created so far and restores
/// the deleted ones, so the tag set lands back where it started instead of
/// in a mixed state. The original error is returned; there is no automatic
/// retry.
pub async fn update_entry(
    gateway: &dyn Gateway,
    id: &str,
    draft: &EntryDraft,
) -> Result<Entry, WorkflowError> {
    draft.validate()?;
    let entry = gateway.update_entry(id, &draft.fields()).await?;

    let existing = gateway.list_associations(Some(id)).await?;
    let mut deleted: Vec<Association> = Vec::new();
    let mut created: Vec<Association> = Vec::new();
    if let Err(err) =
        replace_associations(gateway, id, &existing, &draft.tag_ids, &mut deleted, &mut created)
            .await
    {
        warn!(entry_id = %id, error = %err, "Tag replacement failed, compensating.");
        undo_partial_replacement(gateway, &deleted, &created).await;
        return Err(err.into());
    }

    info!(entry_id = %id, tags = draft.tag_ids.len(), "Updated catalog entry.");
    Ok(entry)
}

/// Deletes all associations for the entry, sequentially, then the entry
/// itself, so no association is ever left pointing at a missing entry.
pub async fn delete_entry(gateway: &dyn Gateway, id: &str) -> Result<(), WorkflowError> {
    let associations = gateway.list_associations(Some(id)).await?;
    for association in &associations {
        gateway.delete_association(&association.id).await?;
    }
    gateway.delete_entry(id).await?;
    info!(entry_id = %id, removed_associations = associations.len(), "Deleted catalog entry.");
    Ok(())
}

async fn replace_associations(
    gateway: &dyn Gateway,
    entry_id: &str,
    existing: &[Association],
    tag_ids: &[String],
    deleted: &mut Vec<Association>,
    created: &mut Vec<Association>,
) -> Result<(), GatewayError> {
    for association in existing {
        gateway.delete_association(&association.id).await?;
        deleted.push(association.clone());
    }
    for tag_id in tag_ids {
        let association = gateway.create_association(entry_id, tag_id).await?;
        created.push(association);
    }
    Ok(())
}

/// Best-effort rollback after a failed replacement: associations created so
/// far are removed, then the deleted ones are restored, leaving the original
/// tag set rather than a mix of old and new. Rollback failures are logged
/// and never mask the original error.
async fn undo_partial_replacement(
    gateway: &dyn Gateway,
    deleted: &[Association],
    created: &[Association],
) {
    for association in created {
        if let Err(e) = gateway.delete_association(&association.id).await {
            warn!(
                entry_id = %association.entry_id,
                tag_id = %association.tag_id,
                error = %e,
                "Compensation failed to remove partially created association."
            );
        }
    }
    for association in deleted {
        if let Err(e) = gateway
            .create_association(&association.entry_id, &association.tag_id)
            .await
        {
            warn!(
                entry_id = %association.entry_id,
                tag_id = %association.tag_id,
                error = %e,
                "Compensation failed to restore association."
            );
        }
    }
}
