use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::gateway::models::{Tag, TagFields};
use crate::web::models::AuthenticatedUser;
use crate::web::{AppError, AppState};

#[derive(Deserialize)]
pub struct SaveTagRequest {
    name: String,
    color: String,
}

impl SaveTagRequest {
    fn into_fields(self) -> Result<TagFields, AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "required field `name` must not be empty".to_string(),
            ));
        }
        if self.color.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "required field `color` must not be empty".to_string(),
            ));
        }
        Ok(TagFields {
            name: self.name,
            color: self.color,
        })
    }
}

/// Admin tag listing with how many entries carry each tag.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TagWithEntryCount {
    #[serde(flatten)]
    pub tag: Tag,
    pub entry_count: usize,
}

async fn list_tags_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<TagWithEntryCount>>, AppError> {
    let tags = app_state.gateway.list_tags().await?;
    let associations = app_state.gateway.list_associations(None).await?;
    let with_counts = tags
        .into_iter()
        .map(|tag| {
            let entry_count = associations.iter().filter(|a| a.tag_id == tag.id).count();
            TagWithEntryCount { tag, entry_count }
        })
        .collect();
    Ok(Json(with_counts))
}

async fn create_tag_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<SaveTagRequest>,
) -> Result<(StatusCode, Json<Tag>), AppError> {
    let fields = payload.into_fields()?;
    let tag = app_state.gateway.create_tag(&fields).await?;
    info!(admin = %authenticated_user.subject, tag_id = %tag.id, "Admin created tag.");
    Ok((StatusCode::CREATED, Json(tag)))
}

async fn update_tag_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(tag_id): Path<String>,
    Json(payload): Json<SaveTagRequest>,
) -> Result<Json<Tag>, AppError> {
    let fields = payload.into_fields()?;
    let tag = app_state.gateway.update_tag(&tag_id, &fields).await?;
    info!(admin = %authenticated_user.subject, tag_id = %tag_id, "Admin updated tag.");
    Ok(Json(tag))
}

async fn delete_tag_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(tag_id): Path<String>,
) -> Result<StatusCode, AppError> {
    app_state.gateway.delete_tag(&tag_id).await?;
    info!(admin = %authenticated_user.subject, tag_id = %tag_id, "Admin deleted tag.");
    Ok(StatusCode::NO_CONTENT)
}

pub fn create_tags_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_tags_handler).post(create_tag_handler))
        .route(
            "/{tag_id}",
            put(update_tag_handler).delete(delete_tag_handler),
        )
}
