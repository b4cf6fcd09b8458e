use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::{post, put},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::catalog::workflow::{self, EntryDraft};
use crate::gateway::models::Entry;
use crate::web::models::AuthenticatedUser;
use crate::web::{AppError, AppState};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveEntryRequest {
    name: String,
    source_url: String,
    demo_url: String,
    image_url: String,
    #[serde(default)]
    tag_ids: Vec<String>,
}

impl From<SaveEntryRequest> for EntryDraft {
    fn from(req: SaveEntryRequest) -> Self {
        EntryDraft {
            name: req.name,
            source_url: req.source_url,
            demo_url: req.demo_url,
            image_url: req.image_url,
            tag_ids: req.tag_ids,
        }
    }
}

async fn create_entry_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<SaveEntryRequest>,
) -> Result<(StatusCode, Json<Entry>), AppError> {
    let draft: EntryDraft = payload.into();
    let entry = workflow::create_entry(app_state.gateway.as_ref(), &draft).await?;
    info!(admin = %authenticated_user.subject, entry_id = %entry.id, "Admin created entry.");
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn update_entry_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(entry_id): Path<String>,
    Json(payload): Json<SaveEntryRequest>,
) -> Result<Json<Entry>, AppError> {
    let draft: EntryDraft = payload.into();
    let entry = workflow::update_entry(app_state.gateway.as_ref(), &entry_id, &draft).await?;
    info!(admin = %authenticated_user.subject, entry_id = %entry_id, "Admin updated entry.");
    Ok(Json(entry))
}

async fn delete_entry_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(entry_id): Path<String>,
) -> Result<StatusCode, AppError> {
    workflow::delete_entry(app_state.gateway.as_ref(), &entry_id).await?;
    info!(admin = %authenticated_user.subject, entry_id = %entry_id, "Admin deleted entry.");
    Ok(StatusCode::NO_CONTENT)
}

pub fn create_entries_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_entry_handler))
        .route(
            "/{entry_id}",
            put(update_entry_handler).delete(delete_entry_handler),
        )
}
