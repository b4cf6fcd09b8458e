use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::catalog::filter::CatalogQuery;
use crate::gateway::models::Tag;
use crate::web::models::push_models::EntryWithTags;
use crate::web::{AppError, AppState};

const NOT_LOADED: &str = "Catalog not loaded yet, try again shortly";

#[derive(Deserialize)]
pub struct CatalogQueryParams {
    /// Case-insensitive substring match against entry names.
    search: Option<String>,
    /// Comma-separated tag ids; an entry must carry all of them.
    tags: Option<String>,
}

impl From<CatalogQueryParams> for CatalogQuery {
    fn from(params: CatalogQueryParams) -> Self {
        CatalogQuery {
            search: params.search.unwrap_or_default(),
            tag_ids: params
                .tags
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

/// `totalEntries` counts the whole catalog, not the filtered view, so the
/// client can tell "nothing matched" apart from "nothing published yet".
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CatalogResponse {
    pub entries: Vec<EntryWithTags>,
    pub total_entries: usize,
}

async fn list_catalog_handler(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<CatalogQueryParams>,
) -> Result<Json<CatalogResponse>, AppError> {
    let query: CatalogQuery = params.into();
    let (entries, total_entries) = app_state
        .mirror
        .query(&query)
        .await
        .ok_or_else(|| AppError::Unavailable(NOT_LOADED.to_string()))?;
    Ok(Json(CatalogResponse {
        entries,
        total_entries,
    }))
}

async fn get_catalog_entry_handler(
    State(app_state): State<Arc<AppState>>,
    Path(entry_id): Path<String>,
) -> Result<Json<EntryWithTags>, AppError> {
    let found = app_state
        .mirror
        .find_entry(&entry_id)
        .await
        .ok_or_else(|| AppError::Unavailable(NOT_LOADED.to_string()))?;
    found
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Entry {entry_id} not found")))
}

pub async fn list_tags_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<Tag>>, AppError> {
    let tags = app_state
        .mirror
        .tags()
        .await
        .ok_or_else(|| AppError::Unavailable(NOT_LOADED.to_string()))?;
    Ok(Json(tags))
}

pub fn create_catalog_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_catalog_handler))
        .route("/{entry_id}", get(get_catalog_entry_handler))
}
