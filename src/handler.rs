use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        Path, Query, State,
        rejection::{BytesRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::api::{APIResponse, ListParams};
use crate::config::ListConfig;
use crate::error::HandlerError;
use crate::model::{Bookmark, JsonObject};
use crate::repository::{BookmarkStore, Session, finish};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BookmarkStore>,
    pub list: ListConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn BookmarkStore>, list: ListConfig) -> Self {
        AppState { store, list }
    }
}

/// A validated cursor page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub after_id: i64,
    pub limit: u32,
}

// Empty values count as absent, like `?limit=`.
fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl ListParams {
    pub fn into_page(self, cfg: &ListConfig) -> Result<Page, HandlerError> {
        let after_id = match non_empty(self.after_id) {
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| HandlerError::bad_request("Invalid after_id (should be integer)"))?,
            None => 0,
        };

        let limit = match non_empty(self.limit) {
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| HandlerError::bad_request("Invalid limit (should be integer)"))?,
            None => cfg.default_limit as i64,
        };

        if limit <= 0 || limit > cfg.max_limit as i64 {
            return Err(HandlerError::bad_request(format!(
                "Invalid limit, should be positive and less than {}",
                cfg.max_limit as i64 + 1
            )));
        }

        Ok(Page {
            after_id,
            limit: limit as u32,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct BookmarkList {
    pub total_count: u64,
    pub bookmarks: Vec<JsonObject>,
}

fn parse_id(raw: &str) -> Result<i64, HandlerError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| HandlerError::bad_request("Invalid bookmark id (should be integer)"))
}

fn path_id(path: Result<Path<String>, PathRejection>) -> Result<i64, HandlerError> {
    match path {
        Ok(Path(raw)) => parse_id(&raw),
        Err(_) => Err(HandlerError::bad_request("Invalid bookmark id (should be integer)")),
    }
}

fn parse_bookmark(body: &[u8]) -> Result<Bookmark, HandlerError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| HandlerError::bad_request(format!("JSON decoding error: {}", e)))?;

    let Value::Object(data) = value else {
        return Err(HandlerError::bad_request("Invalid bookmark data: expected a JSON object"));
    };

    Ok(Bookmark::deserialize_ignore_id(&data)?)
}

pub async fn healthcheck() -> APIResponse {
    tracing::debug!("got healthcheck request");
    APIResponse::success(serde_json::json!({"status": "ok"})).private()
}

pub async fn not_found() -> APIResponse {
    APIResponse::error_with_status("Not found", StatusCode::NOT_FOUND)
}

pub async fn method_not_allowed() -> APIResponse {
    APIResponse::error_with_status("Method not allowed", StatusCode::METHOD_NOT_ALLOWED)
}

pub async fn get_bookmark(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<APIResponse, HandlerError> {
    let id = path_id(path)?;

    let mut session = state.store.begin().await?;
    let result = session.get_by_id(id).await.map_err(HandlerError::from);
    let found = finish(session, result).await?;

    match found {
        Some(bookmark) => Ok(APIResponse::success(bookmark.serialize())),
        None => Err(HandlerError::NotFound("Bookmark not found".to_string())),
    }
}

async fn list_page(session: &mut dyn Session, page: Page) -> Result<BookmarkList, HandlerError> {
    let total_count = session.count().await?;
    let bookmarks = session
        .list_after(page.after_id, page.limit)
        .await?
        .iter()
        .map(Bookmark::serialize)
        .collect();

    Ok(BookmarkList {
        total_count,
        bookmarks,
    })
}

pub async fn list_bookmarks(
    State(state): State<AppState>,
    query: Result<Query<ListParams>, QueryRejection>,
) -> Result<APIResponse, HandlerError> {
    let Query(params) = query.map_err(|e| HandlerError::bad_request(e.body_text()))?;
    let page = params.into_page(&state.list)?;

    let mut session = state.store.begin().await?;
    let result = list_page(session.as_mut(), page).await;
    let list = finish(session, result).await?;

    tracing::debug!(after_id = page.after_id, limit = page.limit, returned = list.bookmarks.len(), "listed bookmarks");
    Ok(APIResponse::success(list))
}

pub async fn create_bookmark(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<APIResponse, HandlerError> {
    let bookmark = parse_bookmark(&body?)?;

    let mut session = state.store.begin().await?;
    let result = session.insert(&bookmark).await.map_err(HandlerError::from);
    let id = finish(session, result).await?;

    tracing::info!(bookmark_id = id, "created bookmark");
    Ok(APIResponse::created(bookmark.with_id(id).serialize()))
}

async fn replace_existing(session: &mut dyn Session, id: i64, bookmark: &Bookmark) -> Result<Bookmark, HandlerError> {
    let forbidden = || HandlerError::Forbidden("Adding new bookmarks with an arbitrary IDs is not allowed".to_string());

    if session.get_by_id(id).await?.is_none() {
        return Err(forbidden());
    }
    if !session.update_by_id(id, bookmark).await? {
        return Err(forbidden());
    }

    session
        .get_by_id(id)
        .await?
        .ok_or_else(|| HandlerError::Internal(anyhow::anyhow!("bookmark {id} vanished during update")))
}

pub async fn update_bookmark(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    body: Result<Bytes, BytesRejection>,
) -> Result<APIResponse, HandlerError> {
    let id = path_id(path)?;
    let bookmark = parse_bookmark(&body?)?;

    let mut session = state.store.begin().await?;
    let result = replace_existing(session.as_mut(), id, &bookmark).await;
    let updated = finish(session, result).await?;

    tracing::info!(bookmark_id = id, "updated bookmark");
    Ok(APIResponse::success(updated.serialize()))
}

pub async fn delete_bookmark(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<APIResponse, HandlerError> {
    let id = path_id(path)?;

    let mut session = state.store.begin().await?;
    let result = session.delete_by_id(id).await.map_err(HandlerError::from);
    let deleted = finish(session, result).await?;

    tracing::info!(bookmark_id = id, deleted, "deleted bookmark");
    Ok(APIResponse::success(Map::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(after_id: Option<&str>, limit: Option<&str>) -> ListParams {
        ListParams {
            after_id: after_id.map(str::to_string),
            limit: limit.map(str::to_string),
        }
    }

    fn cfg() -> ListConfig {
        ListConfig {
            default_limit: 20,
            max_limit: 100,
        }
    }

    fn message(err: HandlerError) -> String {
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        err.to_string()
    }

    #[test]
    fn page_defaults() {
        let page = params(None, None).into_page(&cfg()).unwrap();
        assert_eq!(page, Page { after_id: 0, limit: 20 });

        let page = params(Some(""), Some("")).into_page(&cfg()).unwrap();
        assert_eq!(page, Page { after_id: 0, limit: 20 });
    }

    #[test]
    fn page_explicit_values() {
        let page = params(Some("7"), Some("100")).into_page(&cfg()).unwrap();
        assert_eq!(page, Page { after_id: 7, limit: 100 });
    }

    #[test]
    fn page_rejects_non_integers() {
        let err = params(Some("x"), None).into_page(&cfg()).unwrap_err();
        assert_eq!(message(err), "Invalid after_id (should be integer)");

        let err = params(None, Some("1.5")).into_page(&cfg()).unwrap_err();
        assert_eq!(message(err), "Invalid limit (should be integer)");
    }

    #[test]
    fn page_rejects_out_of_range_limit() {
        for limit in ["0", "-3", "101"] {
            let err = params(None, Some(limit)).into_page(&cfg()).unwrap_err();
            assert_eq!(message(err), "Invalid limit, should be positive and less than 101");
        }
    }

    #[test]
    fn parse_id_values() {
        assert_eq!(parse_id("42").unwrap(), 42);
        assert!(parse_id("abc").is_err());
        assert!(parse_id("4.2").is_err());
    }

    #[test]
    fn parse_bookmark_errors() {
        let err = parse_bookmark(b"{not json").unwrap_err();
        assert!(message(err).starts_with("JSON decoding error: "));

        let err = parse_bookmark(b"[1, 2]").unwrap_err();
        assert_eq!(message(err), "Invalid bookmark data: expected a JSON object");

        let err = parse_bookmark(br#"{"url": "u", "title": "t"}"#).unwrap_err();
        assert_eq!(message(err), "Invalid bookmark data: missing fields: [comment]");
    }

    #[test]
    fn parse_bookmark_ignores_id() {
        let b = parse_bookmark(br#"{"id": 3, "url": "u", "title": "t", "comment": "c"}"#).unwrap();
        assert_eq!(b, Bookmark::new("u", "t", "c"));
    }
}
