use std::io::{Seek, SeekFrom};
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use msuite_ingest::IngestPipeline;
use msuite_store::StorageBackend;
use msuite_types::Identifier;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio_util::io::{ReaderStream, SyncIoBridge};

use crate::config::DEFAULT_MAX_LIMIT;
use crate::error::{ServerError, ServerResult};

/// Size of the in-memory pipe between a blocking content reader and the
/// response body.
const STREAM_BUFFER: usize = 64 * 1024;

/// Shared handler state: one backend and one pipeline per process.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn StorageBackend>,
    pub pipeline: Arc<IngestPipeline>,
    pub max_limit: usize,
}

impl AppState {
    pub fn new(pipeline: IngestPipeline, max_limit: usize) -> Self {
        Self {
            backend: Arc::clone(pipeline.backend()),
            pipeline: Arc::new(pipeline),
            max_limit,
        }
    }
}

/// Run blocking backend work off the async executor.
async fn blocking<T, F>(f: F) -> ServerResult<T>
where
    F: FnOnce() -> ServerResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
}

/// Identifiers that fail validation cannot name a stored suite.
fn suite_id(raw: &str) -> ServerResult<Identifier> {
    Identifier::parse(raw).map_err(|_| ServerError::NotFound(raw.to_string()))
}

fn suite_link(id: &Identifier) -> String {
    format!("/{id}")
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "name": "msuite-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /`: one page of suite identifiers.
pub async fn list_suites(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ServerResult<Json<Value>> {
    let offset = params.offset.unwrap_or(0);
    let limit = params.limit.unwrap_or(DEFAULT_MAX_LIMIT).min(state.max_limit);
    let backend = state.backend.clone();
    let ids = blocking(move || Ok(backend.list_identifiers(offset, limit)?)).await?;
    let suites: Vec<Value> = ids
        .iter()
        .map(|id| json!({ "identifier": id.as_str(), "_link": suite_link(id) }))
        .collect();
    Ok(Json(json!({
        "materialsuites": suites,
        "offset": offset,
        "limit": limit,
    })))
}

/// `GET /:id`: links to the two halves of a suite.
pub async fn get_suite(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ServerResult<Json<Value>> {
    let id = suite_id(&raw)?;
    let backend = state.backend.clone();
    let lookup = id.clone();
    let (content, metadata) = blocking(move || {
        Ok((
            backend.content_exists(&lookup)?,
            backend.metadata_exists(&lookup)?,
        ))
    })
    .await?;
    if !content && !metadata {
        return Err(ServerError::NotFound(raw));
    }
    let link = suite_link(&id);
    Ok(Json(json!({
        "premis": format!("{link}/premis"),
        "content": format!("{link}/content"),
        "_self": link,
        "content_exists": content,
        "metadata_exists": metadata,
    })))
}

/// `GET /:id/content`: the stored bytes, streamed.
pub async fn get_content(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ServerResult<Response> {
    let id = suite_id(&raw)?;
    let backend = state.backend.clone();
    let mut reader = blocking(move || Ok(backend.get_content(&id)?)).await?;

    let (tx, rx) = tokio::io::duplex(STREAM_BUFFER);
    let mut writer = SyncIoBridge::new(tx);
    tokio::task::spawn_blocking(move || {
        // An error here means the client went away or the store failed
        // mid-read; the body just ends early.
        if let Err(e) = std::io::copy(&mut reader, &mut writer) {
            tracing::warn!(id = %raw, error = %e, "content stream interrupted");
        }
    });

    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        Body::from_stream(ReaderStream::new(rx)),
    )
        .into_response())
}

/// `GET /:id/premis`: the record in its native XML form.
pub async fn get_premis(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ServerResult<Response> {
    let id = suite_id(&raw)?;
    let backend = state.backend.clone();
    let xml = blocking(move || {
        let record = backend.get_metadata(&id)?;
        record.to_xml().map_err(|e| ServerError::Store(e.into()))
    })
    .await?;
    Ok(([(header::CONTENT_TYPE, "text/xml")], xml).into_response())
}

/// `PUT /:id/premis`: replace the record of an existing suite.
pub async fn put_premis(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    body: Bytes,
) -> ServerResult<Json<Value>> {
    let id = suite_id(&raw)?;
    let pipeline = state.pipeline.clone();
    let amended = id.clone();
    blocking(move || Ok(pipeline.amend_metadata(&amended, &body)?)).await?;
    Ok(Json(json!({ "updated": format!("{}/premis", suite_link(&id)) })))
}

/// `GET /:id/premis/json`: the record in its structural form.
pub async fn get_premis_json(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> ServerResult<Json<Value>> {
    let id = suite_id(&raw)?;
    let backend = state.backend.clone();
    let tree = blocking(move || Ok(backend.get_metadata_json(&id)?)).await?;
    Ok(Json(tree))
}

/// `POST /add`: ingest a new suite from the multipart fields `content` and
/// `premis`.
pub async fn add_suite(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ServerResult<Response> {
    let mut content: Option<std::fs::File> = None;
    let mut premis: Option<Bytes> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(e.to_string()))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("content") => {
                let spool = match state.pipeline.staging_dir() {
                    Some(dir) => tempfile::tempfile_in(dir)?,
                    None => tempfile::tempfile()?,
                };
                let mut file = tokio::fs::File::from_std(spool.try_clone()?);
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| ServerError::BadRequest(e.to_string()))?
                {
                    file.write_all(&chunk).await?;
                }
                file.flush().await?;
                content = Some(spool);
            }
            Some("premis") => {
                premis = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| ServerError::BadRequest(e.to_string()))?,
                );
            }
            other => {
                tracing::debug!(field = ?other, "ignoring unexpected multipart field");
            }
        }
    }

    let mut content =
        content.ok_or_else(|| ServerError::BadRequest("missing multipart field: content".into()))?;
    let premis =
        premis.ok_or_else(|| ServerError::BadRequest("missing multipart field: premis".into()))?;

    let pipeline = state.pipeline.clone();
    let id = blocking(move || {
        content.seek(SeekFrom::Start(0))?;
        Ok(pipeline.add(&mut content, &premis)?)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "created": suite_link(&id) })),
    )
        .into_response())
}
