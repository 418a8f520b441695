//! services/api/src/web/documents.rs
//!
//! Streams stored documents back to the browser.

use crate::error::{ApiError, ErrorBody};
use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use std::sync::Arc;

/// GET /document/view/{fileId} - Show a stored document inline
#[utoipa::path(
    get,
    path = "/document/view/{fileId}",
    params(("fileId" = String, Path, description = "The id returned in a document reference")),
    responses(
        (status = 200, description = "The document bytes as `application/pdf`"),
        (status = 404, description = "Document not found", body = ErrorBody)
    )
)]
pub async fn view_document_handler(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let bytes = state.workflow.view_document(&file_id).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_LENGTH, bytes.len().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}.pdf\"", file_id.replace('"', "")),
            ),
        ],
        bytes,
    ))
}
