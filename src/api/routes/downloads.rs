//! Archive download and job handlers.

use super::{CollateRequest, DownloadRequest, JobStatusResponse, SubmitResponse};
use crate::api::AppState;
use crate::error::{Error, JobError};
use crate::service::ArchiveDownload;
use crate::types::{OwnerKey, SubmitStatus};
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

/// Turn a finished archive into an inline zip response
fn archive_response(download: ArchiveDownload) -> Response {
    let disposition = HeaderValue::from_str(&format!(
        "inline; filename={};",
        download.display_name
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("inline; filename=DataDownload.zip;"));

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/zip")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        download.bytes,
    )
        .into_response()
}

/// POST /downloads - Build an archive, or start a background job for an owner
///
/// Without an `email` the archive is built before responding. With one, a
/// background job is started and the archive is fetched later from
/// `GET /downloads/{owner}`.
#[utoipa::path(
    post,
    path = "/downloads",
    tag = "downloads",
    request_body = DownloadRequest,
    responses(
        (status = 200, description = "The finished archive (synchronous request)", content_type = "application/zip"),
        (status = 202, description = "Background job started", body = SubmitResponse),
        (status = 400, description = "No service URLs given", body = crate::error::ApiError),
        (status = 409, description = "The owner already has a job in progress", body = SubmitResponse),
        (status = 503, description = "Shutting down", body = crate::error::ApiError)
    )
)]
pub async fn create_download(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> Response {
    let owner = request
        .email
        .as_deref()
        .map(str::trim)
        .filter(|email| !email.is_empty());

    let Some(owner) = owner else {
        return match state
            .service
            .submit_sync(
                &request.service_urls,
                request.output_format.as_deref(),
                request.filename.as_deref(),
            )
            .await
        {
            Ok(download) => archive_response(download),
            Err(e) => e.into_response(),
        };
    };

    match state
        .service
        .submit_async(
            owner,
            request.service_urls,
            request.output_format.as_deref(),
        )
        .await
    {
        Ok(status @ SubmitStatus::Accepted) => {
            (StatusCode::ACCEPTED, Json(SubmitResponse { status })).into_response()
        }
        Ok(status @ SubmitStatus::Conflict) => {
            (StatusCode::CONFLICT, Json(SubmitResponse { status })).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// GET /downloads/:owner/status - Poll the owner's job
#[utoipa::path(
    get,
    path = "/downloads/{owner}/status",
    tag = "downloads",
    params(
        ("owner" = String, Path, description = "Owner key the job was submitted under")
    ),
    responses(
        (status = 200, description = "Current job state", body = JobStatusResponse),
        (status = 400, description = "Blank owner key", body = crate::error::ApiError)
    )
)]
pub async fn download_status(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Response {
    match state.service.poll_status(&owner).await {
        Ok(status) => Json(JobStatusResponse {
            owner: owner.trim().to_string(),
            status,
            message: status.describe().to_string(),
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /downloads/:owner - Retrieve the owner's finished archive
#[utoipa::path(
    get,
    path = "/downloads/{owner}",
    tag = "downloads",
    params(
        ("owner" = String, Path, description = "Owner key the job was submitted under")
    ),
    responses(
        (status = 200, description = "The finished archive", content_type = "application/zip"),
        (status = 404, description = "No job for this owner", body = crate::error::ApiError),
        (status = 409, description = "The job has not completed", body = crate::error::ApiError)
    )
)]
pub async fn retrieve_download(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Response {
    match state.service.retrieve_result(&owner).await {
        Ok(download) => archive_response(download),
        Err(e) => e.into_response(),
    }
}

/// DELETE /downloads/:owner - Cancel the owner's running job
///
/// The job settles in the error state once its pipeline notices.
#[utoipa::path(
    delete,
    path = "/downloads/{owner}",
    tag = "downloads",
    params(
        ("owner" = String, Path, description = "Owner key the job was submitted under")
    ),
    responses(
        (status = 204, description = "Cancellation requested"),
        (status = 404, description = "No job for this owner", body = crate::error::ApiError),
        (status = 409, description = "The job already finished", body = crate::error::ApiError)
    )
)]
pub async fn cancel_download(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Response {
    match state.service.cancel(&owner).await {
        Ok(job_id) => {
            tracing::info!(owner = %owner.trim(), job_id = %job_id, "job cancelled via API");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// GET /downloads/:owner/job - Full snapshot of the owner's job
#[utoipa::path(
    get,
    path = "/downloads/{owner}/job",
    tag = "downloads",
    params(
        ("owner" = String, Path, description = "Owner key the job was submitted under")
    ),
    responses(
        (status = 200, description = "Job snapshot with per-entry report", body = crate::types::JobSnapshot),
        (status = 404, description = "No job for this owner", body = crate::error::ApiError)
    )
)]
pub async fn job_snapshot(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> crate::Result<Json<crate::types::JobSnapshot>> {
    match state.service.status(&owner).await? {
        Some(snapshot) => Ok(Json(snapshot)),
        None => Err(Error::Job(JobError::NotFound {
            owner: OwnerKey::parse(&owner)?,
        })),
    }
}

/// POST /collate - Archive every successful response under a chosen filename
#[utoipa::path(
    post,
    path = "/collate",
    tag = "downloads",
    request_body = CollateRequest,
    responses(
        (status = 200, description = "The collated archive", content_type = "application/zip"),
        (status = 400, description = "No service URLs given", body = crate::error::ApiError),
        (status = 503, description = "Shutting down", body = crate::error::ApiError)
    )
)]
pub async fn collate(State(state): State<AppState>, Json(request): Json<CollateRequest>) -> Response {
    match state
        .service
        .collate(&request.service_urls, request.filename.as_deref())
        .await
    {
        Ok(download) => archive_response(download),
        Err(e) => e.into_response(),
    }
}
