//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the service-archiver REST
//! API using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the service-archiver REST API
///
/// The spec can be accessed via:
/// - `/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "service-archiver REST API",
        version = "0.1.0",
        description = "Fetches batches of service URLs concurrently and packages the responses into zip archives, synchronously or as per-owner background jobs",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:6790", description = "Local development server")
    ),
    paths(
        // Downloads
        crate::api::routes::create_download,
        crate::api::routes::download_status,
        crate::api::routes::retrieve_download,
        crate::api::routes::cancel_download,
        crate::api::routes::job_snapshot,
        crate::api::routes::collate,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::OwnerKey,
        crate::types::JobId,
        crate::types::Progression,
        crate::types::SubmitStatus,
        crate::types::EntryStatus,
        crate::types::EntryReport,
        crate::types::JobSnapshot,
        crate::types::Event,
        crate::mime::OutputFormat,

        // API request/response types from routes
        crate::api::routes::DownloadRequest,
        crate::api::routes::CollateRequest,
        crate::api::routes::SubmitResponse,
        crate::api::routes::JobStatusResponse,

        // Error types from error.rs
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "downloads", description = "Archive downloads - Synchronous archives, per-owner background jobs and collation"),
        (name = "system", description = "System endpoints - Health checks, OpenAPI spec, events"),
    )
)]
pub struct ApiDoc;
