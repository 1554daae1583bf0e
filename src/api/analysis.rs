//! REST API endpoints for abstract, document and topic analysis

use actix_web::{HttpResponse, post, web};
use futures::StreamExt;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use utoipa::IntoParams;

use crate::api::ApiError;
use crate::model::{AnalysisRequest, DEFAULT_FIELD, TopicRequest};
use crate::service::{AbstractAnalyzer, ExtractionError, PdfExtractor, TopicAnalyzer};

const DEFAULT_DOCUMENT_TITLE: &str = "Untitled document";

/// Query parameters for PDF analysis
#[derive(Debug, Deserialize, IntoParams)]
pub struct PdfAnalysisQuery {
    /// Title of the document (default: "Untitled document")
    pub title: Option<String>,
    /// Research field tag (default: general)
    pub field: Option<String>,
}

/// Analyze a single abstract
#[utoipa::path(
    post,
    path = "/analyze",
    request_body = AnalysisRequest,
    responses(
        (status = 200, description = "Abstract analyzed successfully", body = crate::model::AnalysisResult),
        (status = 422, description = "Invalid request", body = crate::api::error::ErrorResponse),
        (status = 502, description = "Model provider failed or returned unusable output", body = crate::api::error::ErrorResponse),
        (status = 504, description = "Model provider timed out", body = crate::api::error::ErrorResponse)
    ),
    tag = "analysis"
)]
#[post("/analyze")]
pub async fn analyze(
    analyzer: web::Data<AbstractAnalyzer>,
    body: web::Json<AnalysisRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = body.into_inner();
    request.validate().map_err(ApiError::InvalidRequest)?;

    tracing::info!(title = %request.title, field = %request.field, "Abstract analysis requested");

    let result = analyzer.analyze(&request).await?;
    Ok(HttpResponse::Ok().json(result))
}

/// Analyze the papers returned for a topic
#[utoipa::path(
    post,
    path = "/topic",
    request_body = TopicRequest,
    responses(
        (status = 200, description = "Topic analyzed successfully", body = crate::model::TopicAnalysisResult),
        (status = 422, description = "Invalid request or no analyzable papers", body = crate::api::error::ErrorResponse),
        (status = 503, description = "Analysis cancelled", body = crate::api::error::ErrorResponse),
        (status = 504, description = "Analysis exceeded its deadline", body = crate::api::error::ErrorResponse)
    ),
    tag = "analysis"
)]
#[post("/topic")]
pub async fn analyze_topic(
    analyzer: web::Data<TopicAnalyzer>,
    shutdown: web::Data<CancellationToken>,
    body: web::Json<TopicRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = body.into_inner();
    request
        .validate(analyzer.max_papers_limit())
        .map_err(ApiError::InvalidRequest)?;

    tracing::info!(
        topic = %request.topic,
        field = %request.field,
        max_papers = ?request.max_papers,
        "Topic analysis requested"
    );

    let result = analyzer
        .analyze_topic(&request, shutdown.child_token())
        .await?;
    Ok(HttpResponse::Ok().json(result))
}

/// Extract text from a PDF and analyze it as an abstract
#[utoipa::path(
    post,
    path = "/analyze/pdf",
    params(PdfAnalysisQuery),
    request_body(content = Vec<u8>, content_type = "application/pdf"),
    responses(
        (status = 200, description = "Document analyzed successfully", body = crate::model::AnalysisResult),
        (status = 400, description = "Document could not be converted to text", body = crate::api::error::ErrorResponse),
        (status = 413, description = "Document too large", body = crate::api::error::ErrorResponse),
        (status = 502, description = "Model provider failed or returned unusable output", body = crate::api::error::ErrorResponse)
    ),
    tag = "analysis"
)]
#[post("/analyze/pdf")]
pub async fn analyze_pdf(
    analyzer: web::Data<AbstractAnalyzer>,
    extractor: web::Data<PdfExtractor>,
    query: web::Query<PdfAnalysisQuery>,
    mut payload: web::Payload,
) -> Result<HttpResponse, ApiError> {
    let max = extractor.max_file_size();
    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        if body.len() + chunk.len() > max {
            return Err(ExtractionError::TooLarge {
                size: body.len() + chunk.len(),
                max,
            }
            .into());
        }
        body.extend_from_slice(&chunk);
    }

    let extracted = extractor.extract(body.to_vec()).await?;

    let query = query.into_inner();
    let request = AnalysisRequest::new(
        non_blank(query.title).unwrap_or_else(|| DEFAULT_DOCUMENT_TITLE.to_string()),
        extracted.text,
        non_blank(query.field).unwrap_or_else(|| DEFAULT_FIELD.to_string()),
    );

    tracing::info!(
        title = %request.title,
        field = %request.field,
        pages = extracted.pages,
        "Document analysis requested"
    );

    let result = analyzer.analyze(&request).await?;
    Ok(HttpResponse::Ok().json(result))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Configure analysis routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    // Registered before /analyze so the longer path is matched first
    cfg.service(analyze_pdf)
        .service(analyze)
        .service(analyze_topic);
}
