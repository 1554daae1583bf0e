//! OpenAPI specification endpoints

use actix_web::{HttpResponse, Responder, get};
use utoipa::OpenApi;

use crate::api::ApiError;
use crate::api::error::ErrorResponse;
use crate::api::health::HealthStatus;
use crate::model::{
    AnalysisRequest, AnalysisResult, CommonGap, GapType, Hypothesis, ResearchGap, SkippedPaper,
    TopicAnalysisResult, TopicAnalysisUnit, TopicRequest,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Research Gap Finder",
        description = "Identifies research gaps, limitations and hypotheses in scientific abstracts"
    ),
    paths(
        crate::api::analysis::analyze,
        crate::api::analysis::analyze_topic,
        crate::api::analysis::analyze_pdf,
        crate::api::health::health,
    ),
    components(schemas(
        AnalysisRequest,
        AnalysisResult,
        ResearchGap,
        GapType,
        Hypothesis,
        TopicRequest,
        TopicAnalysisResult,
        TopicAnalysisUnit,
        CommonGap,
        SkippedPaper,
        HealthStatus,
        ErrorResponse,
    )),
    tags(
        (name = "analysis", description = "Abstract, document and topic analysis"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

/// Serve OpenAPI JSON specification
#[get("/openapi.json")]
pub async fn openapi_json() -> impl Responder {
    HttpResponse::Ok().json(ApiDoc::openapi())
}

/// Serve OpenAPI YAML specification
#[get("/openapi.yaml")]
pub async fn openapi_yaml() -> Result<HttpResponse, ApiError> {
    let yaml = ApiDoc::openapi()
        .to_yaml()
        .map_err(|e| ApiError::Internal(format!("Failed to render OpenAPI YAML: {}", e)))?;

    Ok(HttpResponse::Ok().content_type("text/yaml").body(yaml))
}

/// Configure OpenAPI routes
pub fn configure(cfg: &mut actix_web::web::ServiceConfig) {
    cfg.service(openapi_json).service(openapi_yaml);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_every_route() {
        let json = ApiDoc::openapi().to_json().unwrap();
        for path in ["/analyze", "/topic", "/analyze/pdf", "/health"] {
            assert!(json.contains(&format!("\"{}\"", path)), "missing {path}");
        }
        // Wire names survive into the schema
        assert!(json.contains("suggested_hypotheses"));
        assert!(json.contains("\"abstract\""));
    }

    #[test]
    fn test_yaml_renders() {
        assert!(ApiDoc::openapi().to_yaml().is_ok());
    }
}
