//! HTTP API layer

pub mod analysis;
pub mod error;
pub mod health;
pub mod openapi;

use actix_web::web;

pub use error::ApiError;

/// Largest accepted JSON request body
const JSON_BODY_LIMIT: usize = 1024 * 1024;

/// JSON extractor settings
///
/// Undecodable bodies are reported through [`ApiError`] so they share the
/// error body of every other rejection.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_BODY_LIMIT)
        .error_handler(|err, _req| ApiError::InvalidRequest(err.to_string()).into())
}

/// Query string extractor settings
pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| ApiError::InvalidRequest(err.to_string()).into())
}

/// Configure every route and extractor
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .configure(analysis::configure)
        .configure(health::configure)
        .configure(openapi::configure);
}
