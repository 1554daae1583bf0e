//! Application state and service initialization
//!
//! This module centralizes all service initialization and dependency injection,
//! making it easier to manage the application lifecycle and test services.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::model::Config;
use crate::retriever::{ArxivClient, PaperSource};
use crate::service::{
    AbstractAnalyzer, LlmClient, LlmInvoker, ModelProvider, PdfExtractor, ProviderContext,
    TopicAnalyzer,
};

/// Application state containing all services and shared resources
pub struct AppState {
    /// Single-abstract analysis
    pub abstract_analyzer: AbstractAnalyzer,
    /// Multi-paper topic analysis
    pub topic_analyzer: TopicAnalyzer,
    /// Document-to-text conversion
    pub pdf_extractor: PdfExtractor,
    /// Cancelled when the server stops; in-flight topic runs watch a child token
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Initialize all services and build application state
    ///
    /// Requires `OPENAI_API_KEY`. All analyzers share one provider context so
    /// the concurrency gate applies across every request.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| AppError::MissingConfig("OPENAI_API_KEY"))?;

        if api_key.trim().is_empty() {
            return Err(AppError::MissingConfig("OPENAI_API_KEY"));
        }

        let llm_client =
            LlmClient::new(&api_key, &config.llm).map_err(AppError::InvalidConfig)?;

        let source = ArxivClient::new(&config.arxiv)
            .map_err(|e| AppError::HttpClient(e.to_string()))?;

        Ok(Self::with_services(config, Arc::new(llm_client), Arc::new(source)))
    }

    /// Build the service graph around a provider and paper source
    pub fn with_services(
        config: &Config,
        provider: Arc<dyn ModelProvider>,
        source: Arc<dyn PaperSource>,
    ) -> Self {
        let context = ProviderContext::from_config(provider, &config.llm);
        let abstract_analyzer = AbstractAnalyzer::new(LlmInvoker::new(context));
        let topic_analyzer = TopicAnalyzer::new(abstract_analyzer.clone(), source, &config.topic);

        Self {
            abstract_analyzer,
            topic_analyzer,
            pdf_extractor: PdfExtractor::new(&config.pdf),
            shutdown: CancellationToken::new(),
        }
    }
}

/// Cancel `shutdown` once `signal` resolves
///
/// Runs alongside the HTTP server so in-flight topic runs are abandoned while
/// the server is still draining connections.
pub fn cancel_on<F>(shutdown: CancellationToken, signal: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            _ = signal => {
                tracing::info!("Shutdown signal received, cancelling in-flight analyses");
                shutdown.cancel();
            }
            _ = shutdown.cancelled() => {}
        }
    })
}

/// Resolves on Ctrl-C, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Application-level errors
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AppError {
    /// Missing required configuration
    #[error("Missing required configuration: {0}")]
    MissingConfig(&'static str),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Outbound HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}
