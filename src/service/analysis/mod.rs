//! Single-abstract analysis
//!
//! Builds a field-aware prompt, sends it through the [`LlmInvoker`] and
//! decodes the output into a validated [`AnalysisResult`].

use std::time::Instant;

use crate::model::{AnalysisRequest, AnalysisResult};
use crate::service::llm::LlmInvoker;

pub mod error;
pub mod prompts;
pub mod validation;

pub use error::AnalysisError;

use prompts::{ANALYSIS_SYSTEM_PROMPT, build_analysis_prompt};
use validation::parse_analysis;

/// Analyzes one abstract for gaps, limitations and hypotheses
#[derive(Clone)]
pub struct AbstractAnalyzer {
    invoker: LlmInvoker,
}

impl AbstractAnalyzer {
    pub fn new(invoker: LlmInvoker) -> Self {
        tracing::info!(model = %invoker.model(), "Abstract analyzer initialized");
        Self { invoker }
    }

    /// Analyze an abstract
    ///
    /// `processing_time` covers prompt construction through validation.
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        let start_time = Instant::now();

        let prompt = build_analysis_prompt(request)?;

        tracing::debug!(
            title = %request.title,
            field = %request.field,
            model = %self.invoker.model(),
            prompt_length = prompt.len(),
            "Analyzing abstract"
        );

        let raw = self.invoker.invoke(ANALYSIS_SYSTEM_PROMPT, &prompt).await?;

        let parsed = parse_analysis(&raw).map_err(|e| {
            tracing::error!(
                title = %request.title,
                output_length = raw.len(),
                error = %e,
                "Model output could not be parsed"
            );
            e
        })?;

        if !parsed.report.is_clean() {
            tracing::warn!(
                title = %request.title,
                clamped_scores = parsed.report.clamped_scores,
                dropped_gaps = parsed.report.dropped_gaps,
                dropped_hypotheses = parsed.report.dropped_hypotheses,
                warnings = ?parsed.report.warnings,
                "Model output repaired during validation"
            );
        }

        let mut result = parsed.result;
        result.processing_time = start_time.elapsed().as_secs_f64();

        tracing::info!(
            title = %request.title,
            gaps = result.gaps.len(),
            hypotheses = result.hypotheses.len(),
            elapsed_ms = start_time.elapsed().as_millis(),
            "Abstract analysis completed"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::service::analysis::validation::ParseError;
    use crate::service::llm::ProviderFailure;
    use crate::service::llm::testing::{ScriptedProvider, fast_policy, invoker};

    const OUTPUT: &str = r#"```json
    {
        "key_findings": ["Finding"],
        "gaps": [
            {"gap_description": "Overconfident", "gap_type": "empirical", "confidence_score": 1.4},
            {"gap_description": "Underconfident", "gap_type": "theoretical", "confidence_score": -2}
        ],
        "limitations": [],
        "methodology_gaps": [],
        "suggested_hypotheses": [
            {"hypothesis": "H", "rationale": "R", "feasibility_score": 3, "required_methods": ["Trial"]}
        ],
        "future_directions": ["Replicate"]
    }
    ```"#;

    fn analyzer(provider: Arc<ScriptedProvider>) -> AbstractAnalyzer {
        AbstractAnalyzer::new(invoker(provider, fast_policy(3), 2))
    }

    #[tokio::test]
    async fn test_scores_always_in_range() {
        let provider = Arc::new(ScriptedProvider::always(OUTPUT));
        let result = analyzer(provider)
            .analyze(&AnalysisRequest::new("T", "An abstract.", "medicine"))
            .await
            .unwrap();

        assert_eq!(result.gaps.len(), 2);
        assert!(
            result
                .gaps
                .iter()
                .all(|g| (0.0..=1.0).contains(&g.confidence_score))
        );
        assert!(
            result
                .hypotheses
                .iter()
                .all(|h| (0.0..=1.0).contains(&h.feasibility_score))
        );
        assert!(result.processing_time >= 0.0);
    }

    #[tokio::test]
    async fn test_prompt_reaches_provider() {
        let provider = Arc::new(ScriptedProvider::new(|_, prompt| {
            assert!(prompt.contains("A study of sleep."));
            assert!(prompt.contains("Neuroscience research"));
            Ok(r#"{"gaps": []}"#.to_string())
        }));
        let result = analyzer(provider.clone())
            .analyze(&AnalysisRequest::new("T", "A study of sleep.", "neuroscience"))
            .await
            .unwrap();

        assert!(result.gaps.is_empty());
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_invalid_request_never_calls_provider() {
        let provider = Arc::new(ScriptedProvider::always(OUTPUT));
        let err = analyzer(provider.clone())
            .analyze(&AnalysisRequest::new("T", "", "medicine"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "invalid_request");
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_unparseable_output_is_parse_error() {
        let provider = Arc::new(ScriptedProvider::always("I cannot help with that."));
        let err = analyzer(provider)
            .analyze(&AnalysisRequest::new("T", "An abstract.", "general"))
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::Parse(ParseError::NoStructuredPayload)));
        assert_eq!(err.kind(), "parse_error");
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_errors_propagate() {
        let provider = Arc::new(ScriptedProvider::sequence(vec![Err(
            ProviderFailure::Permanent("401 unauthorized".into()),
        )]));
        let err = analyzer(provider)
            .analyze(&AnalysisRequest::new("T", "An abstract.", "general"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "provider_error");
    }
}
