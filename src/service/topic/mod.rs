//! Topic-level analysis
//!
//! Fetches candidate papers for a topic, analyzes each abstract with a
//! bounded number of concurrent analyses and aggregates the surviving
//! results into common gaps.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::model::{
    AnalysisRequest, AnalysisResult, PaperCandidate, SkippedPaper, TopicAnalysisResult,
    TopicAnalysisUnit, TopicConfig, TopicRequest,
};
use crate::retriever::PaperSource;
use crate::service::analysis::{AbstractAnalyzer, AnalysisError};

pub mod aggregation;

pub use aggregation::GapAggregator;

/// Analyzes the papers returned for a topic
pub struct TopicAnalyzer {
    analyzer: AbstractAnalyzer,
    source: Arc<dyn PaperSource>,
    aggregator: GapAggregator,
    default_max_papers: usize,
    max_papers_limit: usize,
    concurrency: usize,
    deadline: Duration,
}

impl TopicAnalyzer {
    pub fn new(
        analyzer: AbstractAnalyzer,
        source: Arc<dyn PaperSource>,
        config: &TopicConfig,
    ) -> Self {
        tracing::info!(
            source = source.name(),
            concurrency = config.concurrency,
            deadline_secs = config.deadline_secs,
            similarity_threshold = config.similarity_threshold,
            "Topic analyzer initialized"
        );

        Self {
            analyzer,
            source,
            aggregator: GapAggregator::new(config.similarity_threshold),
            default_max_papers: config.default_max_papers.max(1),
            max_papers_limit: config.max_papers_limit.max(1),
            concurrency: config.concurrency.max(1),
            deadline: config.deadline(),
        }
    }

    /// Largest accepted `max_papers`
    pub fn max_papers_limit(&self) -> usize {
        self.max_papers_limit
    }

    /// Analyze a topic
    ///
    /// Cancellation and the overall deadline are all-or-nothing: in-flight
    /// paper analyses are abandoned and no partial result is returned.
    pub async fn analyze_topic(
        &self,
        request: &TopicRequest,
        cancel: CancellationToken,
    ) -> Result<TopicAnalysisResult, AnalysisError> {
        if request.topic.trim().is_empty() {
            return Err(AnalysisError::InvalidRequest(
                "topic cannot be empty".to_string(),
            ));
        }
        if request.field.trim().is_empty() {
            return Err(AnalysisError::InvalidRequest(
                "field cannot be empty".to_string(),
            ));
        }

        let max_papers = request
            .max_papers
            .unwrap_or(self.default_max_papers)
            .clamp(1, self.max_papers_limit);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!(topic = %request.topic, "Topic analysis cancelled");
                Err(AnalysisError::Cancelled)
            }
            outcome = tokio::time::timeout(self.deadline, self.run(request, max_papers)) => {
                outcome.unwrap_or_else(|_| {
                    tracing::warn!(
                        topic = %request.topic,
                        deadline_secs = self.deadline.as_secs(),
                        "Topic analysis exceeded its deadline"
                    );
                    Err(AnalysisError::DeadlineExceeded(self.deadline))
                })
            }
        }
    }

    async fn run(
        &self,
        request: &TopicRequest,
        max_papers: usize,
    ) -> Result<TopicAnalysisResult, AnalysisError> {
        let start_time = Instant::now();
        let topic = request.topic.trim();

        let mut papers = match self.source.fetch(topic, &request.field, max_papers).await {
            Ok(papers) => papers,
            Err(e) => {
                tracing::error!(
                    topic = %topic,
                    source = self.source.name(),
                    error = %e,
                    "Paper fetch failed"
                );
                Vec::new()
            }
        };
        papers.truncate(max_papers);

        if papers.is_empty() {
            return Err(AnalysisError::NoAnalyzableContent {
                topic: topic.to_string(),
                reason: "paper source returned no papers".to_string(),
            });
        }

        let fetched = papers.len();
        tracing::info!(topic = %topic, papers = fetched, "Analyzing topic papers");

        let mut outcomes: Vec<(usize, PaperCandidate, Result<AnalysisResult, AnalysisError>)> =
            stream::iter(papers.into_iter().enumerate())
                .map(|(index, paper)| async move {
                    let analysis_request = AnalysisRequest {
                        title: paper.title.clone(),
                        abstract_text: paper.abstract_text.clone(),
                        field: request.field.clone(),
                        authors: (!paper.authors.is_empty()).then(|| paper.authors.clone()),
                        keywords: None,
                    };
                    let result = self.analyzer.analyze(&analysis_request).await;
                    (index, paper, result)
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        // Completion order is arbitrary
        outcomes.sort_by_key(|(index, _, _)| *index);

        let mut units = Vec::new();
        let mut skipped_papers = Vec::new();
        for (_, paper, result) in outcomes {
            match result {
                Ok(result) => units.push(TopicAnalysisUnit {
                    paper_title: paper.title,
                    authors: paper.authors,
                    abstract_text: paper.abstract_text,
                    url: paper.url,
                    published: paper.published,
                    categories: paper.categories,
                    gaps: result.gaps,
                    future_directions: result.future_directions,
                }),
                Err(e) => {
                    tracing::warn!(
                        topic = %topic,
                        paper = %paper.title,
                        error_kind = e.kind(),
                        error = %e,
                        "Paper analysis failed, skipping"
                    );
                    skipped_papers.push(SkippedPaper {
                        paper_title: paper.title,
                        url: paper.url,
                        error: e.kind().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        if units.is_empty() {
            return Err(AnalysisError::NoAnalyzableContent {
                topic: topic.to_string(),
                reason: format!("all {} papers failed analysis", fetched),
            });
        }

        let (common_gaps, suggested_research_directions) = self.aggregator.aggregate(&units);

        tracing::info!(
            topic = %topic,
            papers_analyzed = units.len(),
            papers_skipped = skipped_papers.len(),
            common_gaps = common_gaps.len(),
            elapsed_ms = start_time.elapsed().as_millis(),
            "Topic analysis completed"
        );

        Ok(TopicAnalysisResult {
            topic: topic.to_string(),
            papers_analyzed: units.len(),
            common_gaps,
            individual_results: units,
            suggested_research_directions,
            processing_time: start_time.elapsed().as_secs_f64(),
            skipped_papers,
        })
    }
}
