//! Wire and domain types for topic-level analysis

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::analysis::{DEFAULT_FIELD, GapType, ResearchGap};

fn default_field() -> String {
    DEFAULT_FIELD.to_string()
}

/// Request to analyze the papers returned for a topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TopicRequest {
    pub topic: String,
    #[serde(default = "default_field")]
    pub field: String,
    /// Upper bound on fetched papers (1..=50, default 10)
    #[serde(default)]
    pub max_papers: Option<usize>,
}

impl TopicRequest {
    /// Validation applied at the HTTP boundary
    pub fn validate(&self, max_papers_limit: usize) -> Result<(), String> {
        if self.topic.trim().is_empty() {
            return Err("topic cannot be empty".to_string());
        }
        if self.field.trim().is_empty() {
            return Err("field cannot be empty".to_string());
        }
        if let Some(max) = self.max_papers
            && (max == 0 || max > max_papers_limit)
        {
            return Err(format!(
                "max_papers must be between 1 and {}",
                max_papers_limit
            ));
        }
        Ok(())
    }
}

/// A candidate paper returned by a paper source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperCandidate {
    pub title: String,
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub url: Option<String>,
    pub published: Option<String>,
    pub categories: Vec<String>,
}

/// One successfully analyzed paper and its gaps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TopicAnalysisUnit {
    pub paper_title: String,
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub url: Option<String>,
    /// Publication date as reported by the paper source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    pub gaps: Vec<ResearchGap>,
    /// Carried for direction synthesis only
    #[serde(skip)]
    pub future_directions: Vec<String>,
}

/// A gap judged equivalent across several papers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CommonGap {
    pub gap_description: String,
    /// Mean of member confidences
    pub confidence_score: f64,
    pub gap_type: GapType,
    pub potential_impact: String,
    /// Number of distinct papers contributing to this gap
    pub support_count: usize,
}

/// A paper excluded from topic results because its analysis failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SkippedPaper {
    pub paper_title: String,
    pub url: Option<String>,
    /// Stable error kind
    pub error: String,
    pub message: String,
}

/// Aggregated result of a topic analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TopicAnalysisResult {
    pub topic: String,
    pub papers_analyzed: usize,
    pub common_gaps: Vec<CommonGap>,
    pub individual_results: Vec<TopicAnalysisUnit>,
    pub suggested_research_directions: Vec<String>,
    /// Wall-clock seconds covering fetch and every per-paper analysis
    pub processing_time: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_papers: Vec<SkippedPaper>,
}
