//! Paper retrievers for fetching candidate papers by topic

mod arxiv;

use async_trait::async_trait;

use crate::model::PaperCandidate;

pub use arxiv::ArxivClient;

#[derive(Debug, thiserror::Error)]
pub enum RetrieverError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Rate limited")]
    RateLimited,
}

/// Source of candidate papers for a topic
///
/// Returning fewer papers than requested, or none, is not an error.
#[async_trait]
pub trait PaperSource: Send + Sync {
    async fn fetch(
        &self,
        topic: &str,
        field: &str,
        limit: usize,
    ) -> Result<Vec<PaperCandidate>, RetrieverError>;

    /// Name used in logs
    fn name(&self) -> &'static str;
}

/// Whitespace-collapsed text
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
pub mod testing {
    use super::*;

    /// In-memory paper source
    pub struct StaticPaperSource {
        papers: Vec<PaperCandidate>,
        fail: bool,
    }

    impl StaticPaperSource {
        pub fn new(papers: Vec<PaperCandidate>) -> Self {
            Self { papers, fail: false }
        }

        pub fn failing() -> Self {
            Self {
                papers: vec![],
                fail: true,
            }
        }
    }

    #[async_trait]
    impl PaperSource for StaticPaperSource {
        async fn fetch(
            &self,
            _topic: &str,
            _field: &str,
            limit: usize,
        ) -> Result<Vec<PaperCandidate>, RetrieverError> {
            if self.fail {
                return Err(RetrieverError::RateLimited);
            }
            Ok(self.papers.iter().take(limit).cloned().collect())
        }

        fn name(&self) -> &'static str {
            "static"
        }
    }

    pub fn paper(title: &str, abstract_text: &str) -> PaperCandidate {
        PaperCandidate {
            title: title.to_string(),
            authors: vec!["A. Author".to_string()],
            abstract_text: abstract_text.to_string(),
            url: Some(format!("http://arxiv.org/abs/{}", title.to_lowercase())),
            published: None,
            categories: vec![],
        }
    }
}
