pub mod analysis;
pub mod llm;
pub mod pdf;
pub mod topic;

pub use analysis::{AbstractAnalyzer, AnalysisError};
pub use llm::{LlmClient, LlmInvoker, ModelProvider, ProviderContext};
pub use pdf::{ExtractionError, PdfExtractor};
pub use topic::TopicAnalyzer;
