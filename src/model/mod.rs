pub mod analysis;
pub mod config;
pub mod extracted;
pub mod topic;

pub use analysis::*;
pub use config::{ArxivConfig, Config, LlmConfig, PdfConfig, TopicConfig};
pub use topic::*;
