pub mod analyzer;
pub mod config;
pub mod entities;
pub mod error;
pub mod graph;
pub mod reasoning;
pub mod similarity;

pub use analyzer::{AnalysisInput, AnalysisReport, AnalyzeRequest, AnalyzerConfig, MatchAnalyzer};
pub use error::{AnalyzeError, EntityError};
pub use graph::{KnowledgeGraph, SharedGraph};
