pub mod config;
pub mod core;
pub mod error;
pub mod export;
pub mod fusion;
pub mod matching;
pub mod pipeline;
pub mod recognition;
pub mod segmentation;
pub mod structure;
pub mod validation;

pub use config::AnalysisConfig;
pub use core::model::{FieldElement, PageSnapshot};
pub use error::{AnalysisError, Result};
pub use pipeline::{AnalysisResult, PipelineOrchestrator, PipelinePhase};
