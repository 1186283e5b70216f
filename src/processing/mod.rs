//! Document pipeline: ingestion types, embedding chunking, and stage orchestration.

pub mod chunking;
mod service;
pub mod types;

pub use chunking::ChunkingError;
pub use service::{Pipeline, PipelineApi};
pub use types::{
    BatchEntry, Document, DocumentInfo, DocumentReport, ExtractedText, HealthReport, Page,
    PipelineError, SourceKind, Stage,
};
