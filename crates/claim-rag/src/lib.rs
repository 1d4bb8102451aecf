//! claim-rag: insurance claim decisions grounded in policy documents
//!
//! A policy document is loaded, split into overlapping character windows and
//! embedded into a flat in-memory index. A claim query is embedded, the
//! nearest clauses are retrieved, and a language model structures the query
//! and renders an approve/reject decision with clause-level justification.
//! Indexes are cached per policy identifier and built at most once.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod pipeline;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use pipeline::{ClaimAssessment, ClaimPipeline, PolicyDocument};
pub use types::{
    Chunk, Decision, DecisionOutcome, Document, FileType, Justification, Reasoned,
    StructuredQuery,
};
