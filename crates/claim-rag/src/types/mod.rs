//! Core types for the claim pipeline

pub mod claim;
pub mod document;

pub use claim::{Decision, DecisionOutcome, Justification, Parsed, Reasoned, StructuredQuery};
pub use document::{Chunk, Document, FileType};
