//! Reasoning stages: query structuring and decision synthesis

pub mod decision;
pub mod prompt;
pub mod structuring;

pub use decision::{DecisionSynthesizer, DECISION_PARSE_ERROR};
pub use prompt::PromptBuilder;
pub use structuring::{QueryStructurer, QUERY_PARSE_ERROR};
