//! Prompt templates for query structuring and claim decisions

use crate::retrieval::SearchHit;
use crate::types::{Reasoned, StructuredQuery};

/// System prompt for the decision call
pub const DECISION_SYSTEM_PROMPT: &str = "You are a claim decision engine.";

/// Prompt builder for the reasoning calls
pub struct PromptBuilder;

impl PromptBuilder {
    /// Instruction that asks for the claim fields as JSON
    pub fn build_extraction_prompt() -> String {
        r#"Extract the following from the query:
- Age
- Gender
- Procedure
- City
- Policy Age (in months)

Return as JSON:
{
  "age": ...,
  "gender": "...",
  "procedure": "...",
  "location": "...",
  "policy_duration_months": ...
}"#
        .to_string()
    }

    /// Join retrieved clauses in search order, separated by blank lines
    pub fn build_clauses(hits: &[SearchHit]) -> String {
        hits.iter()
            .map(|hit| hit.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Render the structuring result for the decision prompt.
    ///
    /// The extraction reply goes through verbatim, parsed or not.
    pub fn format_claim_details(query: &Reasoned<StructuredQuery>) -> String {
        query.reply().to_string()
    }

    /// Build the decision prompt from claim details and retrieved clauses
    pub fn build_decision_prompt(claim_details: &str, clauses: &str) -> String {
        format!(
            r#"You are an insurance policy analyzer. Based on the user info:
{claim_details}

And these retrieved clauses:
{clauses}

Decide if the procedure is approved. Respond in JSON format:
{{
  "decision": "Approved/Rejected",
  "amount": "...",
  "justification": [
    {{
      "clause": "...",
      "explanation": "..."
    }}
  ]
}}"#,
            claim_details = claim_details,
            clauses = clauses
        )
    }
}
