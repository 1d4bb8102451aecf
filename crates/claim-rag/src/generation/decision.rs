//! Claim decisions from structured queries and retrieved clauses

use std::sync::Arc;

use crate::error::Result;
use crate::providers::ReasoningProvider;
use crate::types::{Decision, Reasoned, StructuredQuery};

use super::prompt::{PromptBuilder, DECISION_SYSTEM_PROMPT};

/// Error recorded when the decision reply is not a valid decision object
pub const DECISION_PARSE_ERROR: &str = "Failed to parse decision";

/// Renders approve/reject decisions through the reasoning service
#[derive(Clone)]
pub struct DecisionSynthesizer {
    reasoner: Arc<dyn ReasoningProvider>,
}

impl DecisionSynthesizer {
    pub fn new(reasoner: Arc<dyn ReasoningProvider>) -> Self {
        Self { reasoner }
    }

    /// Decide a claim.
    ///
    /// `clauses` are the retrieved chunk texts already joined in search order.
    pub async fn decide(
        &self,
        query: &Reasoned<StructuredQuery>,
        clauses: &str,
    ) -> Result<Reasoned<Decision>> {
        let claim_details = PromptBuilder::format_claim_details(query);
        let prompt = PromptBuilder::build_decision_prompt(&claim_details, clauses);

        let reply = self.reasoner.complete(DECISION_SYSTEM_PROMPT, &prompt).await?;

        let parsed: Reasoned<Decision> = Reasoned::from_reply(&reply, DECISION_PARSE_ERROR);
        match (parsed.structured(), parsed.is_structured()) {
            (Some(decision), _) => {
                tracing::info!(
                    "Decision: {} ({} justifications)",
                    decision.decision,
                    decision.justification.len()
                );
            }
            (None, true) => {
                tracing::warn!("Decision reply is JSON but not in the expected shape");
            }
            (None, false) => {
                tracing::warn!("Decision reply was not valid JSON ({} chars)", reply.len());
            }
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::providers::llm::MockReasoningProvider;
    use crate::types::DecisionOutcome;

    #[tokio::test]
    async fn test_decides_from_clauses() {
        let mut reasoner = MockReasoningProvider::new();
        reasoner
            .expect_complete()
            .withf(|system, user| {
                system.contains(DECISION_SYSTEM_PROMPT)
                    && user.contains("\"age\": 46")
                    && user.contains("Clause A\n\nClause B")
            })
            .times(1)
            .returning(|_, _| {
                Ok("```json\n{\"decision\": \"Rejected\", \"amount\": 0, \"justification\": \
                    [{\"clause\": \"Clause A\", \"explanation\": \"24 month waiting period\"}]}\n```"
                    .to_string())
            });

        let query = Reasoned::from_typed(StructuredQuery {
            age: Some(46),
            ..StructuredQuery::default()
        });
        let decision = DecisionSynthesizer::new(Arc::new(reasoner))
            .decide(&query, "Clause A\n\nClause B")
            .await
            .unwrap();

        let decision = decision.structured().unwrap();
        assert_eq!(decision.decision, DecisionOutcome::Rejected);
        assert_eq!(decision.justification[0].clause, "Clause A");
    }

    #[tokio::test]
    async fn test_fallback_query_is_passed_raw() {
        let mut reasoner = MockReasoningProvider::new();
        reasoner
            .expect_complete()
            .withf(|_, user| user.contains("raw extraction text"))
            .returning(|_, _| Ok("not json".to_string()));

        let query: Reasoned<StructuredQuery> = Reasoned::Unparsed {
            error: "Failed to parse query".into(),
            raw: "raw extraction text".into(),
        };
        let decision = DecisionSynthesizer::new(Arc::new(reasoner))
            .decide(&query, "")
            .await
            .unwrap();

        assert_eq!(decision.raw(), Some("not json"));
        assert!(!decision.is_structured());
    }

    #[tokio::test]
    async fn test_extraction_reply_is_passed_verbatim() {
        let extraction = r#"{"age": "forty-six", "procedure": "knee surgery"}"#;
        let mut reasoner = MockReasoningProvider::new();
        reasoner
            .expect_complete()
            .withf(|_, user| user.contains(r#"{"age": "forty-six", "procedure": "knee surgery"}"#))
            .times(1)
            .returning(|_, _| Ok(r#"{"decision": "Approved", "justification": "Clause 4.1"}"#.to_string()));

        let query: Reasoned<StructuredQuery> = Reasoned::from_reply(extraction, "Failed to parse query");
        let decision = DecisionSynthesizer::new(Arc::new(reasoner))
            .decide(&query, "Clause 4.1")
            .await
            .unwrap();

        assert!(decision.is_structured());
        assert!(decision.structured().is_none());
        assert_eq!(decision.json().unwrap()["justification"], "Clause 4.1");
    }

    #[tokio::test]
    async fn test_service_failure_propagates() {
        let mut reasoner = MockReasoningProvider::new();
        reasoner
            .expect_complete()
            .returning(|_, _| Err(Error::reasoning("HTTP 500")));

        let err = DecisionSynthesizer::new(Arc::new(reasoner))
            .decide(&Reasoned::from_typed(StructuredQuery::default()), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Reasoning(_)));
    }
}
