//! Free-text claim query to structured fields

use std::sync::Arc;

use crate::error::Result;
use crate::providers::ReasoningProvider;
use crate::types::{Reasoned, StructuredQuery};

use super::prompt::PromptBuilder;

/// Error recorded when the extraction reply is not a JSON object
pub const QUERY_PARSE_ERROR: &str = "Failed to parse query";

/// Asks the reasoning service to pull claim fields out of a raw query
#[derive(Clone)]
pub struct QueryStructurer {
    reasoner: Arc<dyn ReasoningProvider>,
}

impl QueryStructurer {
    pub fn new(reasoner: Arc<dyn ReasoningProvider>) -> Self {
        Self { reasoner }
    }

    /// Structure `raw_query`.
    ///
    /// Service failures are errors; an unparseable reply is returned as
    /// `Reasoned::Unparsed` with the reply text.
    pub async fn structure(&self, raw_query: &str) -> Result<Reasoned<StructuredQuery>> {
        let system_prompt = PromptBuilder::build_extraction_prompt();
        let reply = self.reasoner.complete(&system_prompt, raw_query).await?;

        let parsed: Reasoned<StructuredQuery> = Reasoned::from_reply(&reply, QUERY_PARSE_ERROR);
        if !parsed.is_structured() {
            tracing::warn!("Query extraction returned non-JSON reply ({} chars)", reply.len());
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::providers::llm::MockReasoningProvider;

    #[tokio::test]
    async fn test_structures_query() {
        let mut reasoner = MockReasoningProvider::new();
        reasoner
            .expect_complete()
            .withf(|system, user| {
                system.contains("policy_duration_months")
                    && user.contains("46M, knee surgery, Pune, 3-month policy")
            })
            .times(1)
            .returning(|_, _| {
                Ok(r#"{"age": 46, "gender": "M", "procedure": "knee surgery",
                       "location": "Pune", "policy_duration_months": 3}"#
                    .to_string())
            });

        let structurer = QueryStructurer::new(Arc::new(reasoner));
        let parsed = structurer
            .structure("46M, knee surgery, Pune, 3-month policy")
            .await
            .unwrap();

        let query = parsed.structured().unwrap();
        assert_eq!(query.age, Some(46));
        assert_eq!(query.location.as_deref(), Some("Pune"));
        assert_eq!(query.policy_duration_months, Some(3));
    }

    #[tokio::test]
    async fn test_prose_reply_falls_back() {
        let mut reasoner = MockReasoningProvider::new();
        reasoner
            .expect_complete()
            .returning(|_, _| Ok("The patient is a 46 year old male.".to_string()));

        let parsed = QueryStructurer::new(Arc::new(reasoner))
            .structure("46M knee")
            .await
            .unwrap();

        match parsed {
            Reasoned::Unparsed { error, raw } => {
                assert_eq!(error, QUERY_PARSE_ERROR);
                assert_eq!(raw, "The patient is a 46 year old male.");
            }
            other => panic!("expected fallback, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_service_failure_propagates() {
        let mut reasoner = MockReasoningProvider::new();
        reasoner
            .expect_complete()
            .returning(|_, _| Err(Error::timeout("reasoning", 120)));

        let err = QueryStructurer::new(Arc::new(reasoner))
            .structure("46M knee")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
    }
}
