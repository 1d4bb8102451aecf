//! Claim query, decision and reasoning result types

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Fields extracted from a free-text claim query.
///
/// Every field is optional: the reasoning service decides what it can find.
/// Numbers given as strings ("46", "3 months") are accepted. Fields the
/// service adds beyond the known ones are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredQuery {
    #[serde(default, deserialize_with = "lenient::number")]
    pub age: Option<u32>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub gender: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub procedure: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub policy_duration_months: Option<u32>,
    /// Unrecognised fields, passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Verdict of a decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionOutcome {
    Approved,
    Rejected,
    /// Any other verdict text the service produced (e.g. "Partially Approved")
    Other(String),
}

impl DecisionOutcome {
    /// Verdict as displayed text
    pub fn as_str(&self) -> &str {
        match self {
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::Other(s) => s,
        }
    }

    /// Parse a verdict, case-insensitively
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "approved" | "approve" => Self::Approved,
            "rejected" | "reject" | "denied" => Self::Rejected,
            _ => Self::Other(s.trim().to_string()),
        }
    }
}

impl Serialize for DecisionOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DecisionOutcome {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

impl std::fmt::Display for DecisionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One policy clause cited in support of a decision
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Justification {
    pub clause: String,
    pub explanation: String,
}

impl<'de> Deserialize<'de> for Justification {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Models sometimes answer with bare strings instead of objects
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Full {
                #[serde(default, deserialize_with = "lenient::text")]
                clause: Option<String>,
                #[serde(default, deserialize_with = "lenient::text")]
                explanation: Option<String>,
            },
            Text(String),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Full {
                clause,
                explanation,
            } => Self {
                clause: clause.unwrap_or_default(),
                explanation: explanation.unwrap_or_default(),
            },
            Repr::Text(explanation) => Self {
                clause: String::new(),
                explanation,
            },
        })
    }
}

/// Approve/reject verdict with supporting clauses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub decision: DecisionOutcome,
    /// Payable amount exactly as the service wrote it (number, text or null)
    #[serde(default)]
    pub amount: Value,
    #[serde(default)]
    pub justification: Vec<Justification>,
}

/// A reasoning reply that parsed as a JSON object.
///
/// The object is kept exactly as the service wrote it, so values the typed
/// view cannot represent still reach callers. `typed` is `None` when the
/// object does not fit `T` (a missing `decision`, say).
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<T> {
    value: Value,
    typed: Option<T>,
    reply: String,
}

impl<T> Parsed<T> {
    /// The JSON object as received
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Typed view of the object, if it fits
    pub fn typed(&self) -> Option<&T> {
        self.typed.as_ref()
    }

    /// Reply text as the service sent it
    pub fn reply(&self) -> &str {
        &self.reply
    }
}

impl<T> Serialize for Parsed<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

/// Outcome of a reasoning call.
///
/// Serialises as the parsed object itself, or as `{"error", "raw"}` when
/// the reply was not JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reasoned<T> {
    Structured(Parsed<T>),
    Unparsed { error: String, raw: String },
}

impl<T> Reasoned<T> {
    /// Whether the reply parsed as a JSON object
    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Structured(_))
    }

    /// Typed view of the reply, if it parsed and fits `T`
    pub fn structured(&self) -> Option<&T> {
        match self {
            Self::Structured(parsed) => parsed.typed(),
            Self::Unparsed { .. } => None,
        }
    }

    /// The parsed JSON object, whether or not it fits `T`
    pub fn json(&self) -> Option<&Value> {
        match self {
            Self::Structured(parsed) => Some(parsed.value()),
            Self::Unparsed { .. } => None,
        }
    }

    /// The raw reply text of a fallback
    pub fn raw(&self) -> Option<&str> {
        match self {
            Self::Structured(_) => None,
            Self::Unparsed { raw, .. } => Some(raw),
        }
    }

    /// Reply text as received, parsed or not
    pub fn reply(&self) -> &str {
        match self {
            Self::Structured(parsed) => parsed.reply(),
            Self::Unparsed { raw, .. } => raw,
        }
    }
}

impl<T: Serialize> Reasoned<T> {
    /// Wrap an already typed value, rendering it as the reply text
    pub fn from_typed(typed: T) -> Self {
        let value = serde_json::to_value(&typed).unwrap_or_default();
        let reply = serde_json::to_string_pretty(&value).unwrap_or_default();
        Self::Structured(Parsed {
            value,
            typed: Some(typed),
            reply,
        })
    }
}

impl<T: DeserializeOwned> Reasoned<T> {
    /// Parse a reasoning reply.
    ///
    /// Surrounding whitespace and a Markdown code fence are removed first.
    /// Any JSON object is structured output; everything else falls back to
    /// `Unparsed`.
    pub fn from_reply(reply: &str, error: &str) -> Self {
        match serde_json::from_str::<Value>(strip_code_fence(reply)) {
            Ok(value) if value.is_object() => {
                let typed = serde_json::from_value::<T>(value.clone()).ok();
                Self::Structured(Parsed {
                    value,
                    typed,
                    reply: reply.to_string(),
                })
            }
            _ => Self::Unparsed {
                error: error.to_string(),
                raw: reply.to_string(),
            },
        }
    }
}

/// Remove a surrounding ```` ```json ... ``` ```` fence, if present
pub fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(rest) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string ("json", "JSON", ...) on the opening line
    match rest.find('\n') {
        Some(newline) if !rest[..newline].contains(['{', '[']) => rest[newline + 1..].trim(),
        _ => rest.trim(),
    }
}

/// Serde helpers that never fail on oddly typed model output
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Accept a non-negative number, or a string starting with digits
    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::Number(n)) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
                .and_then(|v| u32::try_from(v).ok()),
            Some(Value::String(s)) => {
                let digits: String = s
                    .trim()
                    .chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect();
                digits.parse().ok()
            }
            _ => None,
        })
    }

    /// Accept a string, or any other scalar rendered as text
    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Bool(b)) => Some(b.to_string()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_structured_query_lenient_fields() {
        let q: StructuredQuery = serde_json::from_value(json!({
            "age": "46",
            "gender": "M",
            "procedure": "knee surgery",
            "location": "Pune",
            "policy_duration_months": "3 months",
            "insurer": "Arogya"
        }))
        .unwrap();

        assert_eq!(q.age, Some(46));
        assert_eq!(q.policy_duration_months, Some(3));
        assert_eq!(q.location.as_deref(), Some("Pune"));
        assert_eq!(q.extra.get("insurer"), Some(&json!("Arogya")));
    }

    #[test]
    fn test_structured_query_missing_and_null_fields() {
        let q: StructuredQuery =
            serde_json::from_value(json!({"age": null, "procedure": "MRI"})).unwrap();
        assert_eq!(q.age, None);
        assert_eq!(q.gender, None);
        assert_eq!(q.procedure.as_deref(), Some("MRI"));
    }

    #[test]
    fn test_decision_outcome_case_insensitive() {
        let d: Decision = serde_json::from_value(json!({
            "decision": "APPROVED",
            "amount": 50000,
            "justification": [{"clause": "4.1", "explanation": "covered"}]
        }))
        .unwrap();
        assert_eq!(d.decision, DecisionOutcome::Approved);
        assert_eq!(d.amount, json!(50000));

        assert_eq!(
            DecisionOutcome::parse("Partially Approved"),
            DecisionOutcome::Other("Partially Approved".into())
        );
        assert_eq!(
            serde_json::to_value(DecisionOutcome::Rejected).unwrap(),
            json!("Rejected")
        );
    }

    #[test]
    fn test_justification_accepts_bare_strings() {
        let d: Decision = serde_json::from_value(json!({
            "decision": "Rejected",
            "justification": ["waiting period not met"]
        }))
        .unwrap();
        assert_eq!(d.amount, Value::Null);
        assert_eq!(d.justification[0].clause, "");
        assert_eq!(d.justification[0].explanation, "waiting period not met");
    }

    #[test]
    fn test_reasoned_parses_fenced_json() {
        let reply = "```json\n{\"age\": 46, \"gender\": \"M\"}\n```";
        let parsed = Reasoned::<StructuredQuery>::from_reply(reply, "Failed to parse query");
        assert_eq!(parsed.structured().and_then(|q| q.age), Some(46));
    }

    #[test]
    fn test_reasoned_falls_back_on_prose() {
        let reply = "Sorry, I cannot help with that.";
        let parsed = Reasoned::<StructuredQuery>::from_reply(reply, "Failed to parse query");
        assert_eq!(
            parsed,
            Reasoned::Unparsed {
                error: "Failed to parse query".into(),
                raw: reply.into()
            }
        );
        assert_eq!(
            serde_json::to_value(&parsed).unwrap(),
            json!({"error": "Failed to parse query", "raw": reply})
        );
    }

    #[test]
    fn test_reasoned_rejects_non_objects() {
        let parsed = Reasoned::<StructuredQuery>::from_reply("[1, 2]", "Failed to parse query");
        assert!(!parsed.is_structured());
        assert_eq!(parsed.raw(), Some("[1, 2]"));

        let parsed = Reasoned::<Decision>::from_reply("\"Approved\"", "Failed to parse decision");
        assert!(!parsed.is_structured());
    }

    #[test]
    fn test_reasoned_serializes_structured_value_inline() {
        let parsed = Reasoned::<Decision>::from_reply(
            r#"{"decision": "Approved", "amount": "Rs. 1,00,000", "justification": []}"#,
            "Failed to parse decision",
        );
        assert_eq!(
            serde_json::to_value(&parsed).unwrap(),
            json!({"decision": "Approved", "amount": "Rs. 1,00,000", "justification": []})
        );
    }

    #[test]
    fn test_off_schema_decision_stays_structured() {
        let reply = r#"{"decision": "Approved", "amount": 50000, "justification": "Clause 4.1 covers knee surgery"}"#;
        let parsed = Reasoned::<Decision>::from_reply(reply, "Failed to parse decision");

        assert!(parsed.is_structured());
        assert_eq!(parsed.reply(), reply);
        assert_eq!(
            serde_json::to_value(&parsed).unwrap(),
            json!({
                "decision": "Approved",
                "amount": 50000,
                "justification": "Clause 4.1 covers knee surgery"
            })
        );

        let parsed = Reasoned::<Decision>::from_reply(r#"{"verdict": "Approved"}"#, "Failed to parse decision");
        assert!(parsed.is_structured());
        assert!(parsed.structured().is_none());
        assert_eq!(parsed.json(), Some(&json!({"verdict": "Approved"})));
    }

    #[test]
    fn test_odd_query_values_survive() {
        let reply = r#"{"age": "forty-six", "gender": "M", "policy_duration_months": "three"}"#;
        let parsed = Reasoned::<StructuredQuery>::from_reply(reply, "Failed to parse query");

        let body = serde_json::to_value(&parsed).unwrap();
        assert_eq!(body["age"], "forty-six");
        assert_eq!(body["policy_duration_months"], "three");
        // The typed view cannot read them
        assert_eq!(parsed.structured().and_then(|q| q.age), None);
    }

    #[test]
    fn test_from_typed_renders_reply() {
        let parsed = Reasoned::from_typed(StructuredQuery {
            age: Some(46),
            ..StructuredQuery::default()
        });
        assert_eq!(parsed.structured().and_then(|q| q.age), Some(46));
        assert_eq!(parsed.json().unwrap()["age"], 46);
        assert!(parsed.reply().contains("\"age\": 46"));
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("  {\"a\":1}  "), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```JSON\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```{\"a\":1}```"), "{\"a\":1}");
    }
}
