//! Eval case type: one reasoning query plus the risk terminals it should surface.

use crate::engine::ReasoningQuery;
use serde::Deserialize;

/// Single evaluation case, read from a JSON array.
///
/// ```json
/// { "name": "tsmc outage", "category": "semiconductors",
///   "seed_entity_id": "tsmc", "max_hops": 3,
///   "expected_terminals": ["fab_hsinchu", "port_kaohsiung"] }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct EvalCase {
    /// Label for reporting; defaults to the seed id.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(flatten)]
    pub query: ReasoningQuery,
    /// Risk description embedded when the query carries no vector.
    #[serde(default)]
    pub query_text: Option<String>,
    /// Terminals a good ranking places near the top.
    #[serde(default)]
    pub expected_terminals: Vec<String>,
}

impl EvalCase {
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.query.seed_entity_id)
    }

    /// A terminal counts when it is listed, compared case-insensitively.
    /// Cases without expectations never match (they would inflate MRR).
    pub fn is_relevant(&self, terminal: &str) -> bool {
        self.expected_terminals
            .iter()
            .any(|expected| expected.eq_ignore_ascii_case(terminal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_parses_query_fields() {
        let case: EvalCase = serde_json::from_str(
            r#"{"name": "port strike", "seed_entity_id": "supplier_1", "max_hops": 2,
                "expected_terminals": ["Transport_B"]}"#,
        )
        .unwrap();
        assert_eq!(case.label(), "port strike");
        assert_eq!(case.query.seed_entity_id, "supplier_1");
        assert_eq!(case.query.max_hops, Some(2));
        assert!(case.is_relevant("transport_b"));
        assert!(!case.is_relevant("facility_A"));
    }

    #[test]
    fn test_case_without_expectations_never_matches() {
        let case: EvalCase = serde_json::from_str(r#"{"seed_entity_id": "s"}"#).unwrap();
        assert_eq!(case.label(), "s");
        assert!(!case.is_relevant("s"));
    }
}
