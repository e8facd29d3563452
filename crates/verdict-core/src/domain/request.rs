//! The perturbation under test, as produced by the generator.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::lenient::{lenient_text, null_as_default};

/// Reference answers attached to the original question.
///
/// The generator emits a list, but older captures carry a single string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answers {
    List(Vec<String>),
    Text(String),
}

impl Default for Answers {
    fn default() -> Self {
        Answers::List(Vec::new())
    }
}

impl Answers {
    pub fn is_empty(&self) -> bool {
        match self {
            Answers::List(items) => items.is_empty(),
            Answers::Text(text) => text.is_empty(),
        }
    }
}

/// A generated perturbation plus its provenance.
///
/// Treated as immutable once a session starts: the controller keeps its own
/// copy and only ever serializes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationRequest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub original_query: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub original_context: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub original_answers: Answers,

    #[serde(default, deserialize_with = "null_as_default")]
    pub perturbation_class: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub intensity: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub perturbed_query: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub perturbed_context: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub lever_selected: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub implementation_reasoning: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub intensity_achieved: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_constraint_satisfied: Option<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub expected_rag_behavior: String,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub ground_truth_label: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub parsing_successful: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub generation_successful: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub generator_model: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub generator_display_name: String,

    /// Generator fields this client does not model, kept for the save call.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VerificationRequest {
    /// Short human label used in logs and the CLI header.
    pub fn label(&self) -> String {
        match (self.perturbation_class.is_empty(), self.intensity.is_empty()) {
            (false, false) => format!("{} / {}", self.perturbation_class, self.intensity),
            (false, true) => self.perturbation_class.clone(),
            _ => "unclassified perturbation".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_generator_fields_survive_reserialization() {
        let raw = json!({
            "perturbed_query": "When did the bridge open?",
            "perturbation_class": "P-Ambiguity",
            "intensity": "MEDIUM",
            "original_answers": ["1932"],
            "generation_successful": true,
            "lever_rationale": "two bridges share the name"
        });

        let request: VerificationRequest = serde_json::from_value(raw).unwrap();
        assert_eq!(request.extra.get("lever_rationale"), Some(&json!("two bridges share the name")));
        assert_eq!(request.original_answers, Answers::List(vec!["1932".into()]));

        let back = serde_json::to_value(&request).unwrap();
        assert_eq!(back["lever_rationale"], "two bridges share the name");
        assert_eq!(back["perturbation_class"], "P-Ambiguity");
    }

    #[test]
    fn single_string_answers_are_accepted() {
        let request: VerificationRequest =
            serde_json::from_value(json!({ "original_answers": "Paris" })).unwrap();
        assert_eq!(request.original_answers, Answers::Text("Paris".into()));
        assert!(!request.original_answers.is_empty());
    }

    #[test]
    fn null_generator_fields_read_as_empty() {
        let request: VerificationRequest = serde_json::from_str(
            r#"{"perturbed_query":"q","intensity_achieved":null,"original_answers":null,
                "generation_successful":null,"ground_truth_label":null,"lever_selected":null}"#,
        )
        .unwrap();
        assert_eq!(request.perturbed_query, "q");
        assert_eq!(request.intensity_achieved, "");
        assert!(request.original_answers.is_empty());
        assert!(!request.generation_successful);
        assert_eq!(request.ground_truth_label, None);
        assert!(request.extra.is_empty());
    }

    #[test]
    fn label_prefers_class_and_intensity() {
        let mut request = VerificationRequest {
            perturbation_class: "P-FalsePremise".into(),
            intensity: "HIGH".into(),
            ..Default::default()
        };
        assert_eq!(request.label(), "P-FalsePremise / HIGH");

        request.intensity.clear();
        assert_eq!(request.label(), "P-FalsePremise");

        request.perturbation_class.clear();
        assert_eq!(request.label(), "unclassified perturbation");
    }
}
