//! One verifier's output and the pieces it is made of.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::lenient::{lenient_bool, lenient_list, lenient_text, null_as_default};

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// A verifier's top-level decision.
///
/// Anything the backend sends other than `PASS` or `FAIL` (in any case),
/// including a missing field, reads as `Pending`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
    #[default]
    Pending,
}

impl Verdict {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PASS" => Verdict::Pass,
            "FAIL" => Verdict::Fail,
            _ => Verdict::Pending,
        }
    }

    /// Whether this verdict counts towards agreement.
    pub fn is_determined(self) -> bool {
        !matches!(self, Verdict::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
            Verdict::Pending => "PENDING",
        }
    }
}

impl<'de> Deserialize<'de> for Verdict {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<Value>::deserialize(deserializer)?;
        Ok(match raw {
            Some(Value::String(s)) => Verdict::parse(&s),
            _ => Verdict::Pending,
        })
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Criteria
// ---------------------------------------------------------------------------

/// The named boolean checks every verifier answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    LeverCorrectlyImplemented,
    IntensityCorrectlyAchieved,
    UncertaintySuccessfullyInduced,
    ImplementationQualitySound,
    AnswerConstraintSatisfied,
    GroundTruthAlignment,
    RefusalClassCorrect,
}

impl Criterion {
    /// Display order of the truth table.
    pub const ALL: [Criterion; 7] = [
        Criterion::LeverCorrectlyImplemented,
        Criterion::IntensityCorrectlyAchieved,
        Criterion::UncertaintySuccessfullyInduced,
        Criterion::ImplementationQualitySound,
        Criterion::AnswerConstraintSatisfied,
        Criterion::GroundTruthAlignment,
        Criterion::RefusalClassCorrect,
    ];

    /// Wire key inside `verification_response`.
    pub fn key(self) -> &'static str {
        match self {
            Criterion::LeverCorrectlyImplemented => "lever_correctly_implemented",
            Criterion::IntensityCorrectlyAchieved => "intensity_correctly_achieved",
            Criterion::UncertaintySuccessfullyInduced => "uncertainty_successfully_induced",
            Criterion::ImplementationQualitySound => "implementation_quality_sound",
            Criterion::AnswerConstraintSatisfied => "answer_constraint_satisfied",
            Criterion::GroundTruthAlignment => "ground_truth_alignment",
            Criterion::RefusalClassCorrect => "refusal_class_correct",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Criterion::LeverCorrectlyImplemented => "Lever correct",
            Criterion::IntensityCorrectlyAchieved => "Intensity correct",
            Criterion::UncertaintySuccessfullyInduced => "Uncertainty induced",
            Criterion::ImplementationQualitySound => "Implementation quality",
            Criterion::AnswerConstraintSatisfied => "Constraint satisfied",
            Criterion::GroundTruthAlignment => "Ground-truth aligned",
            Criterion::RefusalClassCorrect => "Refusal class correct",
        }
    }
}

// ---------------------------------------------------------------------------
// Judgement
// ---------------------------------------------------------------------------

/// The structured judgement nested under `verification_response`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Judgement {
    #[serde(default)]
    pub verification_result: Verdict,

    #[serde(default, deserialize_with = "lenient_bool", skip_serializing_if = "Option::is_none")]
    pub lever_correctly_implemented: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool", skip_serializing_if = "Option::is_none")]
    pub intensity_correctly_achieved: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool", skip_serializing_if = "Option::is_none")]
    pub uncertainty_successfully_induced: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool", skip_serializing_if = "Option::is_none")]
    pub implementation_quality_sound: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool", skip_serializing_if = "Option::is_none")]
    pub answer_constraint_satisfied: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool", skip_serializing_if = "Option::is_none")]
    pub ground_truth_alignment: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool", skip_serializing_if = "Option::is_none")]
    pub refusal_class_correct: Option<bool>,

    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub predicted_rag_behavior: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub actual_intensity_observed: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub identified_issues: Vec<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub refusal_reasoning_analysis: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub constraint_analysis: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub final_ground_truth_label: Option<String>,

    #[serde(default, deserialize_with = "lenient_bool", skip_serializing_if = "Option::is_none")]
    pub parsing_successful: Option<bool>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn object_judgement<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Judgement>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        Some(value @ Value::Object(_)) => {
            serde_json::from_value(value).map(Some).map_err(serde::de::Error::custom)
        }
        _ => Ok(None),
    }
}

impl Judgement {
    pub fn criterion(&self, criterion: Criterion) -> Option<bool> {
        match criterion {
            Criterion::LeverCorrectlyImplemented => self.lever_correctly_implemented,
            Criterion::IntensityCorrectlyAchieved => self.intensity_correctly_achieved,
            Criterion::UncertaintySuccessfullyInduced => self.uncertainty_successfully_induced,
            Criterion::ImplementationQualitySound => self.implementation_quality_sound,
            Criterion::AnswerConstraintSatisfied => self.answer_constraint_satisfied,
            Criterion::GroundTruthAlignment => self.ground_truth_alignment,
            Criterion::RefusalClassCorrect => self.refusal_class_correct,
        }
    }
}

// ---------------------------------------------------------------------------
// Verifier identity
// ---------------------------------------------------------------------------

const PALETTE: [&str; 6] = ["blue", "green", "orange", "purple", "pink", "teal"];

/// Display position and color assigned to a verifier when its result is
/// inserted into a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VerifierSlot {
    pub index: usize,
    pub color: &'static str,
}

impl VerifierSlot {
    pub fn for_index(index: usize) -> Self {
        Self {
            index,
            color: PALETTE[index % PALETTE.len()],
        }
    }
}

/// A verifier as advertised by the backend's configuration endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierDescriptor {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub provider: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub model_id: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub display_name: Option<String>,
}

impl VerifierDescriptor {
    /// Whether `result` was produced by this verifier.
    ///
    /// The stream carries the provider-qualified model string, so a suffix
    /// match on the bare model id is accepted alongside the configured name.
    pub fn matches(&self, result: &VerifierResult) -> bool {
        if !self.name.is_empty()
            && result.verification_model_name.as_deref() == Some(self.name.as_str())
        {
            return true;
        }
        !self.model_id.is_empty()
            && (result.verification_model == self.model_id
                || result.verification_model.ends_with(&format!("/{}", self.model_id)))
    }

    pub fn label(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ if !self.name.is_empty() => self.name.as_str(),
            _ => self.model_id.as_str(),
        }
    }
}

/// Pick the slot for a result about to be appended.
///
/// Roster position wins when the verifier is configured; otherwise the slot
/// follows arrival order.
pub fn assign_slot(
    roster: &[VerifierDescriptor],
    result: &VerifierResult,
    arrival_index: usize,
) -> VerifierSlot {
    let index = roster
        .iter()
        .position(|d| d.matches(result))
        .unwrap_or(arrival_index);
    VerifierSlot::for_index(index)
}

// ---------------------------------------------------------------------------
// VerifierResult
// ---------------------------------------------------------------------------

/// One verifier's output, exactly as streamed by the backend.
///
/// Never mutated after it enters a session; the slot is assigned just before
/// insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifierResult {
    pub verification_model: String,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub verification_model_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub verification_display_name: Option<String>,

    /// Whether the verifier's own output parsed. Absent on hand-written
    /// captures, in which case it is unknown rather than false.
    #[serde(default, deserialize_with = "lenient_bool", skip_serializing_if = "Option::is_none")]
    pub verification_successful: Option<bool>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub verification_error: Option<String>,

    /// A response that is not an object at all reads as no judgement.
    #[serde(default, deserialize_with = "object_judgement", skip_serializing_if = "Option::is_none")]
    pub verification_response: Option<Judgement>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,

    #[serde(skip)]
    pub slot: VerifierSlot,
}

impl VerifierResult {
    pub fn new(model: impl Into<String>, judgement: Option<Judgement>) -> Self {
        Self {
            verification_model: model.into(),
            verification_model_name: None,
            verification_display_name: None,
            verification_successful: None,
            verification_error: None,
            verification_response: judgement,
            extra: Map::new(),
            slot: VerifierSlot::default(),
        }
    }

    pub fn verdict(&self) -> Verdict {
        self.verification_response
            .as_ref()
            .map(|j| j.verification_result)
            .unwrap_or_default()
    }

    pub fn judgement(&self) -> Option<&Judgement> {
        self.verification_response.as_ref()
    }

    /// `false` only when the backend explicitly said parsing failed.
    pub fn parsed_ok(&self) -> bool {
        self.verification_successful.unwrap_or(true)
    }

    /// Display name, then configured name, then raw model id.
    pub fn label(&self) -> &str {
        [
            self.verification_display_name.as_deref(),
            self.verification_model_name.as_deref(),
        ]
        .into_iter()
        .flatten()
        .find(|s| !s.is_empty())
        .unwrap_or(self.verification_model.as_str())
    }

    pub(crate) fn with_slot(mut self, slot: VerifierSlot) -> Self {
        self.slot = slot;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn verdict_parsing_is_case_insensitive() {
        assert_eq!(Verdict::parse("pass"), Verdict::Pass);
        assert_eq!(Verdict::parse(" FAIL "), Verdict::Fail);
        assert_eq!(Verdict::parse("unsure"), Verdict::Pending);

        let v: Verdict = serde_json::from_value(json!(null)).unwrap();
        assert_eq!(v, Verdict::Pending);
        let v: Verdict = serde_json::from_value(json!(3)).unwrap();
        assert_eq!(v, Verdict::Pending);
    }

    #[test]
    fn full_backend_result_deserializes() {
        let raw = json!({
            "verification_model": "bedrock/us.anthropic.claude-opus-4-1-20250805-v1:0",
            "verification_model_name": "verifier_a",
            "verification_display_name": "Judge A",
            "verification_successful": true,
            "verification_response": {
                "verification_result": "FAIL",
                "lever_correctly_implemented": true,
                "intensity_correctly_achieved": "no",
                "uncertainty_successfully_induced": "maybe",
                "predicted_rag_behavior": "REFUSE_AMBIGUOUS_QUERY",
                "identified_issues": ["context still names the answer", "lever too weak"],
                "final_ground_truth_label": "ANSWER_CORRECTLY",
                "parsing_successful": true,
                "confidence": 0.4
            }
        });

        let result: VerifierResult = serde_json::from_value(raw).unwrap();
        assert_eq!(result.verdict(), Verdict::Fail);
        assert_eq!(result.label(), "Judge A");
        assert!(result.parsed_ok());

        let j = result.judgement().unwrap();
        assert_eq!(j.criterion(Criterion::LeverCorrectlyImplemented), Some(true));
        assert_eq!(j.criterion(Criterion::IntensityCorrectlyAchieved), Some(false));
        assert_eq!(j.criterion(Criterion::UncertaintySuccessfullyInduced), None);
        assert_eq!(j.identified_issues.len(), 2);
        assert_eq!(j.extra.get("confidence"), Some(&json!(0.4)));
    }

    #[test]
    fn failed_verifier_has_pending_verdict() {
        let raw = json!({
            "verification_model": "vertex_ai/gemini-2.5-pro",
            "verification_successful": false,
            "verification_error": "Original generation failed"
        });
        let result: VerifierResult = serde_json::from_value(raw).unwrap();
        assert_eq!(result.verdict(), Verdict::Pending);
        assert!(!result.parsed_ok());
        assert!(result.judgement().is_none());
        assert_eq!(result.label(), "vertex_ai/gemini-2.5-pro");
    }

    #[test]
    fn sloppy_judgement_fields_do_not_reject_the_result() {
        let raw = json!({
            "verification_model": "m1",
            "verification_error": null,
            "verification_response": {
                "verification_result": "FAIL",
                "identified_issues": null,
                "predicted_rag_behavior": ["REFUSE", "ANSWER"],
                "constraint_analysis": {"ok": false},
                "parsing_successful": "true"
            }
        });
        let result: VerifierResult = serde_json::from_value(raw).unwrap();
        let j = result.judgement().unwrap();
        assert_eq!(j.verification_result, Verdict::Fail);
        assert!(j.identified_issues.is_empty());
        assert_eq!(j.predicted_rag_behavior.as_deref(), Some(r#"["REFUSE","ANSWER"]"#));
        assert_eq!(j.constraint_analysis.as_deref(), Some(r#"{"ok":false}"#));
        assert_eq!(j.parsing_successful, Some(true));
    }

    #[test]
    fn non_object_response_reads_as_no_judgement() {
        let raw = json!({
            "verification_model": "m2",
            "verification_response": "PASS, looks fine"
        });
        let result: VerifierResult = serde_json::from_value(raw).unwrap();
        assert!(result.judgement().is_none());
        assert_eq!(result.verdict(), Verdict::Pending);
    }

    #[test]
    fn roster_entry_with_null_fields_still_loads() {
        let roster: Vec<VerifierDescriptor> = serde_json::from_value(json!([
            {"name": null, "provider": "openai", "model_id": "gpt-4o", "display_name": null},
            {"name": "judge_b", "provider": null, "model_id": null}
        ]))
        .unwrap();
        assert_eq!(roster[0].name, "");
        assert_eq!(roster[0].label(), "gpt-4o");
        assert_eq!(roster[1].label(), "judge_b");
        assert_eq!(roster[1].model_id, "");
    }

    #[test]
    fn slot_is_not_part_of_the_wire_format() {
        let result = VerifierResult::new("m1", None).with_slot(VerifierSlot::for_index(2));
        let wire = serde_json::to_value(&result).unwrap();
        assert!(wire.get("slot").is_none());
        assert_eq!(result.slot.color, "orange");
    }

    #[test]
    fn roster_position_wins_over_arrival() {
        let roster = vec![
            VerifierDescriptor {
                name: "verifier_a".into(),
                model_id: "model-a".into(),
                ..Default::default()
            },
            VerifierDescriptor {
                name: "verifier_b".into(),
                model_id: "us.deepseek.r1-v1:0".into(),
                ..Default::default()
            },
        ];

        let late = VerifierResult::new("bedrock/converse/us.deepseek.r1-v1:0", None);
        assert_eq!(assign_slot(&roster, &late, 0).index, 1);

        let mut named = VerifierResult::new("something-else", None);
        named.verification_model_name = Some("verifier_a".into());
        assert_eq!(assign_slot(&roster, &named, 1).index, 0);

        let unknown = VerifierResult::new("extra-model", None);
        assert_eq!(assign_slot(&roster, &unknown, 3).index, 3);
    }
}
