//! Clinical trial matching between a patient, a researcher and a hospital.
//!
//! The patient contributes their medical data, the researcher the trial criteria. Nobody learns
//! the other side's inputs. Each party only receives the derived values relevant to its role:
//!
//! | party      | outputs                                                                        |
//! |------------|--------------------------------------------------------------------------------|
//! | patient    | `eligible_for_trial`, `treatment_effectiveness`                                |
//! | researcher | `patient_eligibility`, `patient_response_score`, `medication_effectiveness`, `side_effects` |
//! | hospital   | `patient_trial_match`, `safety_score`                                          |
//!
//! The raw `side_effects_bitmap` is revealed to the researcher only.
//!
//! ## Input ranges
//!
//! The scores assume that `medication_response` and `side_effects_bitmap` are on a 0 to 5 scale
//! (see [`MEDICATION_RESPONSE_RANGE`] and [`SIDE_EFFECTS_RANGE`]). Values outside of these ranges
//! are not rejected and not clamped: a `side_effects_bitmap` of 6 yields a safety score of -20.
//! Use [`check_input_ranges`] to detect such inputs before running the computation.

use std::{fmt, ops::RangeInclusive};

use tracing::warn;

use crate::{
    builder::ProgramBuilder,
    eval::InputValues,
    program::{NodeId, Program},
};

/// The party supplying the medical data.
pub const PATIENT: &str = "Party1";
/// The party supplying the trial criteria.
pub const RESEARCHER: &str = "Party2";
/// The party learning about the match and the safety of the treatment.
pub const HOSPITAL: &str = "Party3";

/// The expected scale of `medication_response`.
pub const MEDICATION_RESPONSE_RANGE: RangeInclusive<i64> = 0..=5;
/// The expected scale of `side_effects_bitmap`.
pub const SIDE_EFFECTS_RANGE: RangeInclusive<i64> = 0..=5;

/// The intermediate results of the computation, for inspecting an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedNodes {
    /// 1 if the patient's age is within the researcher's age group, else 0.
    pub age_match: NodeId,
    /// 1 if the symptoms match the target symptoms exactly, else 0.
    pub symptoms_match: NodeId,
    /// 1 if the treatment lasted at least the minimum duration, else 0.
    pub duration_match: NodeId,
    /// 1 if all three criteria hold, else 0.
    pub trial_match: NodeId,
    /// The medication response on a 0 to 100 scale.
    pub effectiveness: NodeId,
    /// 100 minus 20 per side effect.
    pub side_effect_score: NodeId,
    /// 60% effectiveness plus 40% safety.
    pub trial_score: NodeId,
}

/// Builds the program. This is the entry point a runtime registers.
pub fn medical_research() -> Program {
    medical_research_with_nodes().0
}

/// Builds the program and returns the handles of its intermediate results.
pub fn medical_research_with_nodes() -> (Program, DerivedNodes) {
    let mut b = ProgramBuilder::new();
    let patient = b.party(PATIENT);
    let researcher = b.party(RESEARCHER);
    let hospital = b.party(HOSPITAL);

    let age = b.secret_integer("age", patient);
    let symptoms = b.secret_integer("symptoms_bitmap", patient);
    let medication_response = b.secret_integer("medication_response", patient);
    let side_effects = b.secret_integer("side_effects_bitmap", patient);
    let treatment_duration = b.secret_integer("treatment_duration", patient);

    let target_symptoms = b.secret_integer("target_symptoms", researcher);
    let min_duration = b.secret_integer("min_duration", researcher);
    let age_group_min = b.secret_integer("age_group_min", researcher);
    let age_group_max = b.secret_integer("age_group_max", researcher);

    let hundred = b.integer(100);

    let old_enough = b.greater_or_equal(age, age_group_min);
    let young_enough = b.less_or_equal(age, age_group_max);
    let age_in_range = b.and(old_enough, young_enough);
    let age_match = b.to_indicator(age_in_range);

    let same_symptoms = b.equals(symptoms, target_symptoms);
    let symptoms_match = b.to_indicator(same_symptoms);

    let long_enough = b.greater_or_equal(treatment_duration, min_duration);
    let duration_match = b.to_indicator(long_enough);

    // scaled up before dividing, to keep integer precision
    let five = b.integer(5);
    let response_scaled = b.mul(medication_response, hundred);
    let effectiveness = b.div(response_scaled, five);

    let twenty = b.integer(20);
    let penalty = b.mul(side_effects, twenty);
    let side_effect_score = b.sub(hundred, penalty);

    let three = b.integer(3);
    let partial_sum = b.add(age_match, symptoms_match);
    let match_sum = b.add(partial_sum, duration_match);
    let all_criteria = b.equals(match_sum, three);
    let trial_match = b.to_indicator(all_criteria);

    let sixty = b.integer(60);
    let forty = b.integer(40);
    let weighted_effectiveness = b.mul(effectiveness, sixty);
    let effectiveness_part = b.div(weighted_effectiveness, hundred);
    let weighted_safety = b.mul(side_effect_score, forty);
    let safety_part = b.div(weighted_safety, hundred);
    let trial_score = b.add(effectiveness_part, safety_part);

    b.output(trial_match, "eligible_for_trial", patient);
    b.output(effectiveness, "treatment_effectiveness", patient);

    b.output(trial_match, "patient_eligibility", researcher);
    b.output(trial_score, "patient_response_score", researcher);
    b.output(effectiveness, "medication_effectiveness", researcher);
    b.output(side_effects, "side_effects", researcher);

    b.output(trial_match, "patient_trial_match", hospital);
    b.output(side_effect_score, "safety_score", hospital);

    let derived = DerivedNodes {
        age_match,
        symptoms_match,
        duration_match,
        trial_match,
        effectiveness,
        side_effect_score,
        trial_score,
    };
    (b.build(), derived)
}

/// An input outside of the scale the scores are designed for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeWarning {
    /// The name of the input.
    pub input: &'static str,
    /// The supplied value.
    pub value: i64,
    /// The expected range.
    pub expected: RangeInclusive<i64>,
}

impl fmt::Display for RangeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} = {} is outside of the expected range {}..={}",
            self.input,
            self.value,
            self.expected.start(),
            self.expected.end()
        )
    }
}

/// Reports patient inputs outside of the expected scales. Missing inputs are ignored.
pub fn check_input_ranges(inputs: &InputValues) -> Vec<RangeWarning> {
    let mut warnings = vec![];
    for (input, expected) in [
        ("medication_response", MEDICATION_RESPONSE_RANGE),
        ("side_effects_bitmap", SIDE_EFFECTS_RANGE),
    ] {
        let Some(value) = inputs.get(PATIENT, input) else {
            continue;
        };
        if !expected.contains(&value) {
            let warning = RangeWarning {
                input,
                value,
                expected,
            };
            warn!("{warning}");
            warnings.push(warning);
        }
    }
    warnings
}
