use medtrial::{
    builder::ProgramBuilder,
    eval::{InputValues, Value, evaluate},
    garble::{GarbleProgram, input_literal, lower, lower_all},
    garble_lang::literal::Literal,
    medical_research::{HOSPITAL, PATIENT, RESEARCHER, medical_research},
    program::{PartyId, Program},
};

fn scenario() -> InputValues {
    InputValues::new()
        .with(PATIENT, "age", 30)
        .with(PATIENT, "symptoms_bitmap", 5)
        .with(PATIENT, "medication_response", 4)
        .with(PATIENT, "side_effects_bitmap", 1)
        .with(PATIENT, "treatment_duration", 10)
        .with(RESEARCHER, "target_symptoms", 5)
        .with(RESEARCHER, "min_duration", 7)
        .with(RESEARCHER, "age_group_min", 18)
        .with(RESEARCHER, "age_group_max", 65)
}

#[test]
fn every_view_is_lowered() {
    let prg = medical_research();
    let views = lower_all(&prg).unwrap();
    let names: Vec<_> = views.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec![PATIENT, RESEARCHER, HOSPITAL]);
    for (_, view) in &views {
        // the hospital has no inputs and is therefore not a parameter
        assert_eq!(view.input_parties, vec![PartyId(0), PartyId(1)]);
    }
}

#[test]
fn hospital_view_hides_the_researcher_outputs() {
    let prg = medical_research();
    let hospital = prg.party_id(HOSPITAL).unwrap();
    let lowered = lower(&prg, hospital).unwrap();
    assert_eq!(lowered.outputs, vec!["patient_trial_match", "safety_score"]);
    assert!(lowered.source.starts_with("// outputs of 'Party3'\n"));
    let params = "party_0: (i64, i64, i64, i64, i64), party_1: (i64, i64, i64, i64)";
    assert!(
        lowered
            .source
            .contains(&format!("pub fn main({params}) -> (i64, i64) {{"))
    );
    // the effectiveness score does not contribute to the hospital's outputs
    assert!(!lowered.source.contains("/ "));
}

#[test]
fn lowered_views_compile() {
    let prg = medical_research();
    let inputs = scenario();
    for (party, view) in lower_all(&prg).unwrap() {
        let compiled = view
            .compile()
            .unwrap_or_else(|e| panic!("view of {party} does not compile: {e}"));
        for (i, p) in view.input_parties.iter().enumerate() {
            let literal = input_literal(&prg, *p, &inputs).unwrap();
            assert!(
                compiled.parse_arg(i, &literal).is_ok(),
                "argument {i} of {party} rejected: {literal}"
            );
        }
    }
}

#[test]
fn argument_literals() {
    let prg = medical_research();
    let inputs = scenario();
    assert_eq!(
        input_literal(&prg, PartyId(0), &inputs).unwrap(),
        "(30i64, 5i64, 4i64, 1i64, 10i64)"
    );
    assert_eq!(
        input_literal(&prg, PartyId(1), &inputs).unwrap(),
        "(5i64, 7i64, 18i64, 65i64)"
    );
}

fn to_value(literal: &Literal) -> Value {
    match literal {
        Literal::NumSigned(n, _) => Value::Integer(*n),
        Literal::True => Value::Boolean(true),
        Literal::False => Value::Boolean(false),
        other => panic!("unexpected output literal {other}"),
    }
}

/// Runs the lowered view in the Garble evaluator, returning its outputs in order.
fn run_view(prg: &Program, view: &GarbleProgram, inputs: &InputValues) -> Vec<Value> {
    let compiled = view.compile().unwrap();
    let mut eval = compiled.evaluator();
    for party in view.input_parties.iter() {
        let literal = input_literal(prg, *party, inputs).unwrap();
        eval.parse_literal(&literal).unwrap();
    }
    let output = eval.run().unwrap().into_literal().unwrap();
    match output {
        Literal::Tuple(fields) if view.outputs.len() > 1 => fields.iter().map(to_value).collect(),
        single => vec![to_value(&single)],
    }
}

/// Checks that every lowered view computes exactly the outputs the plaintext evaluator delivers.
fn assert_views_agree(prg: &Program, inputs: &InputValues) {
    let evaluation = evaluate(prg, inputs).unwrap();
    for (party, view) in lower_all(prg).unwrap() {
        let expected = evaluation.view(prg.party_id(&party).unwrap());
        assert_eq!(
            view.outputs,
            expected.names().collect::<Vec<_>>(),
            "output order of {party}"
        );
        let expected: Vec<_> = expected.0.iter().map(|(_, value)| *value).collect();
        assert_eq!(run_view(prg, &view, inputs), expected, "outputs of {party}");
    }
}

#[test]
fn lowered_views_match_plaintext_evaluation() {
    let prg = medical_research();
    assert_views_agree(&prg, &scenario());
    // out of range: negative safety score
    assert_views_agree(
        &prg,
        &scenario()
            .with(PATIENT, "medication_response", 3)
            .with(PATIENT, "side_effects_bitmap", 6),
    );
    assert_views_agree(&prg, &scenario().with(RESEARCHER, "age_group_max", 29));
    assert_views_agree(&prg, &scenario().with(PATIENT, "symptoms_bitmap", 7));
    assert_views_agree(&prg, &scenario().with(PATIENT, "treatment_duration", 6));
}

#[test]
fn negative_scores_in_garble() {
    let prg = medical_research();
    let inputs = scenario()
        .with(PATIENT, "medication_response", 3)
        .with(PATIENT, "side_effects_bitmap", 6);
    let researcher = lower(&prg, prg.party_id(RESEARCHER).unwrap()).unwrap();
    assert_eq!(
        run_view(&prg, &researcher, &inputs),
        vec![
            Value::Integer(1),
            Value::Integer(28),
            Value::Integer(60),
            Value::Integer(6)
        ]
    );
    let hospital = lower(&prg, prg.party_id(HOSPITAL).unwrap()).unwrap();
    assert_eq!(
        run_view(&prg, &hospital, &inputs),
        vec![Value::Integer(1), Value::Integer(-20)]
    );
}

#[test]
fn garble_division_truncates_like_the_evaluator() {
    let mut b = ProgramBuilder::new();
    let a = b.party("a");
    let x = b.secret_integer("x", a);
    let y = b.secret_integer("y", a);
    let quot = b.div(x, y);
    let ge = b.greater_or_equal(quot, y);
    b.output(quot, "quot", a);
    b.output(ge, "quot_at_least_y", a);
    let prg = b.build();
    for (x, y) in [(-7, 2), (7, -2), (-800, 100), (1, 3)] {
        let inputs = InputValues::new().with("a", "x", x).with("a", "y", y);
        assert_views_agree(&prg, &inputs);
    }
    let view = lower(&prg, a).unwrap();
    let inputs = InputValues::new().with("a", "x", -7).with("a", "y", 2);
    assert_eq!(
        run_view(&prg, &view, &inputs),
        vec![Value::Integer(-3), Value::Boolean(false)]
    );
}
