use std::hint::black_box;

use criterion::Criterion;
use medtrial::{
    builder::ProgramBuilder,
    eval::{InputValues, evaluate},
    garble::lower_all,
    medical_research::{PATIENT, RESEARCHER, medical_research},
    program::Program,
    session::{SessionConfig, simulate_session},
};

pub fn program_benchmarks(c: &mut Criterion) {
    let mut g = c.benchmark_group("medical_research");
    let prg = medical_research();
    let inputs = InputValues::new()
        .with(PATIENT, "age", 30)
        .with(PATIENT, "symptoms_bitmap", 5)
        .with(PATIENT, "medication_response", 4)
        .with(PATIENT, "side_effects_bitmap", 1)
        .with(PATIENT, "treatment_duration", 10)
        .with(RESEARCHER, "target_symptoms", 5)
        .with(RESEARCHER, "min_duration", 7)
        .with(RESEARCHER, "age_group_min", 18)
        .with(RESEARCHER, "age_group_max", 65);

    g.bench_function("build", |b| b.iter(|| black_box(medical_research())));
    g.bench_function("check", |b| b.iter(|| black_box(&prg).check()));
    g.bench_function("evaluate", |b| {
        b.iter(|| evaluate(black_box(&prg), black_box(&inputs)))
    });
    g.bench_function("lower to garble", |b| b.iter(|| lower_all(black_box(&prg))));
    g.bench_function("simulated session", |b| {
        let config = SessionConfig::default();
        b.iter(|| simulate_session(black_box(&prg), black_box(&inputs), &config))
    });
    g.finish();

    let mut g = c.benchmark_group("chain");
    let length = 10_000;
    let chain = add_chain(length);
    let inputs = InputValues::new().with("p", "x", 1);
    g.throughput(criterion::Throughput::Elements(length as u64));
    g.bench_function(format!("{length} chained additions"), |b| {
        b.iter(|| evaluate(black_box(&chain), black_box(&inputs)))
    });
    g.finish();
}

/// A long chain of additions, to measure per-node costs.
fn add_chain(length: usize) -> Program {
    let mut b = ProgramBuilder::new();
    let p = b.party("p");
    let mut acc = b.secret_integer("x", p);
    let one = b.integer(1);
    for _ in 0..length {
        acc = b.add(acc, one);
    }
    b.output(acc, "sum", p);
    b.build()
}
