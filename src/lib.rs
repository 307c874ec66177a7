//! A computation graph for privacy-preserving clinical trial matching.
//!
//! A patient, a researcher and a hospital jointly compute whether the patient is eligible for a
//! trial and how well a treatment works, without revealing their inputs to each other. The actual
//! secure multi-party computation (secret sharing, garbling, networking) is the job of an external
//! MPC runtime; this crate describes *what* that runtime computes.
//!
//! ## Main Components
//!
//! * [`builder`]: The [`builder::ProgramBuilder`], which declares parties, secret inputs,
//!   expressions and party-scoped outputs.
//! * [`program`]: The resulting [`program::Program`], a serializable expression DAG.
//! * [`medical_research`]: The clinical trial program itself.
//! * [`registry`]: Zero-argument entry points through which a runtime finds programs.
//! * [`check`]: Validation of names, references, acyclicity and types.
//! * [`eval`]: A plaintext reference evaluator.
//! * [`garble`]: Lowering of each party's view to [Garble](https://garble-lang.org/) source code.
//! * [`session`]: A simulated session in which a trusted evaluator receives all inputs and
//!   delivers each party its outputs, communicating over a [`channel`].
//!
//! ## Example
//!
//! ```
//! use medtrial::{
//!     eval::{evaluate, InputValues, Value},
//!     medical_research::{medical_research, HOSPITAL, PATIENT, RESEARCHER},
//! };
//!
//! let program = medical_research();
//! let inputs = InputValues::new()
//!     .with(PATIENT, "age", 30)
//!     .with(PATIENT, "symptoms_bitmap", 5)
//!     .with(PATIENT, "medication_response", 4)
//!     .with(PATIENT, "side_effects_bitmap", 1)
//!     .with(PATIENT, "treatment_duration", 10)
//!     .with(RESEARCHER, "target_symptoms", 5)
//!     .with(RESEARCHER, "min_duration", 7)
//!     .with(RESEARCHER, "age_group_min", 18)
//!     .with(RESEARCHER, "age_group_max", 65);
//!
//! let evaluation = evaluate(&program, &inputs)?;
//! let hospital = evaluation.view(program.party_id(HOSPITAL).unwrap());
//! assert_eq!(hospital.get("patient_trial_match"), Some(Value::Integer(1)));
//! assert_eq!(hospital.get("safety_score"), Some(Value::Integer(80)));
//! assert_eq!(hospital.get("side_effects"), None);
//! # Ok::<(), medtrial::eval::EvalError>(())
//! ```
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub use garble_lang;

pub mod builder;
pub mod channel;
pub mod check;
pub mod eval;
pub mod garble;
pub mod medical_research;
pub mod program;
pub mod registry;
pub mod session;
