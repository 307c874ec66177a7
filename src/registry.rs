//! The programs this crate provides, by name.
//!
//! A runtime registers a program through its zero-argument entry point, which returns the complete
//! graph including the ordered output declarations.

use crate::{
    eval::InputValues,
    medical_research::{RangeWarning, check_input_ranges, medical_research},
    program::Program,
};

/// A zero-argument entry point producing a program.
pub type EntryPoint = fn() -> Program;

/// Reports inputs outside of the scales a program is designed for.
pub type InputCheck = fn(&InputValues) -> Vec<RangeWarning>;

/// A program together with the checks that belong to it.
#[derive(Debug, Clone, Copy)]
pub struct Registration {
    /// The name under which the program is registered.
    pub name: &'static str,
    /// Builds the program.
    pub entry: EntryPoint,
    /// Checks inputs before they are submitted.
    pub input_check: InputCheck,
}

/// All registered programs.
pub const PROGRAMS: &[Registration] = &[Registration {
    name: "medical_research",
    entry: medical_research,
    input_check: check_input_ranges,
}];

/// The registration of the program with the given name.
pub fn lookup(name: &str) -> Option<&'static Registration> {
    PROGRAMS.iter().find(|registered| registered.name == name)
}

/// The names of all registered programs.
pub fn names() -> impl Iterator<Item = &'static str> {
    PROGRAMS.iter().map(|registered| registered.name)
}
