//! Compiles contracts from source and runs the generated code on an in-memory chain

pub mod helpers;

mod integration_tests;
mod prop_tests;
mod unit_tests;
