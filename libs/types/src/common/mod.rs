//! Identifier, error and fixed-point building blocks

pub mod errors;
pub mod fixed_point;
pub mod identifiers;
