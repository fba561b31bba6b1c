#![forbid(unsafe_code)]

//! Shared fixtures and proptest strategies for the conformance suite.

pub mod fixtures;
pub mod strategies;
