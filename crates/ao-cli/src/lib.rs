//! # ao-cli
//!
//! Command-line front end of allenopt: hyperparameter search for AllenNLP
//! configurations.

pub mod search;

pub use search::{run, SearchArgs, SearchOutcome};
