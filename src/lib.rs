//! Discrete-time simulation of a plague spreading through a population of
//! human agents exposed to a fixed population of infected vectors.
//!
//! [`engine::Engine`] owns the population, the vectors and the round history.
//! Presentation layers only read the snapshots it exposes.

pub mod config;
pub mod engine;
pub mod model;
pub mod runner;
pub mod stats;
