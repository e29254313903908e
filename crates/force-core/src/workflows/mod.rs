//! # Workflows Module
//!
//! End-to-end procedures assembled from the engine layer.
//!
//! - **Benchmark Workflow** ([`benchmark`]) - Builds a seeded fluid with embedded dihedral
//!   chains, runs the pair and dihedral computes in every requested execution mode over the
//!   same trajectory, checks later modes against the first and reports energies, thermo
//!   observables, tuned block sizes and timings.

pub mod benchmark;
