//! # Engine Module
//!
//! Stateful computes that turn a [`SystemDefinition`](crate::core::models::system::SystemDefinition)
//! into per-particle forces, energies and virials.
//!
//! ## Architecture
//!
//! - **Contract** ([`compute`]) - The `ForceCompute` trait and the output buffers every compute owns
//! - **Interactions** ([`pair`], [`dihedral`]) - Host and accelerated engines sharing one semantics
//! - **Execution** ([`device`], [`autotuner`]) - The device pool, launch validation and block-size tuning
//! - **Observables** ([`thermo`]) - Temperature, pressure and the velocity-rescale thermostat
//! - **Configuration** ([`config`]) - Benchmark and tuner settings with builder validation
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//! - **Error Handling** ([`error`]) - Compute and workflow error types

pub mod autotuner;
pub(crate) mod backend;
pub mod compute;
pub mod config;
pub mod device;
pub mod dihedral;
pub mod error;
pub mod pair;
pub mod progress;
pub mod thermo;
