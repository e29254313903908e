//! # forcecore
//!
//! Per-timestep force, energy and virial evaluation for particle dynamics, with a host
//! backend and an accelerated backend that tunes its own launch configuration online.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer layout so the interaction math stays independent of
//! where and how it is executed.
//!
//! - **[`core`]: The Foundation.** Host/device buffers with access-mode discipline, the
//!   particle, box and dihedral models, neighbor enumeration, and the stateless pair and
//!   dihedral math (`pair`, `dihedral`, `params`).
//!
//! - **[`engine`]: The Compute Layer.** The [`ForceCompute`](engine::compute::ForceCompute)
//!   contract and its implementations (`PotentialPair`, `DihedralForceCompute`), the
//!   execution configuration, the launch autotuner and the thermodynamic observables.
//!
//! - **[`workflows`]: The Public API.** End-to-end procedures built from the engine, such as
//!   the host-versus-accelerated benchmark.

pub mod core;
pub mod engine;
pub mod workflows;
