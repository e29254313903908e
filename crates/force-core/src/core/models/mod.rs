//! # Models
//!
//! Data containers consumed by force computes: the simulation box, per-particle state
//! addressed by stable tags, and bonded topology.

pub mod box_dim;
pub mod particles;
pub mod system;
pub mod topology;
