//! # Force Field
//!
//! Stateless interaction math shared by the host and accelerated engines.
//!
//! - [`pair`]: radial pair potentials, the cutoff shift policy and the overlap guard.
//! - [`dihedral`]: periodic torsion energy and the four-body force distribution.
//! - [`params`]: symmetric per-type-pair tables and the TOML coefficient file.
//! - [`term`]: per-particle force/energy records and the virial tensor.

pub mod dihedral;
pub mod pair;
pub mod params;
pub mod term;
