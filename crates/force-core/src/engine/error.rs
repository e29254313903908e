use thiserror::Error;

use super::autotuner::TunerError;
use super::config::ConfigError;
use super::device::DeviceError;
use crate::core::buffer::BufferError;
use crate::core::forcefield::params::{ParamError, ParamLoadError};
use crate::core::models::particles::ParticleError;
use crate::core::models::topology::TopologyError;

/// Failures of a single force compute.
#[derive(Debug, Error)]
pub enum ForceError {
    #[error("Outputs of '{0}' were read before the first compute")]
    NotComputed(String),

    #[error("Compute '{compute}' has no parameters for type pair ({a}, {b})")]
    MissingPairParams {
        compute: String,
        a: String,
        b: String,
    },

    #[error("Compute '{compute}' has no parameters for dihedral type '{type_name}'")]
    MissingDihedralParams { compute: String, type_name: String },

    #[error("Unknown type name '{0}'")]
    UnknownType(String),

    #[error("Compute '{compute}' was configured for {expected} types but the system has {found}")]
    TypeCountMismatch {
        compute: String,
        expected: usize,
        found: usize,
    },

    #[error("Dihedral {index} references particle tag {tag}, which does not exist")]
    DanglingTag { index: usize, tag: u32 },

    #[error("Invalid cutoff for ({a}, {b}): {reason}")]
    InvalidCutoff {
        a: String,
        b: String,
        reason: &'static str,
    },

    #[error(transparent)]
    Param(#[from] ParamError),

    #[error(transparent)]
    Buffer(#[from] BufferError),

    #[error(transparent)]
    Particle(#[from] ParticleError),

    #[error("Accelerated launch failed: {0}")]
    Tuner(#[from] TunerError),

    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Failures of an end-to-end workflow.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to load force-field coefficients: {0}")]
    ParamLoad(#[from] ParamLoadError),

    #[error("Force compute failed: {source}")]
    Force {
        #[from]
        source: ForceError,
    },

    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),

    #[error("Particle data error: {0}")]
    Particle(#[from] ParticleError),

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Host and accelerated results diverged at step {step}: max deviation {deviation:e}")]
    Divergence { step: u64, deviation: f64 },
}
