//! Thermodynamic observables and the velocity-rescale thermostat.

use super::compute::ForceCompute;
use super::error::ForceError;
use crate::core::buffer::{AccessLocation, WriteMode};
use crate::core::forcefield::term::Virial;
use crate::core::models::particles::{ParticleData, ParticleError};
use crate::core::variant::Variant;
use tracing::{debug, instrument, warn};

/// Below this temperature a rescale would divide by (nearly) zero and is skipped.
const MIN_RESCALE_TEMPERATURE: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermoSnapshot {
    pub kinetic_energy: f64,
    pub potential_energy: f64,
    pub temperature: f64,
    pub pressure: f64,
    pub ndof: f64,
}

/// Reduces particle velocities and compute outputs to scalar observables.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComputeThermo {
    ndof: Option<f64>,
}

impl ComputeThermo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the default of three degrees of freedom per particle.
    pub fn with_ndof(mut self, ndof: f64) -> Self {
        self.ndof = Some(ndof);
        self
    }

    pub fn ndof(&self, particles: &ParticleData) -> f64 {
        self.ndof.unwrap_or(3.0 * particles.len() as f64)
    }

    pub fn kinetic_energy(&self, particles: &ParticleData) -> Result<f64, ParticleError> {
        let velocities = particles.velocities().read(AccessLocation::Host)?;
        Ok(velocities
            .iter()
            .zip(particles.masses())
            .map(|(v, m)| 0.5 * m * v.norm_squared())
            .sum())
    }

    /// `2 K / ndof`, in reduced units.
    pub fn temperature(&self, particles: &ParticleData) -> Result<f64, ParticleError> {
        let ndof = self.ndof(particles);
        if ndof <= 0.0 {
            return Ok(0.0);
        }
        Ok(2.0 * self.kinetic_energy(particles)? / ndof)
    }

    /// Snapshot including the potential energy and virial pressure of `computes`.
    #[instrument(skip_all, name = "thermo_compute")]
    pub fn compute(
        &self,
        particles: &ParticleData,
        computes: &[&dyn ForceCompute],
    ) -> Result<ThermoSnapshot, ForceError> {
        let kinetic_energy = self.kinetic_energy(particles)?;
        let ndof = self.ndof(particles);
        let temperature = if ndof > 0.0 { 2.0 * kinetic_energy / ndof } else { 0.0 };

        let mut potential_energy = 0.0;
        let mut virial = Virial::ZERO;
        for compute in computes {
            potential_energy += compute.outputs().energy_sum()?;
            virial += compute.outputs().virial_sum()?;
        }
        let volume = particles.box_dim().volume();
        let pressure = (2.0 * kinetic_energy + virial.trace()) / (3.0 * volume);

        Ok(ThermoSnapshot {
            kinetic_energy,
            potential_energy,
            temperature,
            pressure,
            ndof,
        })
    }
}

/// Rescales every velocity so the measured temperature matches a timestep-dependent target.
#[derive(Debug, Clone)]
pub struct TempRescaleUpdater {
    target: Variant,
    thermo: ComputeThermo,
}

impl TempRescaleUpdater {
    pub fn new(target: Variant) -> Self {
        Self {
            target,
            thermo: ComputeThermo::new(),
        }
    }

    pub fn with_thermo(mut self, thermo: ComputeThermo) -> Self {
        self.thermo = thermo;
        self
    }

    pub fn target(&self) -> &Variant {
        &self.target
    }

    pub fn set_target(&mut self, target: Variant) {
        self.target = target;
    }

    /// Applies the rescale for `timestep`. Returns the factor applied, or `None` when the
    /// current temperature is too low to scale.
    pub fn update(&self, timestep: u64, particles: &mut ParticleData) -> Result<Option<f64>, ParticleError> {
        let current = self.thermo.temperature(particles)?;
        let target = self.target.value(timestep);
        if current < MIN_RESCALE_TEMPERATURE {
            warn!(
                timestep,
                temperature = current,
                "Cannot rescale a zero temperature; skipping this step"
            );
            return Ok(None);
        }

        let factor = (target / current).sqrt();
        let mut velocities = particles
            .velocities()
            .write(AccessLocation::Host, WriteMode::ReadWrite)?;
        for v in velocities.iter_mut() {
            *v *= factor;
        }
        debug!(timestep, from = current, to = target, factor, "Rescaled velocities");
        Ok(Some(factor))
    }
}
