//! The contract every interaction engine implements, and the outputs it owns.

use super::error::ForceError;
use crate::core::buffer::{AccessLocation, ArrayView, BufferError, DualArray, WriteMode};
use crate::core::forcefield::term::{ForceRecord, Virial};
use crate::core::models::particles::ParticleData;
use crate::core::models::system::SystemDefinition;

/// Per-timestep producer of forces, energies and virials.
///
/// `compute` overwrites the outputs completely; summing several computes is the caller's
/// job. Calling it twice with the same system state yields identical outputs. A failed
/// compute returns an error and leaves the previous outputs untouched.
pub trait ForceCompute {
    fn name(&self) -> &str;

    fn compute(&mut self, timestep: u64, system: &SystemDefinition) -> Result<(), ForceError>;

    /// Forwards tuning settings to the accelerated backend. Host computes ignore it.
    fn set_autotuner_params(&mut self, _enable: bool, _period: u32) {}

    /// A disabled compute writes zero outputs.
    fn set_enabled(&mut self, enabled: bool);

    fn is_enabled(&self) -> bool;

    fn outputs(&self) -> &ForceOutputs;
}

/// Force/energy and virial buffers owned by one compute.
#[derive(Debug)]
pub struct ForceOutputs {
    owner: String,
    forces: DualArray<ForceRecord>,
    virials: DualArray<Virial>,
    last_timestep: Option<u64>,
}

impl ForceOutputs {
    pub fn new(owner: impl Into<String>, n: usize) -> Self {
        Self {
            owner: owner.into(),
            forces: DualArray::new("forces", n, ForceRecord::default()),
            virials: DualArray::new("virials", n, Virial::ZERO),
            last_timestep: None,
        }
    }

    pub fn len(&self) -> usize {
        self.forces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forces.is_empty()
    }

    /// Timestep of the most recent successful compute.
    pub fn last_timestep(&self) -> Option<u64> {
        self.last_timestep
    }

    pub fn forces(&self) -> Result<ArrayView<'_, ForceRecord>, ForceError> {
        self.ensure_computed()?;
        Ok(self.forces.read(AccessLocation::Host)?)
    }

    pub fn virials(&self) -> Result<ArrayView<'_, Virial>, ForceError> {
        self.ensure_computed()?;
        Ok(self.virials.read(AccessLocation::Host)?)
    }

    pub fn force_array(&self) -> &DualArray<ForceRecord> {
        &self.forces
    }

    pub fn virial_array(&self) -> &DualArray<Virial> {
        &self.virials
    }

    /// Total potential energy, each interaction counted once.
    pub fn energy_sum(&self) -> Result<f64, ForceError> {
        Ok(self.forces()?.iter().map(|r| r.energy).sum())
    }

    pub fn virial_sum(&self) -> Result<Virial, ForceError> {
        Ok(self
            .virials()?
            .iter()
            .fold(Virial::ZERO, |acc, &v| acc + v))
    }

    /// Output record of the particle with `tag`, independent of storage order.
    pub fn record_by_tag(&self, particles: &ParticleData, tag: u32) -> Result<ForceRecord, ForceError> {
        let index = particles.index_of(tag)?;
        Ok(self.forces()?[index])
    }

    pub fn virial_by_tag(&self, particles: &ParticleData, tag: u32) -> Result<Virial, ForceError> {
        let index = particles.index_of(tag)?;
        Ok(self.virials()?[index])
    }

    fn ensure_computed(&self) -> Result<(), ForceError> {
        match self.last_timestep {
            Some(_) => Ok(()),
            None => Err(ForceError::NotComputed(self.owner.clone())),
        }
    }

    pub(crate) fn resize(&mut self, n: usize) {
        if self.forces.len() != n {
            self.forces.resize(n, ForceRecord::default());
            self.virials.resize(n, Virial::ZERO);
        }
    }

    pub(crate) fn mark_computed(&mut self, timestep: u64) {
        self.last_timestep = Some(timestep);
    }

    pub(crate) fn write_zeros(&self, location: AccessLocation) -> Result<(), BufferError> {
        let mut forces = self.forces.write(location, WriteMode::Overwrite)?;
        let mut virials = self.virials.write(location, WriteMode::Overwrite)?;
        forces.fill(ForceRecord::default());
        virials.fill(Virial::ZERO);
        Ok(())
    }
}
