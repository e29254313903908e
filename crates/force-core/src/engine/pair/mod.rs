//! Pairwise interaction engine.
//!
//! [`PotentialPair`] evaluates any [`PairPotential`] over the candidates of a
//! [`NeighborSource`], re-filtering each pair against the exact per-type-pair cutoff and
//! applying the active [`ShiftMode`]. The host backend walks the list sequentially; the
//! accelerated backend requires a full list and runs one work item per particle on the
//! device, with its block size chosen by an [`Autotuner`].

mod cpu;
mod gpu;

use super::autotuner::Autotuner;
use super::backend::Backend;
use super::compute::{ForceCompute, ForceOutputs};
use super::config::TunerConfig;
use super::device::{ExecutionConfiguration, ExecutionMode};
use super::error::ForceError;
use crate::core::buffer::WriteMode;
use crate::core::forcefield::pair::{PairEntry, PairPotential, ShiftMode};
use crate::core::forcefield::params::{PairSection, TypePairTable};
use crate::core::forcefield::term::{ForceRecord, Virial};
use crate::core::models::box_dim::BoxDim;
use crate::core::models::particles::PosType;
use crate::core::models::system::SystemDefinition;
use crate::core::neighbor::{NeighborSource, StorageMode};
use tracing::{debug, instrument, warn};

/// Dense, validated copy of the per-type-pair parameters handed to the kernels.
#[derive(Debug)]
struct PairTable<P> {
    n_types: usize,
    entries: Vec<PairEntry<P>>,
}

impl<P> PairTable<P> {
    #[inline]
    fn get(&self, a: u32, b: u32) -> &PairEntry<P> {
        &self.entries[a as usize * self.n_types + b as usize]
    }

    fn max_r_cut(&self) -> f64 {
        self.entries
            .iter()
            .map(|e| e.r_cut_sq.sqrt())
            .fold(0.0, f64::max)
    }
}

struct PairKernel<'a, P> {
    positions: &'a [PosType],
    box_dim: BoxDim,
    nlist: &'a dyn NeighborSource,
    table: &'a PairTable<P>,
    shift_mode: ShiftMode,
}

#[derive(Debug)]
pub struct PotentialPair<P: PairPotential> {
    name: String,
    type_names: Vec<String>,
    params: TypePairTable<P>,
    r_cut: TypePairTable<f64>,
    r_on: TypePairTable<f64>,
    shift_mode: ShiftMode,
    nlist: Box<dyn NeighborSource>,
    outputs: ForceOutputs,
    backend: Backend,
    enabled: bool,
}

impl<P: PairPotential> PotentialPair<P> {
    /// Picks the backend matching the execution configuration.
    pub fn new(
        system: &SystemDefinition,
        nlist: Box<dyn NeighborSource>,
        default_r_cut: f64,
        exec: &ExecutionConfiguration,
    ) -> Result<Self, ForceError> {
        match exec.mode() {
            ExecutionMode::Cpu => Ok(Self::new_host(system, nlist, default_r_cut)),
            ExecutionMode::Gpu => Self::new_accelerated(system, nlist, default_r_cut, exec),
        }
    }

    pub fn new_host(system: &SystemDefinition, nlist: Box<dyn NeighborSource>, default_r_cut: f64) -> Self {
        Self::with_backend(system, nlist, default_r_cut, Backend::Host)
    }

    /// Builds the accelerated backend. The neighbor list is switched to full storage.
    pub fn new_accelerated(
        system: &SystemDefinition,
        mut nlist: Box<dyn NeighborSource>,
        default_r_cut: f64,
        exec: &ExecutionConfiguration,
    ) -> Result<Self, ForceError> {
        let backend = Backend::accelerated(&Self::default_name(), exec)?;
        nlist.set_storage_mode(StorageMode::Full);
        Ok(Self::with_backend(system, nlist, default_r_cut, backend))
    }

    fn default_name() -> String {
        format!("pair.{}", P::NAME)
    }

    fn with_backend(
        system: &SystemDefinition,
        nlist: Box<dyn NeighborSource>,
        default_r_cut: f64,
        backend: Backend,
    ) -> Self {
        let particles = &system.particles;
        let n_types = particles.n_types();
        let name = Self::default_name();
        Self {
            outputs: ForceOutputs::new(name.clone(), particles.len()),
            name,
            type_names: particles.type_names().to_vec(),
            params: TypePairTable::new(n_types),
            r_cut: TypePairTable::filled(n_types, default_r_cut),
            r_on: TypePairTable::new(n_types),
            shift_mode: ShiftMode::NoShift,
            nlist,
            backend,
            enabled: true,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self.outputs = ForceOutputs::new(self.name.clone(), self.outputs.len());
        self
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.backend.mode()
    }

    fn type_pair(&self, a: &str, b: &str) -> Result<(u32, u32), ForceError> {
        let find = |name: &str| {
            self.type_names
                .iter()
                .position(|t| t == name)
                .map(|i| i as u32)
                .ok_or_else(|| ForceError::UnknownType(name.to_string()))
        };
        Ok((find(a)?, find(b)?))
    }

    pub fn set_params(&mut self, a: &str, b: &str, potential: P) -> Result<(), ForceError> {
        let (ta, tb) = self.type_pair(a, b)?;
        self.params.set(ta, tb, potential);
        Ok(())
    }

    /// Sets the cutoff for one type pair. A cutoff of zero disables the pair.
    pub fn set_r_cut(&mut self, a: &str, b: &str, r_cut: f64) -> Result<(), ForceError> {
        let (ta, tb) = self.type_pair(a, b)?;
        if !r_cut.is_finite() || r_cut < 0.0 {
            return Err(ForceError::InvalidCutoff {
                a: a.to_string(),
                b: b.to_string(),
                reason: "r_cut must be finite and non-negative",
            });
        }
        self.r_cut.set(ta, tb, r_cut);
        Ok(())
    }

    /// Sets the radius where XPLOR smoothing begins for one type pair. Unset pairs start
    /// smoothing at their cutoff, which leaves the potential unswitched.
    pub fn set_r_on(&mut self, a: &str, b: &str, r_on: f64) -> Result<(), ForceError> {
        let (ta, tb) = self.type_pair(a, b)?;
        if !r_on.is_finite() || r_on < 0.0 {
            return Err(ForceError::InvalidCutoff {
                a: a.to_string(),
                b: b.to_string(),
                reason: "r_on must be finite and non-negative",
            });
        }
        self.r_on.set(ta, tb, r_on);
        Ok(())
    }

    pub fn r_cut(&self, a: &str, b: &str) -> Result<f64, ForceError> {
        let (ta, tb) = self.type_pair(a, b)?;
        Ok(self.r_cut.get(ta, tb).copied().unwrap_or(0.0))
    }

    pub fn set_shift_mode(&mut self, mode: ShiftMode) {
        self.shift_mode = mode;
    }

    pub fn shift_mode(&self) -> ShiftMode {
        self.shift_mode
    }

    /// Applies every entry of a coefficient file section.
    pub fn apply_coeffs(&mut self, section: &PairSection) -> Result<(), ForceError> {
        self.shift_mode = section.shift_mode;
        for entry in &section.coeff {
            let potential = P::from_coeffs(&entry.values)?;
            self.set_params(&entry.a, &entry.b, potential)?;
            if let Some(r_cut) = entry.r_cut.or(section.default_r_cut) {
                self.set_r_cut(&entry.a, &entry.b, r_cut)?;
            }
            if let Some(r_on) = entry.r_on {
                self.set_r_on(&entry.a, &entry.b, r_on)?;
            }
        }
        debug!(
            compute = %self.name,
            pairs = section.coeff.len(),
            shift_mode = %self.shift_mode,
            "Applied pair coefficients"
        );
        Ok(())
    }

    /// Replaces the autotuner of the accelerated backend. Host computes ignore this.
    pub fn configure_tuner(&mut self, config: &TunerConfig) -> Result<(), ForceError> {
        Ok(self.backend.configure_tuner(&self.name, config)?)
    }

    pub fn autotuner(&self) -> Option<&Autotuner> {
        self.backend.tuner()
    }

    /// Block size the tuner settled on, once its initial scan has finished.
    pub fn tuned_block_size(&self) -> Option<u32> {
        self.autotuner()
            .filter(|t| t.is_complete())
            .map(Autotuner::param)
    }

    pub fn neighbor_list(&self) -> &dyn NeighborSource {
        self.nlist.as_ref()
    }

    pub fn neighbor_list_mut(&mut self) -> &mut dyn NeighborSource {
        self.nlist.as_mut()
    }

    fn build_table(&self) -> Result<PairTable<P>, ForceError> {
        let n_types = self.type_names.len();
        let mut entries = Vec::with_capacity(n_types * n_types);
        for a in 0..n_types as u32 {
            for b in 0..n_types as u32 {
                let potential = self.params.get(a, b).cloned().ok_or_else(|| {
                    ForceError::MissingPairParams {
                        compute: self.name.clone(),
                        a: self.type_names[a as usize].clone(),
                        b: self.type_names[b as usize].clone(),
                    }
                })?;
                let r_cut = self.r_cut.get(a, b).copied().unwrap_or(0.0);
                let r_on = self.r_on.get(a, b).copied().unwrap_or(r_cut);
                entries.push(PairEntry {
                    potential,
                    r_cut_sq: r_cut * r_cut,
                    r_on_sq: r_on * r_on,
                });
            }
        }
        Ok(PairTable { n_types, entries })
    }
}

impl<P: PairPotential> ForceCompute for PotentialPair<P> {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip_all, name = "pair_compute", fields(compute = %self.name, timestep = timestep))]
    fn compute(&mut self, timestep: u64, system: &SystemDefinition) -> Result<(), ForceError> {
        let particles = &system.particles;
        if particles.n_types() != self.type_names.len() {
            return Err(ForceError::TypeCountMismatch {
                compute: self.name.clone(),
                expected: self.type_names.len(),
                found: particles.n_types(),
            });
        }
        let location = self.backend.location();

        if !self.enabled {
            self.outputs.resize(particles.len());
            self.outputs.write_zeros(location)?;
            self.outputs.mark_computed(timestep);
            return Ok(());
        }

        let table = self.build_table()?;
        if self.backend.tuner().is_some() && self.nlist.storage_mode() != StorageMode::Full {
            debug!(compute = %self.name, "Accelerated kernel needs a full neighbor list; switching storage");
            self.nlist.set_storage_mode(StorageMode::Full);
        }
        self.nlist.request_cutoff(table.max_r_cut());
        self.nlist.update(timestep, particles)?;
        self.outputs.resize(particles.len());

        let positions = particles.positions().read(location)?;
        let kernel = PairKernel {
            positions: &positions,
            box_dim: *particles.box_dim(),
            nlist: self.nlist.as_ref(),
            table: &table,
            shift_mode: self.shift_mode,
        };
        let mut forces = self
            .outputs
            .force_array()
            .write(location, WriteMode::Overwrite)?;
        let mut virials = self
            .outputs
            .virial_array()
            .write(location, WriteMode::Overwrite)?;

        let clamped = match &mut self.backend {
            Backend::Host => cpu::compute_forces(&kernel, &mut forces, &mut virials),
            Backend::Accelerated { exec, tuner } => {
                let force_slots: &mut [ForceRecord] = &mut forces;
                let virial_slots: &mut [Virial] = &mut virials;
                tuner.run(|block_size| {
                    exec.launch(block_size, |block| {
                        gpu::compute_forces(&kernel, block, force_slots, virial_slots)
                    })
                })?
            }
        };
        drop(forces);
        drop(virials);

        if clamped > 0 {
            warn!(
                compute = %self.name,
                timestep,
                pairs = clamped,
                "Pair separation below the numerical floor was clamped"
            );
        }
        self.outputs.mark_computed(timestep);
        Ok(())
    }

    fn set_autotuner_params(&mut self, enable: bool, period: u32) {
        self.backend.set_autotuner_params(enable, period);
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn outputs(&self) -> &ForceOutputs {
        &self.outputs
    }
}
