//! Four-body torsion engine.
//!
//! Each registered dihedral is resolved from tags to storage indices, evaluated with
//! [`evaluate_dihedral`], and its forces are added to the four members. Per-particle
//! energy and virial receive a quarter of the dihedral's value each, so the output sums
//! count every dihedral exactly once.

mod cpu;
mod gpu;

use super::autotuner::Autotuner;
use super::backend::Backend;
use super::compute::{ForceCompute, ForceOutputs};
use super::config::TunerConfig;
use super::device::{ExecutionConfiguration, ExecutionMode};
use super::error::ForceError;
use crate::core::buffer::WriteMode;
use crate::core::forcefield::dihedral::{CosineTerm, DihedralEvaluation, DihedralParams, evaluate_dihedral};
use crate::core::forcefield::params::DihedralSection;
use crate::core::forcefield::term::{ForceRecord, Virial};
use crate::core::models::box_dim::BoxDim;
use crate::core::models::particles::PosType;
use crate::core::models::system::SystemDefinition;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, Copy)]
struct ResolvedDihedral {
    members: [usize; 4],
    type_id: u32,
}

struct DihedralKernel<'a> {
    positions: &'a [PosType],
    box_dim: BoxDim,
    tuples: &'a [ResolvedDihedral],
    params: &'a [DihedralParams],
}

impl DihedralKernel<'_> {
    #[inline]
    fn evaluate(&self, tuple: &ResolvedDihedral) -> DihedralEvaluation {
        let x = tuple.members.map(|i| self.positions[i].r);
        evaluate_dihedral(&self.params[tuple.type_id as usize], x, &self.box_dim)
    }
}

/// Adds one dihedral's contribution to its four members.
#[inline]
fn accumulate(
    forces: &mut [ForceRecord],
    virials: &mut [Virial],
    members: &[usize; 4],
    eval: &DihedralEvaluation,
) {
    let energy = 0.25 * eval.energy;
    let virial = eval.virial * 0.25;
    for (&slot, &f) in members.iter().zip(eval.forces.iter()) {
        forces[slot] += ForceRecord::new(f, energy);
        virials[slot] += virial;
    }
}

#[derive(Debug)]
pub struct DihedralForceCompute {
    name: String,
    type_names: Vec<String>,
    params: Vec<Option<DihedralParams>>,
    outputs: ForceOutputs,
    backend: Backend,
    enabled: bool,
}

impl DihedralForceCompute {
    const NAME: &'static str = "dihedral";

    pub fn new(system: &SystemDefinition, exec: &ExecutionConfiguration) -> Result<Self, ForceError> {
        match exec.mode() {
            ExecutionMode::Cpu => Ok(Self::new_host(system)),
            ExecutionMode::Gpu => Self::new_accelerated(system, exec),
        }
    }

    pub fn new_host(system: &SystemDefinition) -> Self {
        Self::with_backend(system, Backend::Host)
    }

    pub fn new_accelerated(system: &SystemDefinition, exec: &ExecutionConfiguration) -> Result<Self, ForceError> {
        let backend = Backend::accelerated(Self::NAME, exec)?;
        Ok(Self::with_backend(system, backend))
    }

    fn with_backend(system: &SystemDefinition, backend: Backend) -> Self {
        let type_names = system.dihedrals.type_names().to_vec();
        Self {
            name: Self::NAME.to_string(),
            params: vec![None; type_names.len()],
            type_names,
            outputs: ForceOutputs::new(Self::NAME, system.particles.len()),
            backend,
            enabled: true,
        }
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.backend.mode()
    }

    fn type_index(&self, type_name: &str) -> Result<usize, ForceError> {
        self.type_names
            .iter()
            .position(|t| t == type_name)
            .ok_or_else(|| ForceError::UnknownType(type_name.to_string()))
    }

    /// Single cosine term `½ k (1 + d cos(n φ))`; `d` must be `+1` or `-1`.
    pub fn set_params(&mut self, type_name: &str, k: f64, d: i32, n: u32) -> Result<(), ForceError> {
        let index = self.type_index(type_name)?;
        self.params[index] = Some(DihedralParams::harmonic(k, d, n)?);
        Ok(())
    }

    pub fn set_terms(&mut self, type_name: &str, terms: Vec<CosineTerm>) -> Result<(), ForceError> {
        let index = self.type_index(type_name)?;
        self.params[index] = Some(DihedralParams::new(terms));
        Ok(())
    }

    pub fn set_opls(&mut self, type_name: &str, k1: f64, k2: f64, k3: f64, k4: f64) -> Result<(), ForceError> {
        let index = self.type_index(type_name)?;
        self.params[index] = Some(DihedralParams::opls(k1, k2, k3, k4));
        Ok(())
    }

    pub fn params(&self, type_name: &str) -> Result<Option<&DihedralParams>, ForceError> {
        let index = self.type_index(type_name)?;
        Ok(self.params[index].as_ref())
    }

    pub fn apply_coeffs(&mut self, section: &DihedralSection) -> Result<(), ForceError> {
        for (type_name, coeff) in &section.coeff {
            let index = self.type_index(type_name)?;
            self.params[index] = Some(DihedralParams::from_coeff(coeff)?);
        }
        debug!(
            compute = %self.name,
            types = section.coeff.len(),
            "Applied dihedral coefficients"
        );
        Ok(())
    }

    pub fn configure_tuner(&mut self, config: &TunerConfig) -> Result<(), ForceError> {
        Ok(self.backend.configure_tuner(&self.name, config)?)
    }

    pub fn autotuner(&self) -> Option<&Autotuner> {
        self.backend.tuner()
    }

    pub fn tuned_block_size(&self) -> Option<u32> {
        self.autotuner()
            .filter(|t| t.is_complete())
            .map(Autotuner::param)
    }

    fn parameter_table(&self) -> Result<Vec<DihedralParams>, ForceError> {
        self.params
            .iter()
            .zip(&self.type_names)
            .map(|(params, type_name)| {
                params.clone().ok_or_else(|| ForceError::MissingDihedralParams {
                    compute: self.name.clone(),
                    type_name: type_name.clone(),
                })
            })
            .collect()
    }

    fn resolve(system: &SystemDefinition) -> Result<Vec<ResolvedDihedral>, ForceError> {
        system
            .dihedrals
            .dihedrals()
            .iter()
            .enumerate()
            .map(|(index, d)| {
                let mut members = [0usize; 4];
                for (slot, &tag) in members.iter_mut().zip(&d.tags) {
                    *slot = system
                        .particles
                        .index_of(tag)
                        .map_err(|_| ForceError::DanglingTag { index, tag })?;
                }
                Ok(ResolvedDihedral {
                    members,
                    type_id: d.type_id,
                })
            })
            .collect()
    }
}

impl ForceCompute for DihedralForceCompute {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip_all, name = "dihedral_compute", fields(compute = %self.name, timestep = timestep))]
    fn compute(&mut self, timestep: u64, system: &SystemDefinition) -> Result<(), ForceError> {
        if system.dihedrals.n_types() != self.type_names.len() {
            return Err(ForceError::TypeCountMismatch {
                compute: self.name.clone(),
                expected: self.type_names.len(),
                found: system.dihedrals.n_types(),
            });
        }
        let particles = &system.particles;
        let location = self.backend.location();

        if !self.enabled {
            self.outputs.resize(particles.len());
            self.outputs.write_zeros(location)?;
            self.outputs.mark_computed(timestep);
            return Ok(());
        }

        let params = self.parameter_table()?;
        let tuples = Self::resolve(system)?;
        self.outputs.resize(particles.len());

        let positions = particles.positions().read(location)?;
        let kernel = DihedralKernel {
            positions: &positions,
            box_dim: *particles.box_dim(),
            tuples: &tuples,
            params: &params,
        };
        let mut forces = self
            .outputs
            .force_array()
            .write(location, WriteMode::Overwrite)?;
        let mut virials = self
            .outputs
            .virial_array()
            .write(location, WriteMode::Overwrite)?;

        let degenerate = match &mut self.backend {
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

        if degenerate > 0 {
            warn!(
                compute = %self.name,
                timestep,
                dihedrals = degenerate,
                "Dihedral plane undefined for colinear members; forces zeroed"
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
