use super::box_dim::BoxDim;
use crate::core::buffer::{AccessLocation, BufferError, DualArray, WriteMode};
use nalgebra::{Point3, Vector3};
use thiserror::Error;

/// Position of one particle with its type id packed alongside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PosType {
    pub r: Point3<f64>,
    pub type_id: u32,
}

impl PosType {
    pub fn new(r: Point3<f64>, type_id: u32) -> Self {
        Self { r, type_id }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParticleError {
    #[error("No particle with tag {0}")]
    UnknownTag(u32),
    #[error("Unknown particle type '{0}'")]
    UnknownTypeName(String),
    #[error("Particle type id {type_id} is out of range ({n_types} types defined)")]
    TypeOutOfRange { type_id: u32, n_types: usize },
    #[error("Reordering requires a permutation of {expected} indices")]
    InvalidPermutation { expected: usize },
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

/// Per-particle state read by force computes.
///
/// Particles are stored in an internal order that may change over the course of a run
/// (see [`ParticleData::reorder`]). Each particle keeps a stable tag; `rtags[tag]` gives its
/// current index. Public setters and getters are tag addressed.
#[derive(Debug)]
pub struct ParticleData {
    positions: DualArray<PosType>,
    velocities: DualArray<Vector3<f64>>,
    masses: Vec<f64>,
    tags: Vec<u32>,
    rtags: Vec<u32>,
    type_names: Vec<String>,
    box_dim: BoxDim,
}

impl ParticleData {
    /// Creates `n` particles at the origin, at rest, with unit mass and type 0.
    pub fn new(n: usize, box_dim: BoxDim, type_names: &[&str]) -> Self {
        let origin = PosType::new(Point3::origin(), 0);
        Self {
            positions: DualArray::new("positions", n, origin),
            velocities: DualArray::new("velocities", n, Vector3::zeros()),
            masses: vec![1.0; n],
            tags: (0..n as u32).collect(),
            rtags: (0..n as u32).collect(),
            type_names: type_names.iter().map(|s| s.to_string()).collect(),
            box_dim,
        }
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn n_types(&self) -> usize {
        self.type_names.len()
    }

    pub fn type_names(&self) -> &[String] {
        &self.type_names
    }

    pub fn type_id(&self, name: &str) -> Result<u32, ParticleError> {
        self.type_names
            .iter()
            .position(|t| t == name)
            .map(|i| i as u32)
            .ok_or_else(|| ParticleError::UnknownTypeName(name.to_string()))
    }

    pub fn box_dim(&self) -> &BoxDim {
        &self.box_dim
    }

    pub fn set_box_dim(&mut self, box_dim: BoxDim) {
        self.box_dim = box_dim;
    }

    pub fn positions(&self) -> &DualArray<PosType> {
        &self.positions
    }

    pub fn velocities(&self) -> &DualArray<Vector3<f64>> {
        &self.velocities
    }

    pub fn masses(&self) -> &[f64] {
        &self.masses
    }

    /// Tag of the particle currently stored at `index`.
    pub fn tag(&self, index: usize) -> u32 {
        self.tags[index]
    }

    /// Current index of the particle with `tag`.
    pub fn index_of(&self, tag: u32) -> Result<usize, ParticleError> {
        self.rtags
            .get(tag as usize)
            .map(|&i| i as usize)
            .ok_or(ParticleError::UnknownTag(tag))
    }

    pub fn set_position(&mut self, tag: u32, r: Point3<f64>) -> Result<(), ParticleError> {
        let index = self.index_of(tag)?;
        let wrapped = self.box_dim.wrap(r);
        let mut h = self
            .positions
            .write(AccessLocation::Host, WriteMode::ReadWrite)?;
        h[index].r = wrapped;
        Ok(())
    }

    pub fn set_type(&mut self, tag: u32, type_id: u32) -> Result<(), ParticleError> {
        if type_id as usize >= self.type_names.len() {
            return Err(ParticleError::TypeOutOfRange {
                type_id,
                n_types: self.type_names.len(),
            });
        }
        let index = self.index_of(tag)?;
        let mut h = self
            .positions
            .write(AccessLocation::Host, WriteMode::ReadWrite)?;
        h[index].type_id = type_id;
        Ok(())
    }

    pub fn set_velocity(&mut self, tag: u32, v: Vector3<f64>) -> Result<(), ParticleError> {
        let index = self.index_of(tag)?;
        let mut h = self
            .velocities
            .write(AccessLocation::Host, WriteMode::ReadWrite)?;
        h[index] = v;
        Ok(())
    }

    pub fn set_mass(&mut self, tag: u32, mass: f64) -> Result<(), ParticleError> {
        let index = self.index_of(tag)?;
        self.masses[index] = mass;
        Ok(())
    }

    pub fn position(&self, tag: u32) -> Result<PosType, ParticleError> {
        let index = self.index_of(tag)?;
        Ok(self.positions.read(AccessLocation::Host)?[index])
    }

    pub fn velocity(&self, tag: u32) -> Result<Vector3<f64>, ParticleError> {
        let index = self.index_of(tag)?;
        Ok(self.velocities.read(AccessLocation::Host)?[index])
    }

    /// Positions listed in tag order rather than storage order.
    pub fn positions_by_tag(&self) -> Result<Vec<PosType>, ParticleError> {
        let h = self.positions.read(AccessLocation::Host)?;
        Ok(self.rtags.iter().map(|&i| h[i as usize]).collect())
    }

    /// Moves the particle at old index `order[k]` to new index `k`. Tags travel with particles.
    pub fn reorder(&mut self, order: &[usize]) -> Result<(), ParticleError> {
        let n = self.len();
        let mut seen = vec![false; n];
        let is_permutation = order.len() == n
            && order
                .iter()
                .all(|&i| i < n && !std::mem::replace(&mut seen[i], true));
        if !is_permutation {
            return Err(ParticleError::InvalidPermutation { expected: n });
        }

        {
            let mut pos = self
                .positions
                .write(AccessLocation::Host, WriteMode::ReadWrite)?;
            let old: Vec<PosType> = pos.to_vec();
            for (k, &i) in order.iter().enumerate() {
                pos[k] = old[i];
            }
        }
        {
            let mut vel = self
                .velocities
                .write(AccessLocation::Host, WriteMode::ReadWrite)?;
            let old: Vec<Vector3<f64>> = vel.to_vec();
            for (k, &i) in order.iter().enumerate() {
                vel[k] = old[i];
            }
        }
        self.masses = order.iter().map(|&i| self.masses[i]).collect();
        self.tags = order.iter().map(|&i| self.tags[i]).collect();
        for (index, &tag) in self.tags.iter().enumerate() {
            self.rtags[tag as usize] = index as u32;
        }
        Ok(())
    }
}
