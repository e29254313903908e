//! Candidate-pair enumeration consumed by the pair engine.
//!
//! The pair engine only relies on [`NeighborSource`]. Entries may be stale or lie beyond
//! the interaction cutoff (the engine re-filters them); what a source must guarantee is
//! that every pair inside the requested cutoff is listed, once per pair in
//! [`StorageMode::Half`] and once per direction in [`StorageMode::Full`].

use crate::core::buffer::{AccessLocation, BufferError};
use crate::core::models::particles::{ParticleData, PosType};
use crate::core::models::topology::DihedralData;
use itertools::Itertools;
use nalgebra::Point3;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageMode {
    /// Each pair appears once, in the list of its lower index.
    #[default]
    Half,
    /// Each pair appears twice, once in each member's list.
    Full,
}

pub trait NeighborSource: fmt::Debug + Send + Sync {
    fn storage_mode(&self) -> StorageMode;

    fn set_storage_mode(&mut self, mode: StorageMode);

    /// Raises the interaction cutoff the list must cover.
    fn request_cutoff(&mut self, r_cut: f64);

    /// Brings the lists up to date for the current particle positions.
    fn update(&mut self, timestep: u64, particles: &ParticleData) -> Result<(), BufferError>;

    /// Candidate neighbor indices of the particle stored at `index`.
    fn neighbors(&self, index: usize) -> &[u32];

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// All-pairs neighbor list with a skin buffer and tag-based exclusions.
///
/// Lists cover `r_cut + r_buff` and are rebuilt only when a particle has moved more than
/// half the buffer since the previous build, when particles were reordered, or when the
/// cutoff, storage mode or exclusions changed.
#[derive(Debug, Clone)]
pub struct NeighborList {
    r_cut: f64,
    r_buff: f64,
    mode: StorageMode,
    exclusions: HashSet<(u32, u32)>,
    lists: Vec<Vec<u32>>,
    built_positions: Vec<Point3<f64>>,
    built_tags: Vec<u32>,
    dirty: bool,
    n_builds: u64,
}

impl NeighborList {
    pub fn new(r_cut: f64, r_buff: f64) -> Self {
        Self {
            r_cut,
            r_buff,
            mode: StorageMode::Half,
            exclusions: HashSet::new(),
            lists: Vec::new(),
            built_positions: Vec::new(),
            built_tags: Vec::new(),
            dirty: true,
            n_builds: 0,
        }
    }

    pub fn with_storage_mode(mut self, mode: StorageMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn r_buff(&self) -> f64 {
        self.r_buff
    }

    pub fn n_builds(&self) -> u64 {
        self.n_builds
    }

    pub fn add_exclusion(&mut self, tag_a: u32, tag_b: u32) {
        self.exclusions.insert((tag_a.min(tag_b), tag_a.max(tag_b)));
        self.dirty = true;
    }

    /// Excludes the outer members of every dihedral from non-bonded interaction.
    pub fn add_one_four_exclusions(&mut self, dihedrals: &DihedralData) {
        for (a, b) in dihedrals.one_four_pairs() {
            self.add_exclusion(a, b);
        }
    }

    pub fn clear_exclusions(&mut self) {
        self.exclusions.clear();
        self.dirty = true;
    }

    pub fn is_excluded(&self, tag_a: u32, tag_b: u32) -> bool {
        self.exclusions
            .contains(&(tag_a.min(tag_b), tag_a.max(tag_b)))
    }

    fn needs_rebuild(&self, particles: &ParticleData, positions: &[PosType]) -> bool {
        if self.dirty || self.built_positions.len() != positions.len() {
            return true;
        }
        if (0..particles.len()).any(|i| particles.tag(i) != self.built_tags[i]) {
            return true;
        }
        let max_sq = (self.r_buff * 0.5).powi(2);
        let box_dim = particles.box_dim();
        positions
            .iter()
            .zip(&self.built_positions)
            .any(|(now, then)| box_dim.min_image(now.r - then).norm_squared() > max_sq)
    }

    fn build(&mut self, particles: &ParticleData, positions: &[PosType]) {
        let n = positions.len();
        let box_dim = particles.box_dim();
        let r_list_sq = (self.r_cut + self.r_buff).powi(2);

        let mut lists = vec![Vec::new(); n];
        for (i, j) in (0..n).tuple_combinations() {
            if !self.exclusions.is_empty() && self.is_excluded(particles.tag(i), particles.tag(j)) {
                continue;
            }
            let dx = box_dim.min_image(positions[i].r - positions[j].r);
            if dx.norm_squared() < r_list_sq {
                lists[i].push(j as u32);
                if self.mode == StorageMode::Full {
                    lists[j].push(i as u32);
                }
            }
        }

        self.lists = lists;
        self.built_positions = positions.iter().map(|p| p.r).collect();
        self.built_tags = (0..n).map(|i| particles.tag(i)).collect();
        self.dirty = false;
        self.n_builds += 1;
    }
}

impl NeighborSource for NeighborList {
    fn storage_mode(&self) -> StorageMode {
        self.mode
    }

    fn set_storage_mode(&mut self, mode: StorageMode) {
        if self.mode != mode {
            self.mode = mode;
            self.dirty = true;
        }
    }

    fn request_cutoff(&mut self, r_cut: f64) {
        if r_cut > self.r_cut {
            self.r_cut = r_cut;
            self.dirty = true;
        }
    }

    fn update(&mut self, timestep: u64, particles: &ParticleData) -> Result<(), BufferError> {
        let positions = particles.positions().read(AccessLocation::Host)?;
        if self.needs_rebuild(particles, &positions) {
            self.build(particles, &positions);
            debug!(
                timestep,
                builds = self.n_builds,
                "Rebuilt neighbor list for {} particles",
                positions.len()
            );
        } else {
            trace!(timestep, "Neighbor list still valid");
        }
        Ok(())
    }

    fn neighbors(&self, index: usize) -> &[u32] {
        &self.lists[index]
    }

    fn len(&self) -> usize {
        self.lists.len()
    }
}
