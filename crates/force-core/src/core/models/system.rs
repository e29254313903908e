use super::particles::ParticleData;
use super::topology::DihedralData;

/// Everything a force compute reads during one evaluation.
///
/// Computes borrow the definition immutably for the duration of
/// [`ForceCompute::compute`](crate::engine::compute::ForceCompute::compute), which guarantees
/// that positions and topology cannot change underneath an evaluation.
#[derive(Debug)]
pub struct SystemDefinition {
    pub particles: ParticleData,
    pub dihedrals: DihedralData,
}

impl SystemDefinition {
    pub fn new(particles: ParticleData) -> Self {
        Self {
            particles,
            dihedrals: DihedralData::default(),
        }
    }

    pub fn with_dihedrals(mut self, dihedrals: DihedralData) -> Self {
        self.dihedrals = dihedrals;
        self
    }
}
