use super::{DihedralKernel, accumulate};
use crate::core::forcefield::dihedral::DihedralEvaluation;
use crate::core::forcefield::term::{ForceRecord, Virial};
use rayon::prelude::*;

/// Accelerated kernel. Dihedrals are evaluated in parallel, `block_size` per block, and
/// the per-dihedral results are then reduced into the particle slots in dihedral order,
/// so members shared between dihedrals never race and the sums are reproducible.
pub(super) fn compute_forces(
    kernel: &DihedralKernel<'_>,
    block_size: usize,
    forces: &mut [ForceRecord],
    virials: &mut [Virial],
) -> usize {
    let evaluations: Vec<DihedralEvaluation> = kernel
        .tuples
        .par_chunks(block_size)
        .flat_map_iter(|block| block.iter().map(|tuple| kernel.evaluate(tuple)))
        .collect();

    forces.fill(ForceRecord::default());
    virials.fill(Virial::ZERO);
    let mut degenerate = 0;
    for (tuple, eval) in kernel.tuples.iter().zip(&evaluations) {
        degenerate += usize::from(eval.degenerate);
        accumulate(forces, virials, &tuple.members, eval);
    }
    degenerate
}
