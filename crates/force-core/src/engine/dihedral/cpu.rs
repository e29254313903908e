use super::{DihedralKernel, accumulate};
use crate::core::forcefield::term::{ForceRecord, Virial};

/// Host kernel: evaluates dihedrals in order and scatters each into its members.
/// Returns the number of degenerate dihedrals.
pub(super) fn compute_forces(kernel: &DihedralKernel<'_>, forces: &mut [ForceRecord], virials: &mut [Virial]) -> usize {
    forces.fill(ForceRecord::default());
    virials.fill(Virial::ZERO);
    let mut degenerate = 0;
    for tuple in kernel.tuples {
        let eval = kernel.evaluate(tuple);
        degenerate += usize::from(eval.degenerate);
        accumulate(forces, virials, &tuple.members, &eval);
    }
    degenerate
}
