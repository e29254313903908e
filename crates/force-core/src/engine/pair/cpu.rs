use super::PairKernel;
use crate::core::forcefield::pair::{PairPotential, evaluate_pair};
use crate::core::forcefield::term::{ForceRecord, Virial};
use crate::core::neighbor::StorageMode;

/// Host kernel. With a half list each pair is visited once and the force is applied to
/// both members with opposite signs. Returns the number of floored separations.
pub(super) fn compute_forces<P: PairPotential>(
    kernel: &PairKernel<'_, P>,
    forces: &mut [ForceRecord],
    virials: &mut [Virial],
) -> usize {
    forces.fill(ForceRecord::default());
    virials.fill(Virial::ZERO);
    let third_law = kernel.nlist.storage_mode() == StorageMode::Half;
    let mut clamped = 0;

    for (i, pi) in kernel.positions.iter().enumerate() {
        for &j in kernel.nlist.neighbors(i) {
            let j = j as usize;
            let pj = &kernel.positions[j];
            let dx = kernel.box_dim.min_image(pi.r - pj.r);
            let entry = kernel.table.get(pi.type_id, pj.type_id);
            let Some(ev) = evaluate_pair(entry, dx.norm_squared(), kernel.shift_mode) else {
                continue;
            };
            clamped += usize::from(ev.clamped);

            let f = dx * ev.force_divr;
            let half_energy = 0.5 * ev.energy;
            let virial = Virial::outer(&dx, &f) * 0.5;
            forces[i] += ForceRecord::new(f, half_energy);
            virials[i] += virial;
            if third_law {
                forces[j] += ForceRecord::new(-f, half_energy);
                virials[j] += virial;
            }
        }
    }
    clamped
}
