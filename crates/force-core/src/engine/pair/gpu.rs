use super::PairKernel;
use crate::core::forcefield::pair::{PairPotential, evaluate_pair};
use crate::core::forcefield::term::{ForceRecord, Virial};
use rayon::prelude::*;

/// Accelerated kernel: one work item per particle over a full neighbor list, so every
/// item writes only its own output slot. Blocks of `block_size` items run in parallel.
pub(super) fn compute_forces<P: PairPotential>(
    kernel: &PairKernel<'_, P>,
    block_size: usize,
    forces: &mut [ForceRecord],
    virials: &mut [Virial],
) -> usize {
    forces
        .par_chunks_mut(block_size)
        .zip(virials.par_chunks_mut(block_size))
        .enumerate()
        .map(|(block, (force_block, virial_block))| {
            let mut clamped = 0;
            let slots = force_block.iter_mut().zip(virial_block.iter_mut());
            for (t, (force_out, virial_out)) in slots.enumerate() {
                let i = block * block_size + t;
                let (record, virial, n) = particle_forces(kernel, i);
                *force_out = record;
                *virial_out = virial;
                clamped += n;
            }
            clamped
        })
        .sum()
}

#[inline]
fn particle_forces<P: PairPotential>(kernel: &PairKernel<'_, P>, i: usize) -> (ForceRecord, Virial, usize) {
    let pi = &kernel.positions[i];
    let mut record = ForceRecord::default();
    let mut virial = Virial::ZERO;
    let mut clamped = 0;

    for &j in kernel.nlist.neighbors(i) {
        let pj = &kernel.positions[j as usize];
        let dx = kernel.box_dim.min_image(pi.r - pj.r);
        let entry = kernel.table.get(pi.type_id, pj.type_id);
        let Some(ev) = evaluate_pair(entry, dx.norm_squared(), kernel.shift_mode) else {
            continue;
        };
        clamped += usize::from(ev.clamped);
        let f = dx * ev.force_divr;
        record += ForceRecord::new(f, 0.5 * ev.energy);
        virial += Virial::outer(&dx, &f) * 0.5;
    }
    (record, virial, clamped)
}
