use super::params::ParamError;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

/// Floor applied to squared separations before a potential is evaluated.
pub const MIN_R_SQ: f64 = 1e-12;

/// How a pair energy is adjusted near the cutoff radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShiftMode {
    /// Raw potential; energy jumps to zero at the cutoff.
    #[default]
    NoShift,
    /// Energy offset by the raw potential at the cutoff.
    Shift,
    /// Energy and force multiplied by the XPLOR switching function between `r_on` and `r_cut`.
    Xplor,
}

impl fmt::Display for ShiftMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoShift => "no-shift",
            Self::Shift => "shift",
            Self::Xplor => "xplor",
        };
        f.write_str(name)
    }
}

/// A radial pair potential.
///
/// `evaluate` receives the squared separation and squared cutoff and returns
/// `(force_divr, energy)`, where `force_divr` is `-dV/dr / r` so that the force on the
/// first particle is `dx * force_divr` with `dx = x_i - x_j`.
pub trait PairPotential: fmt::Debug + Clone + Send + Sync {
    const NAME: &'static str;

    fn evaluate(&self, r_sq: f64, r_cut_sq: f64) -> (f64, f64);

    /// Builds the potential from named coefficients.
    fn from_coeffs(coeffs: &HashMap<String, f64>) -> Result<Self, ParamError>;
}

fn coeff(
    coeffs: &HashMap<String, f64>,
    potential: &'static str,
    name: &'static str,
) -> Result<f64, ParamError> {
    coeffs
        .get(name)
        .copied()
        .ok_or(ParamError::MissingCoefficient { potential, name })
}

fn lj_prefactors(coeffs: &HashMap<String, f64>, potential: &'static str) -> Result<(f64, f64), ParamError> {
    let epsilon = coeff(coeffs, potential, "epsilon")?;
    let sigma = coeff(coeffs, potential, "sigma")?;
    let alpha = coeffs.get("alpha").copied().unwrap_or(1.0);
    if sigma <= 0.0 {
        return Err(ParamError::InvalidCoefficient {
            name: "sigma",
            value: sigma,
            reason: "must be positive",
        });
    }
    Ok((
        4.0 * epsilon * sigma.powi(12),
        alpha * 4.0 * epsilon * sigma.powi(6),
    ))
}

/// 12-6 Lennard-Jones in prefactor form: `V = lj1 / r^12 - lj2 / r^6`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LennardJones {
    pub lj1: f64,
    pub lj2: f64,
}

impl LennardJones {
    pub fn new(epsilon: f64, sigma: f64) -> Self {
        Self {
            lj1: 4.0 * epsilon * sigma.powi(12),
            lj2: 4.0 * epsilon * sigma.powi(6),
        }
    }

    #[inline]
    fn raw(&self, r_sq: f64) -> (f64, f64) {
        let r2inv = 1.0 / r_sq;
        let r6inv = r2inv * r2inv * r2inv;
        let force_divr = r2inv * r6inv * (12.0 * self.lj1 * r6inv - 6.0 * self.lj2);
        let energy = r6inv * (self.lj1 * r6inv - self.lj2);
        (force_divr, energy)
    }
}

impl PairPotential for LennardJones {
    const NAME: &'static str = "lj";

    #[inline]
    fn evaluate(&self, r_sq: f64, _r_cut_sq: f64) -> (f64, f64) {
        self.raw(r_sq)
    }

    fn from_coeffs(coeffs: &HashMap<String, f64>) -> Result<Self, ParamError> {
        let (lj1, lj2) = lj_prefactors(coeffs, Self::NAME)?;
        Ok(Self { lj1, lj2 })
    }
}

/// Lennard-Jones with a linear term added so the force vanishes at the cutoff:
/// `V = V_lj(r) + (r - r_cut) * F_lj(r_cut)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceShiftedLennardJones {
    pub lj: LennardJones,
}

impl ForceShiftedLennardJones {
    pub fn new(epsilon: f64, sigma: f64) -> Self {
        Self {
            lj: LennardJones::new(epsilon, sigma),
        }
    }

    pub fn from_prefactors(lj1: f64, lj2: f64) -> Self {
        Self {
            lj: LennardJones { lj1, lj2 },
        }
    }
}

impl PairPotential for ForceShiftedLennardJones {
    const NAME: &'static str = "force-shifted-lj";

    #[inline]
    fn evaluate(&self, r_sq: f64, r_cut_sq: f64) -> (f64, f64) {
        let (force_divr, energy) = self.lj.raw(r_sq);
        let r = r_sq.sqrt();
        let r_cut = r_cut_sq.sqrt();
        let (force_divr_cut, _) = self.lj.raw(r_cut_sq);
        let force_cut = force_divr_cut * r_cut;
        (
            force_divr - force_cut / r,
            energy + (r - r_cut) * force_cut,
        )
    }

    fn from_coeffs(coeffs: &HashMap<String, f64>) -> Result<Self, ParamError> {
        let (lj1, lj2) = lj_prefactors(coeffs, Self::NAME)?;
        Ok(Self::from_prefactors(lj1, lj2))
    }
}

/// Screened Coulomb: `V = epsilon * exp(-kappa r) / r`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Yukawa {
    pub epsilon: f64,
    pub kappa: f64,
}

impl PairPotential for Yukawa {
    const NAME: &'static str = "yukawa";

    #[inline]
    fn evaluate(&self, r_sq: f64, _r_cut_sq: f64) -> (f64, f64) {
        let r = r_sq.sqrt();
        let energy = self.epsilon * (-self.kappa * r).exp() / r;
        let force_divr = energy * (1.0 + self.kappa * r) / r_sq;
        (force_divr, energy)
    }

    fn from_coeffs(coeffs: &HashMap<String, f64>) -> Result<Self, ParamError> {
        let kappa = coeff(coeffs, Self::NAME, "kappa")?;
        if kappa < 0.0 {
            return Err(ParamError::InvalidCoefficient {
                name: "kappa",
                value: kappa,
                reason: "must not be negative",
            });
        }
        Ok(Self {
            epsilon: coeff(coeffs, Self::NAME, "epsilon")?,
            kappa,
        })
    }
}

/// Parameters of one type pair as seen by the kernels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairEntry<P> {
    pub potential: P,
    pub r_cut_sq: f64,
    pub r_on_sq: f64,
}

/// Outcome of evaluating one pair inside the cutoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairEvaluation {
    pub force_divr: f64,
    pub energy: f64,
    /// The separation was below [`MIN_R_SQ`] and was floored.
    pub clamped: bool,
}

/// Evaluates a pair under the given shift policy.
///
/// Returns `None` when the pair lies at or beyond the cutoff or the cutoff is zero.
#[inline]
pub fn evaluate_pair<P: PairPotential>(
    entry: &PairEntry<P>,
    r_sq: f64,
    mode: ShiftMode,
) -> Option<PairEvaluation> {
    let r_cut_sq = entry.r_cut_sq;
    if r_cut_sq <= 0.0 || r_sq >= r_cut_sq {
        return None;
    }
    let clamped = r_sq < MIN_R_SQ;
    let r_sq = r_sq.max(MIN_R_SQ);
    let (mut force_divr, mut energy) = entry.potential.evaluate(r_sq, r_cut_sq);

    let r_on_sq = entry.r_on_sq;
    let xplor_degenerate = r_on_sq > r_cut_sq;
    match mode {
        ShiftMode::NoShift => {}
        ShiftMode::Xplor if !xplor_degenerate => {
            if r_sq >= r_on_sq {
                let (s, ds_dr_divr) = xplor_switch(r_sq, r_on_sq, r_cut_sq);
                force_divr = s * force_divr - ds_dr_divr * energy;
                energy *= s;
            }
        }
        ShiftMode::Shift | ShiftMode::Xplor => {
            energy -= entry.potential.evaluate(r_cut_sq, r_cut_sq).1;
        }
    }

    Some(PairEvaluation {
        force_divr,
        energy,
        clamped,
    })
}

/// XPLOR switching function `S(r)` and `(dS/dr) / r` for `r_on <= r < r_cut`.
#[inline]
pub fn xplor_switch(r_sq: f64, r_on_sq: f64, r_cut_sq: f64) -> (f64, f64) {
    let rc2_minus_r2 = r_cut_sq - r_sq;
    let rc2_minus_ron2 = r_cut_sq - r_on_sq;
    let denom = rc2_minus_ron2 * rc2_minus_ron2 * rc2_minus_ron2;
    let s = rc2_minus_r2 * rc2_minus_r2 * (r_cut_sq + 2.0 * r_sq - 3.0 * r_on_sq) / denom;
    let ds_dr_divr = 12.0 * rc2_minus_r2 * (r_on_sq - r_sq) / denom;
    (s, ds_dr_divr)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    fn entry<P>(potential: P, r_cut: f64, r_on: f64) -> PairEntry<P> {
        PairEntry {
            potential,
            r_cut_sq: r_cut * r_cut,
            r_on_sq: r_on * r_on,
        }
    }

    fn energy_at<P: PairPotential>(e: &PairEntry<P>, r: f64, mode: ShiftMode) -> f64 {
        evaluate_pair(e, r * r, mode).map_or(0.0, |ev| ev.energy)
    }

    fn assert_force_matches_gradient<P: PairPotential>(e: &PairEntry<P>, r: f64, mode: ShiftMode) {
        let h = 1e-6;
        let numeric = -(energy_at(e, r + h, mode) - energy_at(e, r - h, mode)) / (2.0 * h);
        let analytic = evaluate_pair(e, r * r, mode).unwrap().force_divr * r;
        assert!(
            (numeric - analytic).abs() < 1e-6,
            "r = {r}: numeric {numeric} vs analytic {analytic}"
        );
    }

    #[test]
    fn lennard_jones_at_minimum_has_zero_force_and_negative_well_depth() {
        let lj = LennardJones::new(2.0, 1.0);
        let r_min_sq = 2f64.powf(1.0 / 3.0);
        let (force_divr, energy) = lj.evaluate(r_min_sq, 9.0);
        assert!(force_divr.abs() < 1e-12);
        assert!(f64_approx_equal(energy, -2.0));
    }

    #[test]
    fn force_shifted_lj_reproduces_reference_pair_values() {
        let fslj = entry(ForceShiftedLennardJones::new(1.0, 1.0), 1.5, 0.0);
        let no_shift = evaluate_pair(&fslj, 1.69, ShiftMode::NoShift).unwrap();
        let shift = evaluate_pair(&fslj, 1.69, ShiftMode::Shift).unwrap();

        assert!(f64_approx_equal(no_shift.force_divr * 1.3, -1.0819510987449876));
        assert!(f64_approx_equal(no_shift.energy * 0.5, -0.21270557412540803));
        assert!(f64_approx_equal(shift.force_divr, no_shift.force_divr));
        assert!(f64_approx_equal(shift.energy * 0.5, -0.05253727698612069));
    }

    #[test]
    fn shift_subtracts_raw_energy_at_cutoff() {
        let lj = entry(LennardJones::new(1.0, 1.0), 2.5, 0.0);
        let raw_cut = lj.potential.evaluate(6.25, 6.25).1;
        for r in [0.95, 1.2, 2.0, 2.49] {
            let diff = energy_at(&lj, r, ShiftMode::NoShift) - energy_at(&lj, r, ShiftMode::Shift);
            assert!(f64_approx_equal(diff, raw_cut));
        }
    }

    #[test]
    fn shifted_energy_vanishes_at_cutoff() {
        let lj = entry(LennardJones::new(1.0, 1.0), 2.5, 0.0);
        assert!(energy_at(&lj, 2.5 - 1e-9, ShiftMode::Shift).abs() < 1e-8);
        assert!(energy_at(&lj, 2.5 - 1e-9, ShiftMode::NoShift) < -1e-3);
    }

    #[test]
    fn pairs_beyond_cutoff_or_with_zero_cutoff_are_skipped() {
        let lj = entry(LennardJones::new(1.0, 1.0), 2.5, 0.0);
        assert!(evaluate_pair(&lj, 6.25, ShiftMode::NoShift).is_none());
        assert!(evaluate_pair(&lj, 7.0, ShiftMode::Shift).is_none());
        let disabled = entry(LennardJones::new(1.0, 1.0), 0.0, 0.0);
        assert!(evaluate_pair(&disabled, 0.5, ShiftMode::NoShift).is_none());
    }

    #[test]
    fn xplor_leaves_pairs_inside_r_on_untouched() {
        let lj = entry(LennardJones::new(1.0, 1.0), 2.5, 2.0);
        let raw = evaluate_pair(&lj, 1.44, ShiftMode::NoShift).unwrap();
        let smoothed = evaluate_pair(&lj, 1.44, ShiftMode::Xplor).unwrap();
        assert_eq!(raw, smoothed);
    }

    #[test]
    fn xplor_switch_is_continuous_at_both_ends() {
        let (s_on, ds_on) = xplor_switch(4.0, 4.0, 6.25);
        assert!(f64_approx_equal(s_on, 1.0));
        assert!(f64_approx_equal(ds_on, 0.0));
        let (s_cut, ds_cut) = xplor_switch(6.25, 4.0, 6.25);
        assert!(f64_approx_equal(s_cut, 0.0));
        assert!(f64_approx_equal(ds_cut, 0.0));

        let lj = entry(LennardJones::new(1.0, 1.0), 2.5, 2.0);
        assert!(energy_at(&lj, 2.5 - 1e-7, ShiftMode::Xplor).abs() < 1e-10);
        let f_near_cut = evaluate_pair(&lj, (2.5f64 - 1e-9).powi(2), ShiftMode::Xplor).unwrap();
        assert!(f_near_cut.force_divr.abs() < 1e-8);
    }

    #[test]
    fn xplor_with_r_on_beyond_cutoff_behaves_like_shift() {
        let lj = entry(LennardJones::new(1.0, 1.0), 2.5, 3.0);
        for r in [1.0, 2.2, 2.45] {
            let shifted = evaluate_pair(&lj, r * r, ShiftMode::Shift).unwrap();
            let xplor = evaluate_pair(&lj, r * r, ShiftMode::Xplor).unwrap();
            assert_eq!(shifted, xplor);
        }
    }

    #[test]
    fn forces_match_energy_gradient_in_every_mode() {
        let lj = entry(LennardJones::new(1.0, 1.0), 2.5, 2.0);
        let fslj = entry(ForceShiftedLennardJones::new(1.5, 0.9), 2.5, 2.0);
        let yukawa = entry(Yukawa { epsilon: 2.0, kappa: 0.5 }, 3.0, 2.0);
        for mode in [ShiftMode::NoShift, ShiftMode::Shift, ShiftMode::Xplor] {
            for r in [0.9, 1.1, 1.7, 2.1, 2.3, 2.45] {
                assert_force_matches_gradient(&lj, r, mode);
                assert_force_matches_gradient(&fslj, r, mode);
                assert_force_matches_gradient(&yukawa, r, mode);
            }
        }
    }

    #[test]
    fn overlapping_particles_give_finite_clamped_result() {
        let lj = entry(LennardJones::new(1.0, 1.0), 2.5, 0.0);
        let ev = evaluate_pair(&lj, 0.0, ShiftMode::Shift).unwrap();
        assert!(ev.clamped);
        assert!(ev.force_divr.is_finite());
        assert!(ev.energy.is_finite());

        let yukawa = entry(Yukawa { epsilon: 1.0, kappa: 1.0 }, 2.5, 0.0);
        let ev = evaluate_pair(&yukawa, 0.0, ShiftMode::NoShift).unwrap();
        assert!(ev.force_divr.is_finite() && ev.energy.is_finite());
    }

    #[test]
    fn from_coeffs_builds_prefactors_and_reports_missing_names() {
        let coeffs = HashMap::from([
            ("epsilon".to_string(), 1.0),
            ("sigma".to_string(), 1.0),
            ("alpha".to_string(), 0.5),
        ]);
        let lj = LennardJones::from_coeffs(&coeffs).unwrap();
        assert_eq!(lj, LennardJones { lj1: 4.0, lj2: 2.0 });

        let missing = HashMap::from([("epsilon".to_string(), 1.0)]);
        assert_eq!(
            ForceShiftedLennardJones::from_coeffs(&missing),
            Err(ParamError::MissingCoefficient {
                potential: "force-shifted-lj",
                name: "sigma"
            })
        );
    }

    #[test]
    fn from_coeffs_rejects_invalid_values() {
        let coeffs = HashMap::from([("epsilon".to_string(), 1.0), ("sigma".to_string(), -1.0)]);
        assert!(matches!(
            LennardJones::from_coeffs(&coeffs),
            Err(ParamError::InvalidCoefficient { name: "sigma", .. })
        ));
        let coeffs = HashMap::from([("epsilon".to_string(), 1.0), ("kappa".to_string(), -1.0)]);
        assert!(matches!(
            Yukawa::from_coeffs(&coeffs),
            Err(ParamError::InvalidCoefficient { name: "kappa", .. })
        ));
    }

    #[test]
    fn shift_mode_displays_in_kebab_case() {
        assert_eq!(ShiftMode::NoShift.to_string(), "no-shift");
        assert_eq!(ShiftMode::Xplor.to_string(), "xplor");
    }
}
