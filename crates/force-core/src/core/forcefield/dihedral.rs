//! Periodic torsion potential and its four-body force distribution.
//!
//! For a dihedral `i-j-k-l` the bond vectors are `r_ij = x_i - x_j`, `r_kj = x_k - x_j`
//! and `r_kl = x_k - x_l`, each minimum-imaged. With plane normals `m = r_ij × r_kj` and
//! `n = r_kj × r_kl` the angle is
//!
//! ```text
//! phi = atan2(|r_kj| (r_ij · n), m · n)      phi in (-pi, pi]
//! ```
//!
//! so the cis conformation is `0` and trans is `±pi`.

use super::params::{DihedralCoeff, ParamError};
use super::term::Virial;
use crate::core::models::box_dim::BoxDim;
use nalgebra::{Point3, Vector3};
use serde::Deserialize;

/// Relative floor on `|m|^2` and `|n|^2` below which a dihedral plane is treated as undefined.
const DEGENERATE_EPS: f64 = 1e-12;

/// One harmonic of `V(phi) = ½ k (1 + d cos(n phi))`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CosineTerm {
    pub k: f64,
    pub n: u32,
    pub d: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DihedralParams {
    terms: Vec<CosineTerm>,
}

impl DihedralParams {
    pub fn new(terms: Vec<CosineTerm>) -> Self {
        Self { terms }
    }

    /// Single-term form with amplitude `k`, phase sign `d` and multiplicity `n`.
    pub fn harmonic(k: f64, d: i32, n: u32) -> Result<Self, ParamError> {
        if d != 1 && d != -1 {
            return Err(ParamError::InvalidCoefficient {
                name: "d",
                value: d as f64,
                reason: "phase sign must be +1 or -1",
            });
        }
        Ok(Self::new(vec![CosineTerm {
            k,
            n,
            d: d as f64,
        }]))
    }

    /// OPLS form `½[k1(1+cos φ) + k2(1-cos 2φ) + k3(1+cos 3φ) + k4(1-cos 4φ)]`.
    pub fn opls(k1: f64, k2: f64, k3: f64, k4: f64) -> Self {
        Self::new(vec![
            CosineTerm { k: k1, n: 1, d: 1.0 },
            CosineTerm { k: k2, n: 2, d: -1.0 },
            CosineTerm { k: k3, n: 3, d: 1.0 },
            CosineTerm { k: k4, n: 4, d: -1.0 },
        ])
    }

    pub fn from_coeff(coeff: &DihedralCoeff) -> Result<Self, ParamError> {
        match *coeff {
            DihedralCoeff::Harmonic { k, d, n } => Self::harmonic(k, d, n),
            DihedralCoeff::Opls { k1, k2, k3, k4 } => Ok(Self::opls(k1, k2, k3, k4)),
        }
    }

    pub fn terms(&self) -> &[CosineTerm] {
        &self.terms
    }

    pub fn energy(&self, phi: f64) -> f64 {
        self.terms
            .iter()
            .map(|t| 0.5 * t.k * (1.0 + t.d * (t.n as f64 * phi).cos()))
            .sum()
    }

    /// `dV/dphi`.
    pub fn derivative(&self, phi: f64) -> f64 {
        self.terms
            .iter()
            .map(|t| {
                let n = t.n as f64;
                -0.5 * t.k * t.d * n * (n * phi).sin()
            })
            .sum()
    }
}

/// Forces on the four members (in tuple order), total energy and virial of one dihedral.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DihedralEvaluation {
    pub forces: [Vector3<f64>; 4],
    pub energy: f64,
    pub virial: Virial,
    pub phi: f64,
    /// A plane normal collapsed below the numerical floor; forces were zeroed.
    pub degenerate: bool,
}

pub fn dihedral_angle(r_ij: &Vector3<f64>, r_kj: &Vector3<f64>, r_kl: &Vector3<f64>) -> f64 {
    let m = r_ij.cross(r_kj);
    let n = r_kj.cross(r_kl);
    (r_kj.norm() * r_ij.dot(&n)).atan2(m.dot(&n))
}

pub fn evaluate_dihedral(
    params: &DihedralParams,
    x: [Point3<f64>; 4],
    box_dim: &BoxDim,
) -> DihedralEvaluation {
    let r_ij = box_dim.min_image(x[0] - x[1]);
    let r_kj = box_dim.min_image(x[2] - x[1]);
    let r_kl = box_dim.min_image(x[2] - x[3]);

    let m = r_ij.cross(&r_kj);
    let n = r_kj.cross(&r_kl);
    let iprm = m.norm_squared();
    let iprn = n.norm_squared();
    let nrkj2 = r_kj.norm_squared();
    let nrkj = nrkj2.sqrt();

    let phi = (nrkj * r_ij.dot(&n)).atan2(m.dot(&n));
    let energy = params.energy(phi);

    let floor = nrkj2 * DEGENERATE_EPS;
    if nrkj2 < f64::MIN_POSITIVE || iprm < floor || iprn < floor {
        return DihedralEvaluation {
            forces: [Vector3::zeros(); 4],
            energy,
            virial: Virial::ZERO,
            phi,
            degenerate: true,
        };
    }

    let ddphi = params.derivative(phi);
    let f_i = m * (-ddphi * nrkj / iprm);
    let f_l = n * (ddphi * nrkj / iprn);
    let p = r_ij.dot(&r_kj) / nrkj2;
    let q = r_kl.dot(&r_kj) / nrkj2;
    let svec = f_i * p - f_l * q;
    let f_j = f_i - svec;
    let f_k = f_l + svec;

    let forces = [f_i, -f_j, -f_k, f_l];
    let r_lj = r_kj - r_kl;
    let virial =
        Virial::outer(&r_ij, &forces[0]) + Virial::outer(&r_kj, &forces[2]) + Virial::outer(&r_lj, &forces[3]);

    DihedralEvaluation {
        forces,
        energy,
        virial,
        phi,
        degenerate: false,
    }
}
