use nalgebra::Vector3;
use std::ops::{Add, AddAssign, Mul};

/// Force and potential energy attributed to one particle by one compute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceRecord {
    pub force: Vector3<f64>,
    pub energy: f64,
}

impl ForceRecord {
    pub fn new(force: Vector3<f64>, energy: f64) -> Self {
        Self { force, energy }
    }
}

impl Default for ForceRecord {
    fn default() -> Self {
        Self {
            force: Vector3::zeros(),
            energy: 0.0,
        }
    }
}

impl AddAssign for ForceRecord {
    fn add_assign(&mut self, rhs: Self) {
        self.force += rhs.force;
        self.energy += rhs.energy;
    }
}

/// Symmetric virial tensor stored as `[xx, xy, xz, yy, yz, zz]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Virial(pub [f64; 6]);

impl Virial {
    pub const ZERO: Self = Self([0.0; 6]);

    /// Upper triangle of the outer product `dx ⊗ f`.
    #[inline]
    pub fn outer(dx: &Vector3<f64>, f: &Vector3<f64>) -> Self {
        Self([
            dx.x * f.x,
            dx.x * f.y,
            dx.x * f.z,
            dx.y * f.y,
            dx.y * f.z,
            dx.z * f.z,
        ])
    }

    #[inline]
    pub fn trace(&self) -> f64 {
        self.0[0] + self.0[3] + self.0[5]
    }

    pub fn max_abs_diff(&self, other: &Self) -> f64 {
        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }
}

impl Add for Virial {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}

impl AddAssign for Virial {
    fn add_assign(&mut self, rhs: Self) {
        for (a, b) in self.0.iter_mut().zip(rhs.0) {
            *a += b;
        }
    }
}

impl Mul<f64> for Virial {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self::Output {
        Self(self.0.map(|v| v * rhs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outer_fills_upper_triangle() {
        let v = Virial::outer(&Vector3::new(1.0, 2.0, 3.0), &Vector3::new(4.0, 5.0, 6.0));
        assert_eq!(v.0, [4.0, 5.0, 6.0, 10.0, 12.0, 18.0]);
        assert_eq!(v.trace(), 32.0);
    }

    #[test]
    fn add_and_scale_are_componentwise() {
        let a = Virial([1.0; 6]);
        let b = Virial([0.5, 1.0, 1.5, 2.0, 2.5, 3.0]);
        assert_eq!((a + b) * 2.0, Virial([3.0, 4.0, 5.0, 6.0, 7.0, 8.0]));
    }

    #[test]
    fn force_record_accumulates() {
        let mut rec = ForceRecord::default();
        rec += ForceRecord::new(Vector3::new(1.0, 0.0, 0.0), 0.5);
        rec += ForceRecord::new(Vector3::new(0.0, -1.0, 0.0), 0.25);
        assert_eq!(rec.force, Vector3::new(1.0, -1.0, 0.0));
        assert_eq!(rec.energy, 0.75);
    }
}
