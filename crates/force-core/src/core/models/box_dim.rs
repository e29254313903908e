use nalgebra::{Point3, Vector3};

/// Orthorhombic simulation box centred on the origin, with per-axis periodicity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxDim {
    lengths: Vector3<f64>,
    periodic: [bool; 3],
}

impl BoxDim {
    /// Creates a fully periodic box with the given edge lengths.
    pub fn new(lx: f64, ly: f64, lz: f64) -> Self {
        Self {
            lengths: Vector3::new(lx, ly, lz),
            periodic: [true; 3],
        }
    }

    pub fn cube(length: f64) -> Self {
        Self::new(length, length, length)
    }

    pub fn with_periodic(mut self, periodic: [bool; 3]) -> Self {
        self.periodic = periodic;
        self
    }

    pub fn lengths(&self) -> Vector3<f64> {
        self.lengths
    }

    pub fn periodic(&self) -> [bool; 3] {
        self.periodic
    }

    pub fn volume(&self) -> f64 {
        self.lengths.x * self.lengths.y * self.lengths.z
    }

    /// Applies the minimum-image convention to a displacement vector.
    ///
    /// Each periodic component is wrapped into `[-L/2, L/2)`; non-periodic
    /// components are returned unchanged.
    #[inline]
    pub fn min_image(&self, mut d: Vector3<f64>) -> Vector3<f64> {
        for axis in 0..3 {
            if self.periodic[axis] {
                let l = self.lengths[axis];
                d[axis] -= l * (d[axis] / l + 0.5).floor();
            }
        }
        d
    }

    /// Folds a position back into the box along every periodic axis.
    pub fn wrap(&self, p: Point3<f64>) -> Point3<f64> {
        Point3::from(self.min_image(p.coords))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-12;

    #[test]
    fn min_image_leaves_short_displacements_untouched() {
        let b = BoxDim::cube(10.0);
        let d = Vector3::new(1.0, -2.0, 4.9);
        assert!((b.min_image(d) - d).norm() < TOLERANCE);
    }

    #[test]
    fn min_image_wraps_long_displacements() {
        let b = BoxDim::new(10.0, 20.0, 30.0);
        let d = b.min_image(Vector3::new(9.0, -15.0, 31.0));
        assert!((d - Vector3::new(-1.0, 5.0, 1.0)).norm() < TOLERANCE);
    }

    #[test]
    fn min_image_half_box_maps_to_lower_bound() {
        let b = BoxDim::cube(4.0);
        assert_eq!(b.min_image(Vector3::new(2.0, -2.0, 0.0)).x, -2.0);
        assert_eq!(b.min_image(Vector3::new(2.0, -2.0, 0.0)).y, -2.0);
    }

    #[test]
    fn non_periodic_axes_are_not_wrapped() {
        let b = BoxDim::cube(4.0).with_periodic([true, true, false]);
        let d = b.min_image(Vector3::new(3.0, 3.0, 3.0));
        assert!((d - Vector3::new(-1.0, -1.0, 3.0)).norm() < TOLERANCE);
    }

    #[test]
    fn wrap_folds_positions_into_box() {
        let b = BoxDim::cube(10.0);
        let p = b.wrap(Point3::new(6.0, -7.0, 0.5));
        assert!((p - Point3::new(-4.0, 3.0, 0.5)).norm() < TOLERANCE);
        assert_eq!(b.volume(), 1000.0);
    }
}
