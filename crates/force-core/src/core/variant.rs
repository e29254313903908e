use serde::Deserialize;

/// A scalar that varies with the timestep, used for thermostat targets.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Variant {
    Constant {
        value: f64,
    },
    /// Holds `a` until `t_start`, ramps linearly to `b` over `t_ramp` steps, then holds `b`.
    #[serde(rename_all = "kebab-case")]
    Ramp {
        a: f64,
        b: f64,
        t_start: u64,
        t_ramp: u64,
    },
    /// Repeats: hold `a` for `t_a`, ramp to `b` over `t_ab`, hold `b` for `t_b`, ramp back over `t_ba`.
    #[serde(rename_all = "kebab-case")]
    Cycle {
        a: f64,
        b: f64,
        t_start: u64,
        t_a: u64,
        t_ab: u64,
        t_b: u64,
        t_ba: u64,
    },
    /// Like [`Variant::Ramp`], but progresses as `x^power`.
    #[serde(rename_all = "kebab-case")]
    Power {
        a: f64,
        b: f64,
        power: f64,
        t_start: u64,
        t_ramp: u64,
    },
}

#[inline]
fn lerp(a: f64, b: f64, s: f64) -> f64 {
    a + (b - a) * s
}

impl Variant {
    pub fn constant(value: f64) -> Self {
        Self::Constant { value }
    }

    pub fn value(&self, timestep: u64) -> f64 {
        match *self {
            Self::Constant { value } => value,
            Self::Ramp {
                a,
                b,
                t_start,
                t_ramp,
            } => {
                if timestep < t_start {
                    a
                } else if timestep >= t_start.saturating_add(t_ramp) {
                    b
                } else {
                    lerp(a, b, (timestep - t_start) as f64 / t_ramp as f64)
                }
            }
            Self::Cycle {
                a,
                b,
                t_start,
                t_a,
                t_ab,
                t_b,
                t_ba,
            } => {
                let period = t_a.saturating_add(t_ab).saturating_add(t_b).saturating_add(t_ba);
                if timestep < t_start || period == 0 {
                    return a;
                }
                let offset = (timestep - t_start) % period;
                if offset < t_a {
                    a
                } else if offset < t_a.saturating_add(t_ab) {
                    lerp(a, b, (offset - t_a) as f64 / t_ab as f64)
                } else if offset < t_a.saturating_add(t_ab).saturating_add(t_b) {
                    b
                } else {
                    lerp(b, a, (offset - t_a - t_ab - t_b) as f64 / t_ba as f64)
                }
            }
            Self::Power {
                a,
                b,
                power,
                t_start,
                t_ramp,
            } => {
                if timestep < t_start {
                    a
                } else if timestep >= t_start.saturating_add(t_ramp) {
                    b
                } else {
                    // Evaluated on values shifted to be non-negative.
                    let offset = a.min(b).min(0.0);
                    let inv_a = (a - offset).powf(1.0 / power);
                    let inv_b = (b - offset).powf(1.0 / power);
                    let s = (timestep - t_start) as f64 / t_ramp as f64;
                    lerp(inv_a, inv_b, s).powf(power) + offset
                }
            }
        }
    }

    pub fn min(&self) -> f64 {
        match *self {
            Self::Constant { value } => value,
            Self::Ramp { a, b, .. } | Self::Cycle { a, b, .. } | Self::Power { a, b, .. } => a.min(b),
        }
    }

    pub fn max(&self) -> f64 {
        match *self {
            Self::Constant { value } => value,
            Self::Ramp { a, b, .. } | Self::Cycle { a, b, .. } | Self::Power { a, b, .. } => a.max(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    #[test]
    fn constant_is_the_same_at_every_step() {
        let v = Variant::constant(1.5);
        assert_eq!(v.value(0), 1.5);
        assert_eq!(v.value(1_000_000), 1.5);
    }

    #[test]
    fn ramp_holds_then_interpolates_then_holds() {
        let v = Variant::Ramp {
            a: 1.0,
            b: 3.0,
            t_start: 10,
            t_ramp: 20,
        };
        assert_eq!(v.value(5), 1.0);
        assert_eq!(v.value(10), 1.0);
        assert!(f64_approx_equal(v.value(20), 2.0));
        assert_eq!(v.value(30), 3.0);
        assert_eq!(v.value(100), 3.0);
    }

    #[test]
    fn cycle_repeats_its_period() {
        let v = Variant::Cycle {
            a: 0.0,
            b: 4.0,
            t_start: 5,
            t_a: 2,
            t_ab: 4,
            t_b: 2,
            t_ba: 4,
        };
        assert_eq!(v.value(0), 0.0);
        assert_eq!(v.value(6), 0.0);
        assert!(f64_approx_equal(v.value(9), 2.0));
        assert_eq!(v.value(12), 4.0);
        assert!(f64_approx_equal(v.value(15), 2.0));
        assert!(f64_approx_equal(v.value(9 + 12), v.value(9)));
    }

    #[test]
    fn power_reaches_endpoints_and_follows_the_power_law() {
        let v = Variant::Power {
            a: 2.0,
            b: 8.0,
            power: 0.5,
            t_start: 0,
            t_ramp: 10,
        };
        assert_eq!(v.value(0), 2.0);
        assert_eq!(v.value(10), 8.0);
        let expected = (4.0f64 + (64.0 - 4.0) * 0.5).powf(0.5);
        assert!(f64_approx_equal(v.value(5), expected));
    }

    #[test]
    fn schedules_near_the_end_of_the_timestep_range_do_not_overflow() {
        let ramp = Variant::Ramp {
            a: 1.0,
            b: 2.0,
            t_start: u64::MAX - 5,
            t_ramp: 100,
        };
        assert_eq!(ramp.value(10), 1.0);
        assert!(ramp.value(u64::MAX) > 1.0);

        let power = Variant::Power {
            a: 1.0,
            b: 4.0,
            power: 2.0,
            t_start: u64::MAX,
            t_ramp: u64::MAX,
        };
        assert_eq!(power.value(0), 1.0);

        let cycle = Variant::Cycle {
            a: 0.0,
            b: 1.0,
            t_start: 0,
            t_a: u64::MAX,
            t_ab: 10,
            t_b: 10,
            t_ba: 10,
        };
        assert_eq!(cycle.value(1_000), 0.0);
    }

    #[test]
    fn bounds_report_the_extreme_values() {
        let v = Variant::Ramp {
            a: 3.0,
            b: -1.0,
            t_start: 0,
            t_ramp: 1,
        };
        assert_eq!(v.min(), -1.0);
        assert_eq!(v.max(), 3.0);
    }

    #[test]
    fn deserializes_from_tagged_toml() {
        let v: Variant = toml::from_str("kind = \"ramp\"\na = 1.0\nb = 2.0\nt-start = 0\nt-ramp = 100\n").unwrap();
        assert_eq!(
            v,
            Variant::Ramp {
                a: 1.0,
                b: 2.0,
                t_start: 0,
                t_ramp: 100
            }
        );
    }
}
