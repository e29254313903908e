use super::pair::ShiftMode;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParamError {
    #[error("Missing coefficient '{name}' for the {potential} potential")]
    MissingCoefficient {
        potential: &'static str,
        name: &'static str,
    },
    #[error("Invalid coefficient '{name}' = {value}: {reason}")]
    InvalidCoefficient {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },
    #[error("Unknown particle type '{0}' in coefficients")]
    UnknownType(String),
}

#[derive(Debug, Error)]
pub enum ParamLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
}

/// Per-type-pair storage with symmetric lookup: `get(a, b) == get(b, a)`.
#[derive(Debug, Clone, PartialEq)]
pub struct TypePairTable<T> {
    n_types: usize,
    entries: Vec<Option<T>>,
}

impl<T: Clone> TypePairTable<T> {
    pub fn new(n_types: usize) -> Self {
        Self {
            n_types,
            entries: vec![None; n_types * n_types],
        }
    }

    pub fn filled(n_types: usize, value: T) -> Self {
        Self {
            n_types,
            entries: vec![Some(value); n_types * n_types],
        }
    }

    pub fn n_types(&self) -> usize {
        self.n_types
    }

    /// Writes the value for both orderings of the pair.
    ///
    /// # Panics
    ///
    /// Panics if either type id is outside the table.
    pub fn set(&mut self, a: u32, b: u32, value: T) {
        let (a, b) = (a as usize, b as usize);
        assert!(a < self.n_types && b < self.n_types, "type id out of range");
        self.entries[a * self.n_types + b] = Some(value.clone());
        self.entries[b * self.n_types + a] = Some(value);
    }

    #[inline]
    pub fn get(&self, a: u32, b: u32) -> Option<&T> {
        let (a, b) = (a as usize, b as usize);
        if a >= self.n_types || b >= self.n_types {
            return None;
        }
        self.entries[a * self.n_types + b].as_ref()
    }

    /// Type pairs (with `a <= b`) that have no value yet.
    pub fn missing(&self) -> Vec<(u32, u32)> {
        (0..self.n_types as u32)
            .flat_map(|a| (a..self.n_types as u32).map(move |b| (a, b)))
            .filter(|&(a, b)| self.get(a, b).is_none())
            .collect()
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct PairCoeffEntry {
    pub a: String,
    pub b: String,
    pub r_cut: Option<f64>,
    pub r_on: Option<f64>,
    #[serde(flatten)]
    pub values: HashMap<String, f64>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "kebab-case")]
pub struct PairSection {
    #[serde(default)]
    pub shift_mode: ShiftMode,
    pub default_r_cut: Option<f64>,
    #[serde(default)]
    pub coeff: Vec<PairCoeffEntry>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum DihedralCoeff {
    Harmonic { k: f64, d: i32, n: u32 },
    Opls { k1: f64, k2: f64, k3: f64, k4: f64 },
}

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct DihedralSection {
    #[serde(default)]
    pub coeff: HashMap<String, DihedralCoeff>,
}

/// Coefficient file covering both interaction families.
///
/// ```toml
/// [pair]
/// shift-mode = "xplor"
///
/// [[pair.coeff]]
/// a = "A"
/// b = "B"
/// r-cut = 2.5
/// r-on = 2.0
/// epsilon = 1.0
/// sigma = 1.0
///
/// [dihedral.coeff.backbone]
/// k1 = 1.3
/// k2 = -0.05
/// k3 = 0.2
/// k4 = 0.0
/// ```
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct ForceFieldParams {
    #[serde(default)]
    pub pair: PairSection,
    #[serde(default)]
    pub dihedral: DihedralSection,
}

impl ForceFieldParams {
    pub fn load(path: &Path) -> Result<Self, ParamLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| ParamLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ParamLoadError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FULL_TOML: &str = r#"
        [pair]
        shift-mode = "xplor"
        default-r-cut = 3.0

        [[pair.coeff]]
        a = "A"
        b = "B"
        r-cut = 2.5
        r-on = 2.0
        epsilon = 1.0
        sigma = 1

        [dihedral.coeff.backbone]
        k1 = 1.3
        k2 = -0.05
        k3 = 0.2
        k4 = 0.0

        [dihedral.coeff.side]
        k = 2.0
        d = -1
        n = 3
    "#;

    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn type_pair_table_is_symmetric() {
        let mut table = TypePairTable::new(3);
        table.set(0, 2, 1.5);
        assert_eq!(table.get(0, 2), Some(&1.5));
        assert_eq!(table.get(2, 0), Some(&1.5));
        assert_eq!(table.get(1, 1), None);
        assert_eq!(table.get(5, 0), None);
    }

    #[test]
    fn type_pair_table_lists_missing_pairs_once() {
        let mut table = TypePairTable::new(2);
        table.set(1, 0, 'x');
        assert_eq!(table.missing(), vec![(0, 0), (1, 1)]);
        assert!(TypePairTable::filled(2, 'y').missing().is_empty());
    }

    #[test]
    fn load_parses_pair_and_dihedral_sections() {
        let file = write_temp(FULL_TOML);
        let params = ForceFieldParams::load(file.path()).unwrap();

        assert_eq!(params.pair.shift_mode, ShiftMode::Xplor);
        assert_eq!(params.pair.default_r_cut, Some(3.0));
        let entry = &params.pair.coeff[0];
        assert_eq!((entry.a.as_str(), entry.b.as_str()), ("A", "B"));
        assert_eq!(entry.r_cut, Some(2.5));
        assert_eq!(entry.r_on, Some(2.0));
        assert_eq!(entry.values.get("epsilon"), Some(&1.0));
        assert_eq!(entry.values.get("sigma"), Some(&1.0));
        assert!(!entry.values.contains_key("r-cut"));

        assert_eq!(
            params.dihedral.coeff["backbone"],
            DihedralCoeff::Opls {
                k1: 1.3,
                k2: -0.05,
                k3: 0.2,
                k4: 0.0
            }
        );
        assert_eq!(
            params.dihedral.coeff["side"],
            DihedralCoeff::Harmonic { k: 2.0, d: -1, n: 3 }
        );
    }

    #[test]
    fn load_defaults_missing_sections() {
        let file = write_temp("");
        let params = ForceFieldParams::load(file.path()).unwrap();
        assert_eq!(params, ForceFieldParams::default());
        assert_eq!(params.pair.shift_mode, ShiftMode::NoShift);
    }

    #[test]
    fn load_fails_for_missing_file() {
        let result = ForceFieldParams::load(Path::new("no/such/coeffs.toml"));
        assert!(matches!(result, Err(ParamLoadError::Io { .. })));
    }

    #[test]
    fn load_fails_for_malformed_toml() {
        let file = write_temp("[pair\nshift-mode = ");
        let result = ForceFieldParams::load(file.path());
        assert!(matches!(result, Err(ParamLoadError::Toml { .. })));
    }

    #[test]
    fn load_rejects_unknown_shift_mode() {
        let file = write_temp("[pair]\nshift-mode = \"smooth\"\n");
        let result = ForceFieldParams::load(file.path());
        assert!(matches!(result, Err(ParamLoadError::Toml { .. })));
    }
}
