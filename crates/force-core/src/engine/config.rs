use super::autotuner::SampleMode;
use super::device::ExecutionMode;
use crate::core::forcefield::pair::ShiftMode;
use crate::core::variant::Variant;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{name}': {reason}")]
    InvalidValue {
        name: &'static str,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TunerConfig {
    pub enabled: bool,
    pub period: u32,
    pub nsamples: usize,
    pub mode: SampleMode,
    /// Candidate block sizes; `None` uses every size the device accepts.
    pub block_sizes: Option<Vec<u32>>,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            period: 100_000,
            nsamples: 5,
            mode: SampleMode::Median,
            block_sizes: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SystemConfig {
    pub n_particles: usize,
    pub density: f64,
    pub chain_length: usize,
    pub n_chains: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub steps: u64,
    pub displacement: f64,
    pub r_buff: f64,
    pub default_r_cut: f64,
    pub shift_mode: Option<ShiftMode>,
    pub temperature: Option<Variant>,
    pub tolerance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkConfig {
    pub forcefield_path: Option<PathBuf>,
    pub modes: Vec<ExecutionMode>,
    pub device_workers: usize,
    pub system: SystemConfig,
    pub run: RunConfig,
    pub tuner: TunerConfig,
}

#[derive(Default)]
pub struct BenchmarkConfigBuilder {
    forcefield_path: Option<PathBuf>,
    modes: Option<Vec<ExecutionMode>>,
    device_workers: Option<usize>,
    n_particles: Option<usize>,
    density: Option<f64>,
    chain_length: Option<usize>,
    n_chains: Option<usize>,
    seed: Option<u64>,
    steps: Option<u64>,
    displacement: Option<f64>,
    r_buff: Option<f64>,
    default_r_cut: Option<f64>,
    shift_mode: Option<ShiftMode>,
    temperature: Option<Variant>,
    tolerance: Option<f64>,
    tuner: Option<TunerConfig>,
}

impl BenchmarkConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forcefield_path(mut self, path: PathBuf) -> Self {
        self.forcefield_path = Some(path);
        self
    }
    pub fn modes(mut self, modes: Vec<ExecutionMode>) -> Self {
        self.modes = Some(modes);
        self
    }
    pub fn device_workers(mut self, workers: usize) -> Self {
        self.device_workers = Some(workers);
        self
    }
    pub fn n_particles(mut self, n: usize) -> Self {
        self.n_particles = Some(n);
        self
    }
    pub fn density(mut self, density: f64) -> Self {
        self.density = Some(density);
        self
    }
    pub fn chains(mut self, n_chains: usize, chain_length: usize) -> Self {
        self.n_chains = Some(n_chains);
        self.chain_length = Some(chain_length);
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn steps(mut self, steps: u64) -> Self {
        self.steps = Some(steps);
        self
    }
    pub fn displacement(mut self, displacement: f64) -> Self {
        self.displacement = Some(displacement);
        self
    }
    pub fn r_buff(mut self, r_buff: f64) -> Self {
        self.r_buff = Some(r_buff);
        self
    }
    pub fn default_r_cut(mut self, r_cut: f64) -> Self {
        self.default_r_cut = Some(r_cut);
        self
    }
    pub fn shift_mode(mut self, mode: ShiftMode) -> Self {
        self.shift_mode = Some(mode);
        self
    }
    pub fn temperature(mut self, target: Variant) -> Self {
        self.temperature = Some(target);
        self
    }
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }
    pub fn tuner(mut self, tuner: TunerConfig) -> Self {
        self.tuner = Some(tuner);
        self
    }

    pub fn build(self) -> Result<BenchmarkConfig, ConfigError> {
        let n_particles = self
            .n_particles
            .ok_or(ConfigError::MissingParameter("n_particles"))?;
        let density = self.density.ok_or(ConfigError::MissingParameter("density"))?;
        if density <= 0.0 {
            return Err(ConfigError::InvalidValue {
                name: "density",
                reason: format!("must be positive, got {density}"),
            });
        }
        let chain_length = self.chain_length.unwrap_or(4);
        let n_chains = self.n_chains.unwrap_or(0);
        if n_chains > 0 && chain_length < 4 {
            return Err(ConfigError::InvalidValue {
                name: "chain_length",
                reason: "chains need at least four particles to carry a dihedral".to_string(),
            });
        }
        if n_chains * chain_length > n_particles {
            return Err(ConfigError::InvalidValue {
                name: "n_chains",
                reason: format!(
                    "{n_chains} chains of {chain_length} do not fit in {n_particles} particles"
                ),
            });
        }

        let modes = self
            .modes
            .unwrap_or_else(|| vec![ExecutionMode::Cpu, ExecutionMode::Gpu]);
        if modes.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "modes",
                reason: "at least one execution mode is required".to_string(),
            });
        }

        let default_r_cut = self
            .default_r_cut
            .ok_or(ConfigError::MissingParameter("default_r_cut"))?;
        if default_r_cut <= 0.0 {
            return Err(ConfigError::InvalidValue {
                name: "default_r_cut",
                reason: format!("must be positive, got {default_r_cut}"),
            });
        }
        let r_buff = self.r_buff.unwrap_or(0.4);
        if r_buff < 0.0 {
            return Err(ConfigError::InvalidValue {
                name: "r_buff",
                reason: format!("must not be negative, got {r_buff}"),
            });
        }

        let tuner = self.tuner.unwrap_or_default();
        if tuner.block_sizes.as_ref().is_some_and(|b| b.is_empty()) {
            return Err(ConfigError::InvalidValue {
                name: "block_sizes",
                reason: "candidate list is empty".to_string(),
            });
        }

        Ok(BenchmarkConfig {
            forcefield_path: self.forcefield_path,
            modes,
            device_workers: self.device_workers.unwrap_or(0),
            system: SystemConfig {
                n_particles,
                density,
                chain_length,
                n_chains,
                seed: self.seed.unwrap_or(0),
            },
            run: RunConfig {
                steps: self.steps.ok_or(ConfigError::MissingParameter("steps"))?,
                displacement: self.displacement.unwrap_or(0.01),
                r_buff,
                default_r_cut,
                shift_mode: self.shift_mode,
                temperature: self.temperature,
                tolerance: self.tolerance.unwrap_or(1e-5),
            },
            tuner,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> BenchmarkConfigBuilder {
        BenchmarkConfigBuilder::new()
            .n_particles(64)
            .density(0.5)
            .default_r_cut(2.5)
            .steps(10)
    }

    #[test]
    fn build_applies_defaults() {
        let config = minimal().build().unwrap();
        assert_eq!(config.modes, vec![ExecutionMode::Cpu, ExecutionMode::Gpu]);
        assert_eq!(config.system.n_chains, 0);
        assert_eq!(config.run.r_buff, 0.4);
        assert_eq!(config.run.tolerance, 1e-5);
        assert_eq!(config.tuner, TunerConfig::default());
        assert!(config.forcefield_path.is_none());
    }

    #[test]
    fn build_reports_first_missing_parameter() {
        let result = BenchmarkConfigBuilder::new().density(0.5).build();
        assert_eq!(result, Err(ConfigError::MissingParameter("n_particles")));
        let result = BenchmarkConfigBuilder::new()
            .n_particles(8)
            .density(0.5)
            .default_r_cut(2.5)
            .build();
        assert_eq!(result, Err(ConfigError::MissingParameter("steps")));
    }

    #[test]
    fn build_rejects_chains_that_do_not_fit() {
        let result = minimal().chains(20, 4).build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { name: "n_chains", .. })
        ));
        let result = minimal().chains(2, 3).build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { name: "chain_length", .. })
        ));
    }

    #[test]
    fn build_rejects_nonsensical_values() {
        assert!(matches!(
            minimal().density(-1.0).build(),
            Err(ConfigError::InvalidValue { name: "density", .. })
        ));
        assert!(matches!(
            minimal().modes(Vec::new()).build(),
            Err(ConfigError::InvalidValue { name: "modes", .. })
        ));
        let tuner = TunerConfig {
            block_sizes: Some(Vec::new()),
            ..TunerConfig::default()
        };
        assert!(matches!(
            minimal().tuner(tuner).build(),
            Err(ConfigError::InvalidValue { name: "block_sizes", .. })
        ));
    }
}
