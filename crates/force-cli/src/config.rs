use crate::cli::BenchArgs;
use crate::error::{CliError, Result};
use forcecore::core::forcefield::pair::ShiftMode;
use forcecore::core::variant::Variant;
use forcecore::engine::autotuner::SampleMode;
use forcecore::engine::config::{BenchmarkConfig, BenchmarkConfigBuilder, TunerConfig};
use forcecore::engine::device::ExecutionMode;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Values used when neither the command line nor the config file sets a parameter.
struct DefaultsConfig {
    n_particles: usize,
    density: f64,
    n_chains: usize,
    chain_length: usize,
    seed: u64,
    steps: u64,
    r_cut: f64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            n_particles: 1000,
            density: 0.8,
            n_chains: 10,
            chain_length: 8,
            seed: 42,
            steps: 100,
            r_cut: 2.5,
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileSystemConfig {
    pub n_particles: Option<usize>,
    pub density: Option<f64>,
    pub n_chains: Option<usize>,
    pub chain_length: Option<usize>,
    pub seed: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileRunConfig {
    pub steps: Option<u64>,
    pub displacement: Option<f64>,
    pub r_buff: Option<f64>,
    pub r_cut: Option<f64>,
    pub shift_mode: Option<ShiftMode>,
    pub tolerance: Option<f64>,
    pub temperature: Option<Variant>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileTunerConfig {
    pub enabled: Option<bool>,
    pub period: Option<u32>,
    pub nsamples: Option<usize>,
    pub mode: Option<SampleMode>,
    pub block_sizes: Option<Vec<u32>>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    pub forcefield: Option<PathBuf>,
    pub modes: Option<Vec<ExecutionMode>>,
    pub device_workers: Option<usize>,
    pub system: Option<FileSystemConfig>,
    pub run: Option<FileRunConfig>,
    pub tuner: Option<FileTunerConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })?;

        // A relative force-field path is relative to the config file.
        if let (Some(ff), Some(dir)) = (config.forcefield.as_mut(), path.parent()) {
            if ff.is_relative() {
                *ff = dir.join(&*ff);
            }
        }
        Ok(config)
    }

    /// Command-line values win over file values, which win over the defaults.
    pub fn merge_with_cli(mut self, args: &BenchArgs, threads: Option<usize>) -> Result<BenchmarkConfig> {
        let defaults = DefaultsConfig::default();
        let system = self.system.take().unwrap_or_default();
        let run = self.run.take().unwrap_or_default();
        let tuner_file = self.tuner.take().unwrap_or_default();

        let mut builder = BenchmarkConfigBuilder::new()
            .n_particles(
                args.particles
                    .or(system.n_particles)
                    .unwrap_or(defaults.n_particles),
            )
            .density(args.density.or(system.density).unwrap_or(defaults.density))
            .chains(
                args.chains.or(system.n_chains).unwrap_or(defaults.n_chains),
                args.chain_length
                    .or(system.chain_length)
                    .unwrap_or(defaults.chain_length),
            )
            .seed(args.seed.or(system.seed).unwrap_or(defaults.seed))
            .steps(args.steps.or(run.steps).unwrap_or(defaults.steps))
            .default_r_cut(args.r_cut.or(run.r_cut).unwrap_or(defaults.r_cut));

        if let Some(path) = args.forcefield.clone().or(self.forcefield) {
            builder = builder.forcefield_path(path);
        }

        let modes: Vec<ExecutionMode> = if args.modes.is_empty() {
            self.modes.unwrap_or_default()
        } else {
            args.modes.iter().map(|&m| m.into()).collect()
        };
        if !modes.is_empty() {
            builder = builder.modes(modes);
        }

        if let Some(workers) = threads.or(self.device_workers) {
            builder = builder.device_workers(workers);
        }
        if let Some(r_buff) = args.r_buff.or(run.r_buff) {
            builder = builder.r_buff(r_buff);
        }
        if let Some(displacement) = run.displacement {
            builder = builder.displacement(displacement);
        }
        if let Some(mode) = args.shift_mode.map(ShiftMode::from).or(run.shift_mode) {
            builder = builder.shift_mode(mode);
        }
        if let Some(target) = args.temperature.map(Variant::constant).or(run.temperature) {
            builder = builder.temperature(target);
        }
        if let Some(tolerance) = args.tolerance.or(run.tolerance) {
            builder = builder.tolerance(tolerance);
        }

        let base = TunerConfig::default();
        let tuner = TunerConfig {
            enabled: !args.no_tune && tuner_file.enabled.unwrap_or(base.enabled),
            period: tuner_file.period.unwrap_or(base.period),
            nsamples: tuner_file.nsamples.unwrap_or(base.nsamples),
            mode: tuner_file.mode.unwrap_or(base.mode),
            block_sizes: tuner_file.block_sizes.or(base.block_sizes),
        };
        builder = builder.tuner(tuner);

        Ok(builder.build()?)
    }
}

pub fn build_config(args: &BenchArgs, threads: Option<usize>) -> Result<BenchmarkConfig> {
    let file_config = match &args.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };
    file_config.merge_with_cli(args, threads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{ModeArg, ShiftArg};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_apply_without_file_or_flags() {
        let config = build_config(&BenchArgs::default(), None).unwrap();
        assert_eq!(config.system.n_particles, 1000);
        assert_eq!(config.system.n_chains, 10);
        assert_eq!(config.run.steps, 100);
        assert_eq!(config.modes, vec![ExecutionMode::Cpu, ExecutionMode::Gpu]);
        assert!(config.tuner.enabled);
        assert!(config.forcefield_path.is_none());
    }

    #[test]
    fn file_values_are_read_and_cli_overrides_them() {
        let file = write_config(
            r#"
            forcefield = "ff.toml"
            modes = ["gpu"]
            device-workers = 2

            [system]
            n-particles = 300
            density = 0.5
            seed = 9

            [run]
            steps = 20
            shift-mode = "shift"
            temperature = { kind = "ramp", a = 1.0, b = 2.0, t-start = 0, t-ramp = 10 }

            [tuner]
            period = 50
            block-sizes = [32, 64]
            mode = "average"
            "#,
        );
        let args = BenchArgs {
            config: Some(file.path().to_path_buf()),
            particles: Some(400),
            modes: vec![ModeArg::Cpu],
            shift_mode: Some(ShiftArg::Xplor),
            ..Default::default()
        };

        let config = build_config(&args, Some(3)).unwrap();
        assert_eq!(config.system.n_particles, 400);
        assert_eq!(config.system.density, 0.5);
        assert_eq!(config.system.seed, 9);
        assert_eq!(config.run.steps, 20);
        assert_eq!(config.run.shift_mode, Some(ShiftMode::Xplor));
        assert!(matches!(config.run.temperature, Some(Variant::Ramp { .. })));
        assert_eq!(config.modes, vec![ExecutionMode::Cpu]);
        assert_eq!(config.device_workers, 3);
        assert_eq!(config.tuner.period, 50);
        assert_eq!(config.tuner.mode, SampleMode::Average);
        assert_eq!(config.tuner.block_sizes, Some(vec![32, 64]));
        let ff = config.forcefield_path.unwrap();
        assert_eq!(ff, file.path().parent().unwrap().join("ff.toml"));
    }

    #[test]
    fn no_tune_flag_disables_the_tuner() {
        let file = write_config("[tuner]\nenabled = true\n");
        let args = BenchArgs {
            config: Some(file.path().to_path_buf()),
            no_tune: true,
            ..Default::default()
        };
        assert!(!build_config(&args, None).unwrap().tuner.enabled);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let file = write_config("[run]\nstep = 3\n");
        let args = BenchArgs {
            config: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        assert!(matches!(
            build_config(&args, None),
            Err(CliError::FileParsing { .. })
        ));
    }

    #[test]
    fn invalid_values_surface_as_config_errors() {
        let args = BenchArgs {
            density: Some(-1.0),
            ..Default::default()
        };
        assert!(matches!(build_config(&args, None), Err(CliError::Config(_))));
    }
}
