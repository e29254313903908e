use super::autotuner::{Autotuner, TunerError};
use super::config::TunerConfig;
use super::device::{DeviceError, ExecutionConfiguration, ExecutionMode};
use super::error::ForceError;
use crate::core::buffer::AccessLocation;

const DEFAULT_NSAMPLES: usize = 5;
const DEFAULT_PERIOD: u32 = 100_000;

/// Where a compute runs. The accelerated side owns the tuner for its kernel launches.
#[derive(Debug)]
pub(crate) enum Backend {
    Host,
    Accelerated {
        exec: ExecutionConfiguration,
        tuner: Autotuner,
    },
}

impl Backend {
    pub(crate) fn accelerated(name: &str, exec: &ExecutionConfiguration) -> Result<Self, ForceError> {
        if !exec.is_gpu() {
            return Err(DeviceError::NotAccelerated(name.to_string()).into());
        }
        let tuner = Autotuner::new(name, exec.block_sizes(), DEFAULT_NSAMPLES, DEFAULT_PERIOD)?;
        Ok(Self::Accelerated {
            exec: exec.clone(),
            tuner,
        })
    }

    pub(crate) fn location(&self) -> AccessLocation {
        match self {
            Self::Host => AccessLocation::Host,
            Self::Accelerated { .. } => AccessLocation::Device,
        }
    }

    pub(crate) fn mode(&self) -> ExecutionMode {
        match self {
            Self::Host => ExecutionMode::Cpu,
            Self::Accelerated { .. } => ExecutionMode::Gpu,
        }
    }

    pub(crate) fn tuner(&self) -> Option<&Autotuner> {
        match self {
            Self::Host => None,
            Self::Accelerated { tuner, .. } => Some(tuner),
        }
    }

    pub(crate) fn set_autotuner_params(&mut self, enable: bool, period: u32) {
        if let Self::Accelerated { tuner, .. } = self {
            tuner.set_period(period);
            tuner.set_enabled(enable);
        }
    }

    /// Replaces the tuner with one built from `config`. A no-op on the host.
    pub(crate) fn configure_tuner(&mut self, name: &str, config: &TunerConfig) -> Result<(), TunerError> {
        if let Self::Accelerated { exec, tuner } = self {
            let candidates = config
                .block_sizes
                .clone()
                .unwrap_or_else(|| exec.block_sizes());
            let mut fresh = Autotuner::new(name, candidates, config.nsamples, config.period)?
                .with_mode(config.mode);
            fresh.set_enabled(config.enabled);
            *tuner = fresh;
        }
        Ok(())
    }
}
