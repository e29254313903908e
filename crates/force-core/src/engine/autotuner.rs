//! Online selection of kernel launch parameters from measured run times.
//!
//! The tuner walks through three states:
//!
//! - **Startup**: every call uses the next candidate until each one has `nsamples` timings.
//!   The optimum is then fixed and the tuner goes idle.
//! - **Idle**: the optimum is used; after `period` calls a scan begins.
//! - **Scanning**: one fresh sample is taken per candidate, replacing the oldest, and the
//!   optimum is recomputed.
//!
//! Timings come from a [`TimingSource`] bracketed by [`Autotuner::begin`] and
//! [`Autotuner::end`], or are supplied directly through [`Autotuner::record`].

use super::device::LaunchError;
use serde::Deserialize;
use std::fmt;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TunerError {
    #[error("Autotuner '{0}' was created without candidate parameters")]
    NoCandidates(String),
    #[error("Autotuner '{0}' has no valid launch parameters left")]
    NoValidParameters(String),
}

/// How the samples of one candidate are reduced to a single time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SampleMode {
    #[default]
    Median,
    Average,
    Maximum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunerState {
    Startup,
    Idle,
    Scanning,
}

pub trait TimingSource: fmt::Debug + Send {
    fn start(&mut self);

    /// Milliseconds since the matching [`TimingSource::start`].
    fn stop(&mut self) -> f64;
}

#[derive(Debug, Default)]
pub struct WallClock {
    started: Option<Instant>,
}

impl TimingSource for WallClock {
    fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    fn stop(&mut self) -> f64 {
        self.started
            .take()
            .map_or(0.0, |t| t.elapsed().as_secs_f64() * 1e3)
    }
}

#[derive(Debug)]
pub struct Autotuner {
    name: String,
    parameters: Vec<u32>,
    samples: Vec<Vec<f64>>,
    nsamples: usize,
    period: u32,
    mode: SampleMode,
    enabled: bool,
    state: TunerState,
    current_element: usize,
    current_sample: usize,
    current_param: u32,
    calls: u32,
    timer: Box<dyn TimingSource>,
}

impl Autotuner {
    pub fn new(
        name: impl Into<String>,
        parameters: Vec<u32>,
        nsamples: usize,
        period: u32,
    ) -> Result<Self, TunerError> {
        let name = name.into();
        let mut parameters = parameters;
        parameters.dedup();
        let Some(&first) = parameters.first() else {
            return Err(TunerError::NoCandidates(name));
        };
        let nsamples = nsamples.max(1);
        // An odd count keeps the median a measured value.
        let nsamples = if nsamples % 2 == 0 { nsamples + 1 } else { nsamples };

        Ok(Self {
            samples: vec![vec![0.0; nsamples]; parameters.len()],
            name,
            parameters,
            nsamples,
            period,
            mode: SampleMode::Median,
            enabled: true,
            state: TunerState::Startup,
            current_element: 0,
            current_sample: 0,
            current_param: first,
            calls: 0,
            timer: Box::new(WallClock::default()),
        })
    }

    pub fn with_mode(mut self, mode: SampleMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_timing_source(mut self, timer: Box<dyn TimingSource>) -> Self {
        self.timer = timer;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parameter to launch with now.
    #[inline]
    pub fn param(&self) -> u32 {
        self.current_param
    }

    pub fn parameters(&self) -> &[u32] {
        &self.parameters
    }

    pub fn state(&self) -> TunerState {
        self.state
    }

    /// The initial sweep has finished and an optimum is known.
    pub fn is_complete(&self) -> bool {
        self.state != TunerState::Startup
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn period(&self) -> u32 {
        self.period
    }

    pub fn set_period(&mut self, period: u32) {
        self.period = period;
    }

    /// Disabling freezes the current parameter for all later calls.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if enabled {
            return;
        }
        if self.state == TunerState::Startup {
            warn!(
                tuner = %self.name,
                param = self.current_param,
                "Autotuner disabled before the initial scan completed"
            );
        } else {
            self.state = TunerState::Idle;
            self.current_element = 0;
            self.current_param = self.optimal_parameter();
        }
    }

    pub fn begin(&mut self) {
        if self.enabled {
            self.timer.start();
        }
    }

    pub fn end(&mut self) {
        if self.enabled {
            let elapsed = self.timer.stop();
            self.record(elapsed);
        }
    }

    /// Feeds one measured launch time (in milliseconds) for the current parameter.
    pub fn record(&mut self, elapsed_ms: f64) {
        if !self.enabled {
            return;
        }
        match self.state {
            TunerState::Startup => {
                self.samples[self.current_element][self.current_sample] = elapsed_ms;
                self.current_element += 1;
                if self.current_element == self.parameters.len() {
                    self.current_element = 0;
                    self.current_sample += 1;
                    if self.current_sample == self.nsamples {
                        self.current_sample = 0;
                        self.finish_sweep();
                        return;
                    }
                }
                self.current_param = self.parameters[self.current_element];
            }
            TunerState::Idle => {
                self.calls += 1;
                if self.calls > self.period {
                    self.state = TunerState::Scanning;
                    self.calls = 0;
                    self.current_element = 0;
                    self.current_param = self.parameters[0];
                }
            }
            TunerState::Scanning => {
                self.samples[self.current_element][self.current_sample] = elapsed_ms;
                self.current_element += 1;
                if self.current_element == self.parameters.len() {
                    self.current_element = 0;
                    self.current_sample = (self.current_sample + 1) % self.nsamples;
                    self.finish_sweep();
                } else {
                    self.current_param = self.parameters[self.current_element];
                }
            }
        }
    }

    /// Drops the current parameter after a failed launch and restarts sampling.
    pub fn reject_current(&mut self) -> Result<(), TunerError> {
        let rejected = self.current_param;
        if let Some(index) = self.parameters.iter().position(|&p| p == rejected) {
            self.parameters.remove(index);
            self.samples.remove(index);
        }
        warn!(
            tuner = %self.name,
            param = rejected,
            remaining = self.parameters.len(),
            "Launch parameter rejected by the device"
        );
        let Some(&first) = self.parameters.first() else {
            return Err(TunerError::NoValidParameters(self.name.clone()));
        };

        if self.enabled {
            self.state = TunerState::Startup;
            self.current_element = 0;
            self.current_sample = 0;
            self.calls = 0;
            self.current_param = first;
        } else if self.state == TunerState::Startup {
            self.current_param = first;
        } else {
            self.current_param = self.optimal_parameter();
        }
        Ok(())
    }

    /// Runs `attempt` with the current parameter, timing successful launches and rejecting
    /// parameters the device refuses until one succeeds.
    pub fn run<R>(
        &mut self,
        mut attempt: impl FnMut(u32) -> Result<R, LaunchError>,
    ) -> Result<R, TunerError> {
        loop {
            self.begin();
            match attempt(self.current_param) {
                Ok(result) => {
                    self.end();
                    return Ok(result);
                }
                Err(err) => {
                    debug!(tuner = %self.name, param = self.current_param, %err, "Launch failed");
                    self.reject_current()?;
                }
            }
        }
    }

    fn finish_sweep(&mut self) {
        let first_completion = self.state == TunerState::Startup;
        self.state = TunerState::Idle;
        self.current_param = self.optimal_parameter();
        if first_completion {
            debug!(tuner = %self.name, param = self.current_param, "Initial scan complete");
        }
    }

    fn reduce(&self, samples: &[f64]) -> f64 {
        match self.mode {
            SampleMode::Median => {
                let mut sorted = samples.to_vec();
                sorted.sort_by(f64::total_cmp);
                sorted[sorted.len() / 2]
            }
            SampleMode::Average => samples.iter().sum::<f64>() / samples.len() as f64,
            SampleMode::Maximum => samples.iter().copied().fold(f64::MIN, f64::max),
        }
    }

    fn optimal_parameter(&self) -> u32 {
        self.samples
            .iter()
            .map(|s| self.reduce(s))
            .zip(&self.parameters)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map_or(self.current_param, |(_, &p)| p)
    }
}
