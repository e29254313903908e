//! Execution configuration shared by every compute.
//!
//! The accelerated backend runs on a dedicated worker pool that stands in for the
//! device: kernels are launched with a block size, split their index space into
//! blocks of that size and run the blocks in parallel on the pool. Launch validation
//! mirrors the resource checks a real device performs, so an invalid block size is
//! reported as a [`LaunchError`] rather than silently clamped.

use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    #[default]
    Cpu,
    Gpu,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => f.write_str("cpu"),
            Self::Gpu => f.write_str("gpu"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    pub max_block_size: u32,
    pub warp_size: u32,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            max_block_size: 1024,
            warp_size: 32,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LaunchError {
    #[error("Block size must be non-zero")]
    ZeroBlockSize,
    #[error("Block size {requested} exceeds the device limit of {max}")]
    BlockTooLarge { requested: u32, max: u32 },
    #[error("Block size {requested} is not a multiple of the warp size {warp}")]
    NotWarpMultiple { requested: u32, warp: u32 },
    #[error("Kernel launched on a configuration without a device")]
    NoDevice,
}

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Failed to start the device worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("Accelerated compute '{0}' requires a GPU execution configuration")]
    NotAccelerated(String),
}

/// Where computes run and, for the accelerated backend, the device they launch on.
///
/// Cloning is cheap; clones share the same worker pool.
#[derive(Debug, Clone)]
pub struct ExecutionConfiguration {
    mode: ExecutionMode,
    limits: DeviceLimits,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl ExecutionConfiguration {
    pub fn cpu() -> Self {
        Self {
            mode: ExecutionMode::Cpu,
            limits: DeviceLimits::default(),
            pool: None,
        }
    }

    /// Starts a device with `workers` threads (0 lets the pool pick).
    pub fn gpu(workers: usize, limits: DeviceLimits) -> Result<Self, DeviceError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("device-{i}"))
            .build()?;
        debug!(
            workers = pool.current_num_threads(),
            max_block_size = limits.max_block_size,
            warp_size = limits.warp_size,
            "Device initialized"
        );
        Ok(Self {
            mode: ExecutionMode::Gpu,
            limits,
            pool: Some(Arc::new(pool)),
        })
    }

    pub fn new(mode: ExecutionMode, workers: usize) -> Result<Self, DeviceError> {
        match mode {
            ExecutionMode::Cpu => Ok(Self::cpu()),
            ExecutionMode::Gpu => Self::gpu(workers, DeviceLimits::default()),
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn is_gpu(&self) -> bool {
        self.mode == ExecutionMode::Gpu
    }

    pub fn limits(&self) -> DeviceLimits {
        self.limits
    }

    pub fn check_launch(&self, block_size: u32) -> Result<(), LaunchError> {
        let DeviceLimits {
            max_block_size,
            warp_size,
        } = self.limits;
        if block_size == 0 {
            return Err(LaunchError::ZeroBlockSize);
        }
        if block_size > max_block_size {
            return Err(LaunchError::BlockTooLarge {
                requested: block_size,
                max: max_block_size,
            });
        }
        if block_size % warp_size != 0 {
            return Err(LaunchError::NotWarpMultiple {
                requested: block_size,
                warp: warp_size,
            });
        }
        Ok(())
    }

    /// Every launchable block size: warp multiples up to the device maximum.
    pub fn block_sizes(&self) -> Vec<u32> {
        let warp = self.limits.warp_size.max(1);
        (1..=self.limits.max_block_size / warp)
            .map(|k| k * warp)
            .collect()
    }

    /// Validates the block size, then runs `kernel` on the device and waits for it.
    pub fn launch<R, F>(&self, block_size: u32, kernel: F) -> Result<R, LaunchError>
    where
        F: FnOnce(usize) -> R + Send,
        R: Send,
    {
        let pool = self.pool.as_ref().ok_or(LaunchError::NoDevice)?;
        self.check_launch(block_size)?;
        Ok(pool.install(|| kernel(block_size as usize)))
    }
}

/// Number of blocks needed to cover `n` work items.
#[inline]
pub fn grid_size(n: usize, block_size: usize) -> usize {
    n.div_ceil(block_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> ExecutionConfiguration {
        ExecutionConfiguration::gpu(2, DeviceLimits::default()).unwrap()
    }

    #[test]
    fn check_launch_rejects_invalid_block_sizes() {
        let exec = device();
        assert_eq!(exec.check_launch(0), Err(LaunchError::ZeroBlockSize));
        assert_eq!(
            exec.check_launch(2048),
            Err(LaunchError::BlockTooLarge {
                requested: 2048,
                max: 1024
            })
        );
        assert_eq!(
            exec.check_launch(48),
            Err(LaunchError::NotWarpMultiple {
                requested: 48,
                warp: 32
            })
        );
        assert!(exec.check_launch(256).is_ok());
    }

    #[test]
    fn block_sizes_are_warp_multiples_up_to_the_limit() {
        let exec = ExecutionConfiguration::gpu(
            1,
            DeviceLimits {
                max_block_size: 128,
                warp_size: 32,
            },
        )
        .unwrap();
        assert_eq!(exec.block_sizes(), vec![32, 64, 96, 128]);
        assert!(exec.block_sizes().iter().all(|&b| exec.check_launch(b).is_ok()));
    }

    #[test]
    fn launch_runs_kernel_on_the_device_pool() {
        let exec = device();
        let name = exec
            .launch(64, |block| {
                assert_eq!(block, 64);
                std::thread::current().name().map(str::to_string)
            })
            .unwrap();
        assert!(name.is_some_and(|n| n.starts_with("device-")));
    }

    #[test]
    fn launch_does_not_run_rejected_kernels() {
        let exec = device();
        let mut ran = false;
        let result = exec.launch(33, |_| ran = true);
        assert!(result.is_err());
        assert!(!ran);
    }

    #[test]
    fn cpu_configuration_has_no_device() {
        let exec = ExecutionConfiguration::new(ExecutionMode::Cpu, 0).unwrap();
        assert!(!exec.is_gpu());
        assert_eq!(exec.launch(32, |_| ()), Err(LaunchError::NoDevice));
    }

    #[test]
    fn grid_size_rounds_up() {
        assert_eq!(grid_size(0, 32), 0);
        assert_eq!(grid_size(32, 32), 1);
        assert_eq!(grid_size(33, 32), 2);
    }
}
