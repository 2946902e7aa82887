//! Parallel processing configuration and management
//!
//! Configures Rayon's global thread pool, which a worker process uses for array
//! reductions and rasterisation. Files themselves are handled one at a time.

use crate::errors::{FilterMapsError, Result};
use rayon::ThreadPoolBuilder;

/// Configuration for parallel processing inside one worker process
#[derive(Debug, Clone, Default)]
pub struct ParallelConfig {
    pub num_threads: Option<usize>,
}

impl ParallelConfig {
    /// Create a new parallel configuration
    pub fn new(num_threads: Option<usize>) -> Self {
        Self { num_threads }
    }

    /// Set up the global Rayon thread pool with the specified configuration
    pub fn setup_global_pool(&self) -> Result<()> {
        if let Some(num_threads) = self.num_threads {
            ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .build_global()
                .map_err(|e| {
                    FilterMapsError::ThreadPoolError(format!(
                        "Failed to initialize thread pool with {} threads: {}",
                        num_threads, e
                    ))
                })?;

            log::debug!("Configured parallel processing with {} threads", num_threads);
        } else {
            log::debug!("Using default thread pool configuration");
        }

        Ok(())
    }

    /// Get the current number of threads being used
    pub fn current_threads(&self) -> usize {
        rayon::current_num_threads()
    }

    /// Split the machine's cores between `workers` cooperating processes.
    ///
    /// Used by the launcher so that N spawned workers do not each start a pool
    /// the size of the whole machine.
    pub fn share_of_cores(workers: usize) -> Self {
        let cores = num_cpus::get();
        Self {
            num_threads: Some((cores / workers.max(1)).max(1)),
        }
    }
}

/// Get information about the current parallel configuration
pub fn get_parallel_info() -> ParallelInfo {
    ParallelInfo {
        current_threads: rayon::current_num_threads(),
        available_cores: num_cpus::get(),
        available_parallelism: std::thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(1),
    }
}

/// Information about the parallel processing environment
#[derive(Debug, Clone)]
pub struct ParallelInfo {
    pub current_threads: usize,
    pub available_cores: usize,
    pub available_parallelism: usize,
}

impl ParallelInfo {
    /// Log parallel processing information
    pub fn log_info(&self) {
        log::debug!(
            "threads: {} current, {} cores, {} available parallelism",
            self.current_threads,
            self.available_cores,
            self.available_parallelism
        );
    }
}
