//! Worker identity, file discovery and static work partitioning
//!
//! Cooperating worker processes never talk to each other. Each one resolves its
//! rank and the world size from whatever launcher started it, lists the same input
//! files, and takes every `world_size`-th file starting at its rank.

use crate::errors::{FilterMapsError, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};

/// Environment variables set by the built-in launcher.
pub const RANK_ENV: &str = "FILTER_MAPS_RANK";
pub const WORLD_SIZE_ENV: &str = "FILTER_MAPS_WORLD_SIZE";

/// (rank, size) variable pairs probed in order. The first pair that is fully
/// present and consistent wins.
const LAUNCHER_ENVIRONMENTS: &[(&str, &str, &str)] = &[
    ("filter_maps", RANK_ENV, WORLD_SIZE_ENV),
    ("Open MPI", "OMPI_COMM_WORLD_RANK", "OMPI_COMM_WORLD_SIZE"),
    ("PMI", "PMI_RANK", "PMI_SIZE"),
    ("PMIx", "PMIX_RANK", "PMIX_SIZE"),
];

/// Identity of this process among the cooperating workers
pub trait WorkDistribution {
    fn rank(&self) -> usize;
    fn world_size(&self) -> usize;
    /// Human readable name of the mechanism that provided the identity
    fn name(&self) -> &str;

    fn is_root(&self) -> bool {
        self.rank() == 0
    }

    /// The stride of `items` owned by this worker
    fn assigned<'a, T>(&self, items: &'a [T]) -> Vec<&'a T> {
        partition(items, self.rank(), self.world_size())
    }
}

/// The only worker
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleProcess;

impl WorkDistribution for SingleProcess {
    fn rank(&self) -> usize {
        0
    }

    fn world_size(&self) -> usize {
        1
    }

    fn name(&self) -> &str {
        "single process"
    }
}

/// A worker started by an external or built-in launcher
#[derive(Debug, Clone)]
pub struct LaunchedWorkers {
    rank: usize,
    world_size: usize,
    launcher: String,
}

impl LaunchedWorkers {
    /// Build from an explicit rank and size; `None` when inconsistent
    pub fn new(rank: usize, world_size: usize, launcher: &str) -> Option<Self> {
        if world_size == 0 || rank >= world_size {
            return None;
        }
        Some(Self {
            rank,
            world_size,
            launcher: launcher.to_string(),
        })
    }

    /// Probe launcher environments through `lookup`
    pub fn probe<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        LAUNCHER_ENVIRONMENTS
            .iter()
            .find_map(|(launcher, rank_var, size_var)| {
                let rank = lookup(rank_var)?.trim().parse::<usize>().ok()?;
                let size = lookup(size_var)?.trim().parse::<usize>().ok()?;
                let found = Self::new(rank, size, launcher);
                if found.is_none() {
                    log::debug!(
                        "ignoring inconsistent {} environment: rank {} of {}",
                        launcher,
                        rank,
                        size
                    );
                }
                found
            })
    }
}

impl WorkDistribution for LaunchedWorkers {
    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.world_size
    }

    fn name(&self) -> &str {
        &self.launcher
    }
}

/// Resolved worker identity
#[derive(Debug, Clone)]
pub enum Workers {
    Single(SingleProcess),
    Launched(LaunchedWorkers),
}

impl WorkDistribution for Workers {
    fn rank(&self) -> usize {
        match self {
            Workers::Single(w) => w.rank(),
            Workers::Launched(w) => w.rank(),
        }
    }

    fn world_size(&self) -> usize {
        match self {
            Workers::Single(w) => w.world_size(),
            Workers::Launched(w) => w.world_size(),
        }
    }

    fn name(&self) -> &str {
        match self {
            Workers::Single(w) => w.name(),
            Workers::Launched(w) => w.name(),
        }
    }
}

/// Determine this process's rank and world size.
///
/// Never fails: without a usable launcher environment the process is rank 0 of 1.
/// Prints `Proc {rank+1} of {count}`.
pub fn resolve_workers() -> Workers {
    let workers = resolve_workers_with(|name| env::var(name).ok());
    println!("Proc {} of {}", workers.rank() + 1, workers.world_size());
    workers
}

/// [`resolve_workers`] with an injectable environment, without printing
pub fn resolve_workers_with<F>(lookup: F) -> Workers
where
    F: Fn(&str) -> Option<String>,
{
    match LaunchedWorkers::probe(lookup) {
        Some(launched) => {
            log::debug!(
                "worker identity from {}: rank {} of {}",
                launched.name(),
                launched.rank(),
                launched.world_size()
            );
            Workers::Launched(launched)
        }
        None => {
            log::debug!("no process launcher detected, running as a single worker");
            Workers::Single(SingleProcess)
        }
    }
}

/// Round-robin static partition: items `rank, rank + size, rank + 2*size, ...`
pub fn partition<T>(items: &[T], rank: usize, size: usize) -> Vec<&T> {
    if size == 0 {
        return Vec::new();
    }
    items.iter().skip(rank).step_by(size).collect()
}

/// List the files in `dir` matching `pattern` (e.g. `filter_*.nc`).
///
/// The `glob` crate yields matches in alphabetical order, so every worker sees the
/// same list as long as the directory does not change during the run.
pub fn enumerate_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let escaped_dir = glob::Pattern::escape(&dir.to_string_lossy());
    let full_pattern = format!("{}/{}", escaped_dir, pattern);

    let mut files = Vec::new();
    for entry in glob::glob(&full_pattern)? {
        let path = entry?;
        if path.is_file() {
            files.push(path);
        }
    }

    log::debug!("{} files match {}", files.len(), full_pattern);
    Ok(files)
}

/// Spawn `count` copies of the current executable as workers `0..count`.
///
/// Each child inherits the command line and gets its rank through
/// [`RANK_ENV`]/[`WORLD_SIZE_ENV`]. Returns after every child has exited; the first
/// failed rank (if any) is reported as an error after all have been waited on.
pub fn launch_workers(count: usize, args: &[String]) -> Result<()> {
    let exe = env::current_exe()?;
    let threads = crate::parallel::ParallelConfig::share_of_cores(count)
        .num_threads
        .unwrap_or(1);

    run_workers(count, |rank| {
        let mut command = Command::new(&exe);
        command
            .args(args)
            .env(RANK_ENV, rank.to_string())
            .env(WORLD_SIZE_ENV, count.to_string())
            .env("RAYON_NUM_THREADS", threads.to_string());
        command
    })
}

/// Spawn one process per rank from `command_for` and wait for all of them.
///
/// If a spawn fails, the workers already running are killed and reaped before the
/// spawn error is returned.
fn run_workers<F>(count: usize, mut command_for: F) -> Result<()>
where
    F: FnMut(usize) -> Command,
{
    let mut children: Vec<(usize, Child)> = Vec::with_capacity(count);
    for rank in 0..count {
        match command_for(rank).spawn() {
            Ok(child) => {
                log::debug!("spawned worker {} (pid {})", rank, child.id());
                children.push((rank, child));
            }
            Err(err) => {
                log::error!("failed to spawn worker {}: {}", rank, err);
                stop_workers(children);
                return Err(err.into());
            }
        }
    }

    let mut first_failure = None;
    for (rank, mut child) in children {
        match child.wait() {
            Ok(status) if status.success() => {}
            Ok(status) => {
                log::error!("worker {} failed: {}", rank, status);
                first_failure.get_or_insert(FilterMapsError::WorkerFailed {
                    rank,
                    code: status.code(),
                });
            }
            Err(err) => {
                log::error!("lost track of worker {}: {}", rank, err);
                first_failure.get_or_insert(FilterMapsError::IoError(err));
            }
        }
    }

    match first_failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn stop_workers(children: Vec<(usize, Child)>) {
    for (rank, mut child) in children {
        if let Err(err) = child.kill() {
            log::debug!("worker {} already exited: {}", rank, err);
        }
        if let Err(err) = child.wait() {
            log::warn!("could not reap worker {}: {}", rank, err);
        }
    }
}

/// True when a launcher already gave this process a rank, in which case it must
/// not spawn workers of its own
pub fn is_launched_worker() -> bool {
    is_launched_worker_with(|name| env::var(name).ok())
}

/// [`is_launched_worker`] with an injectable environment
pub fn is_launched_worker_with<F>(lookup: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    LaunchedWorkers::probe(lookup).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn partition_covers_every_item_once() {
        for len in 0..40 {
            let items: Vec<usize> = (0..len).collect();
            for size in 1..8 {
                let mut seen = vec![0usize; len];
                for rank in 0..size {
                    for &item in partition(&items, rank, size) {
                        seen[item] += 1;
                    }
                }
                assert!(
                    seen.iter().all(|&count| count == 1),
                    "len {} size {}: {:?}",
                    len,
                    size,
                    seen
                );
            }
        }
    }

    #[test]
    fn partition_is_strided() {
        let items = ["a", "b", "c", "d", "e"];
        let owned: Vec<&&str> = partition(&items, 1, 2);
        assert_eq!(owned, vec![&"b", &"d"]);
    }

    #[test]
    fn missing_launcher_falls_back_to_single_worker() {
        let env = env_of(&[]);
        let workers = resolve_workers_with(|k| env.get(k).cloned());
        assert_eq!(workers.rank(), 0);
        assert_eq!(workers.world_size(), 1);
        assert!(workers.is_root());
    }

    #[test]
    fn open_mpi_environment_is_detected() {
        let env = env_of(&[("OMPI_COMM_WORLD_RANK", "2"), ("OMPI_COMM_WORLD_SIZE", "4")]);
        let workers = resolve_workers_with(|k| env.get(k).cloned());
        assert_eq!(workers.rank(), 2);
        assert_eq!(workers.world_size(), 4);
        assert_eq!(workers.name(), "Open MPI");
    }

    #[test]
    fn inconsistent_environment_is_ignored() {
        let env = env_of(&[("PMI_RANK", "4"), ("PMI_SIZE", "4")]);
        let workers = resolve_workers_with(|k| env.get(k).cloned());
        assert_eq!(workers.world_size(), 1);

        let env = env_of(&[(RANK_ENV, "x"), (WORLD_SIZE_ENV, "2")]);
        let workers = resolve_workers_with(|k| env.get(k).cloned());
        assert_eq!(workers.world_size(), 1);
    }

    #[test]
    fn builtin_launcher_takes_precedence() {
        let env = env_of(&[
            (RANK_ENV, "1"),
            (WORLD_SIZE_ENV, "3"),
            ("OMPI_COMM_WORLD_RANK", "0"),
            ("OMPI_COMM_WORLD_SIZE", "8"),
        ]);
        let workers = resolve_workers_with(|k| env.get(k).cloned());
        assert_eq!((workers.rank(), workers.world_size()), (1, 3));
    }

    #[test]
    fn any_launcher_rank_blocks_spawning() {
        let env = env_of(&[("OMPI_COMM_WORLD_RANK", "1"), ("OMPI_COMM_WORLD_SIZE", "2")]);
        assert!(is_launched_worker_with(|k| env.get(k).cloned()));

        let env = env_of(&[(RANK_ENV, "0"), (WORLD_SIZE_ENV, "2")]);
        assert!(is_launched_worker_with(|k| env.get(k).cloned()));

        let env = env_of(&[("PMI_RANK", "3")]);
        assert!(!is_launched_worker_with(|k| env.get(k).cloned()));
    }

    #[cfg(unix)]
    #[test]
    fn failed_spawn_stops_running_workers() {
        let started = std::time::Instant::now();
        let result = run_workers(3, |rank| {
            if rank == 0 {
                let mut command = Command::new("sleep");
                command.arg("30");
                command
            } else {
                Command::new("/nonexistent/filter_maps_worker")
            }
        });
        assert!(matches!(result, Err(FilterMapsError::IoError(_))));
        assert!(started.elapsed() < std::time::Duration::from_secs(20));
    }

    #[cfg(unix)]
    #[test]
    fn failed_worker_is_reported_after_all_exit() {
        let result = run_workers(3, |rank| {
            if rank == 1 {
                Command::new("false")
            } else {
                Command::new("true")
            }
        });
        match result {
            Err(FilterMapsError::WorkerFailed { rank, code }) => {
                assert_eq!(rank, 1);
                assert_eq!(code, Some(1));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(run_workers(2, |_| Command::new("true")).is_ok());
    }

    #[test]
    fn enumerate_matches_pattern_only() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["filter_b.nc", "filter_a.nc", "input.nc", "filter_c.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let files = enumerate_files(dir.path(), "filter_*.nc").unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["filter_a.nc", "filter_b.nc"]);
    }
}
