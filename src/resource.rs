//! Process and container resource sampling.
//!
//! Sampling never fails: a counter that cannot be read is reported as
//! [`UNAVAILABLE`] (memory figures) or `None` (disk and I/O counters).

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Serialize;

use crate::record::round2;

/// Sentinel for a memory figure that has no container limit to relate to.
pub const UNAVAILABLE: f64 = -1.0;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Filesystem block counters of the volume holding the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiskCounters {
    pub block_size: u64,
    pub free_blocks: u64,
    pub available_blocks: u64,
    pub total_blocks: u64,
}

/// One snapshot of resource usage, serialized as `system_metrics`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceMetrics {
    pub user_cpu_time_sec: f64,
    pub system_cpu_time_sec: f64,
    /// Container usage when a cgroup reports it, else the peak resident set.
    pub memory_used_gb: f64,
    pub memory_percent: f64,
    pub memory_available_gb: f64,
    pub disk_io_counters: Option<DiskCounters>,
}

impl ResourceMetrics {
    pub fn cpu_seconds(&self) -> f64 {
        self.user_cpu_time_sec + self.system_cpu_time_sec
    }
}

/// Bytes read and written by this process, from `/proc/self/io`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessIo {
    pub read: u64,
    pub write: u64,
}

impl ProcessIo {
    pub fn delta_since(&self, earlier: &ProcessIo) -> ProcessIo {
        ProcessIo {
            read: self.read.saturating_sub(earlier.read),
            write: self.write.saturating_sub(earlier.write),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResourceSampler {
    cgroup_root: PathBuf,
    disk_path: PathBuf,
    proc_io_path: PathBuf,
}

impl Default for ResourceSampler {
    fn default() -> Self {
        ResourceSampler {
            cgroup_root: PathBuf::from("/sys/fs/cgroup"),
            disk_path: PathBuf::from("/"),
            proc_io_path: PathBuf::from("/proc/self/io"),
        }
    }
}

impl ResourceSampler {
    pub fn cgroup_root(self, cgroup_root: impl Into<PathBuf>) -> Self {
        ResourceSampler {
            cgroup_root: cgroup_root.into(),
            ..self
        }
    }

    pub fn disk_path(self, disk_path: impl Into<PathBuf>) -> Self {
        ResourceSampler {
            disk_path: disk_path.into(),
            ..self
        }
    }

    pub fn proc_io_path(self, proc_io_path: impl Into<PathBuf>) -> Self {
        ResourceSampler {
            proc_io_path: proc_io_path.into(),
            ..self
        }
    }

    pub fn sample(&self) -> ResourceMetrics {
        let usage = rusage_self();
        let mut metrics = ResourceMetrics {
            user_cpu_time_sec: usage.user.as_secs_f64(),
            system_cpu_time_sec: usage.system.as_secs_f64(),
            memory_used_gb: usage.max_rss_kb as f64 / 1024.0 / 1024.0,
            memory_percent: UNAVAILABLE,
            memory_available_gb: UNAVAILABLE,
            disk_io_counters: disk_counters(&self.disk_path),
        };
        if let Some((limit, usage)) = self.cgroup_memory() {
            if limit > 0 {
                let used_gb = usage as f64 / GIB;
                metrics.memory_percent = memory_percent(limit, usage);
                metrics.memory_used_gb = round2(used_gb);
                metrics.memory_available_gb = round2(limit as f64 / GIB - used_gb);
            }
        }
        metrics
    }

    pub fn process_io(&self) -> Option<ProcessIo> {
        let text = fs::read_to_string(&self.proc_io_path).ok()?;
        let mut io = ProcessIo::default();
        let (mut read, mut write) = (false, false);
        for line in text.lines() {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let Ok(value) = value.trim().parse::<u64>() else {
                continue;
            };
            match name.trim() {
                "read_bytes" => (io.read, read) = (value, true),
                "write_bytes" => (io.write, write) = (value, true),
                _ => {}
            }
        }
        (read && write).then_some(io)
    }

    /// `(limit, usage)` in bytes from cgroup v2, falling back to v1. A v2
    /// limit of `max` means no limit.
    fn cgroup_memory(&self) -> Option<(u64, u64)> {
        let v2_limit = self.cgroup_root.join("memory.max");
        if v2_limit.exists() {
            let limit = read_first_line(&v2_limit)?;
            if limit == "max" {
                return None;
            }
            let usage = read_first_line(&self.cgroup_root.join("memory.current"))?;
            return Some((limit.parse().ok()?, usage.parse().ok()?));
        }
        let v1 = self.cgroup_root.join("memory");
        let limit = read_first_line(&v1.join("memory.limit_in_bytes"))?;
        let usage = read_first_line(&v1.join("memory.usage_in_bytes"))?;
        Some((limit.parse().ok()?, usage.parse().ok()?))
    }
}

/// `usage / limit * 100`, rounded to two decimals; [`UNAVAILABLE`] without a
/// positive limit.
pub fn memory_percent(limit: u64, usage: u64) -> f64 {
    if limit == 0 {
        return UNAVAILABLE;
    }
    round2(usage as f64 / limit as f64 * 100.0)
}

/// `(Δuser + Δsystem) / wall / cores * 100`, 0 when no wall time elapsed.
pub fn cpu_percent(
    before: &ResourceMetrics,
    after: &ResourceMetrics,
    wall: f64,
    cores: usize,
) -> f64 {
    if wall <= 0.0 || cores == 0 {
        return 0.0;
    }
    let cpu = after.cpu_seconds() - before.cpu_seconds();
    round2(cpu / wall / cores as f64 * 100.0)
}

/// Logical cores available to this process.
pub fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn read_first_line(path: &Path) -> Option<String> {
    let text = fs::read_to_string(path).ok()?;
    let line = text.lines().next()?.trim();
    (!line.is_empty()).then(|| line.to_string())
}

struct Rusage {
    user: Duration,
    system: Duration,
    max_rss_kb: u64,
}

#[cfg(unix)]
fn rusage_self() -> Rusage {
    use std::mem::MaybeUninit;

    fn duration_for_timeval(tv: libc::timeval) -> Duration {
        Duration::new(tv.tv_sec as u64, tv.tv_usec as u32 * 1_000)
    }

    let mut ru: MaybeUninit<libc::rusage> = MaybeUninit::uninit();
    // SAFETY: getrusage only writes into the provided struct.
    let err_code = unsafe { libc::getrusage(libc::RUSAGE_SELF, ru.as_mut_ptr()) };
    if err_code != 0 {
        return Rusage {
            user: Duration::ZERO,
            system: Duration::ZERO,
            max_rss_kb: 0,
        };
    }
    // SAFETY: initialized by the successful call above.
    let ru = unsafe { ru.assume_init() };
    Rusage {
        user: duration_for_timeval(ru.ru_utime),
        system: duration_for_timeval(ru.ru_stime),
        max_rss_kb: ru.ru_maxrss as u64,
    }
}

/// Define for non-unix so that runs still report timings.
#[cfg(not(unix))]
fn rusage_self() -> Rusage {
    Rusage {
        user: Duration::ZERO,
        system: Duration::ZERO,
        max_rss_kb: 0,
    }
}

#[cfg(unix)]
fn disk_counters(path: &Path) -> Option<DiskCounters> {
    use std::{ffi::CString, mem::MaybeUninit, os::unix::ffi::OsStrExt};

    let c_path = CString::new(path.as_os_str().as_bytes()).ok()?;
    let mut stats: MaybeUninit<libc::statvfs> = MaybeUninit::uninit();
    // SAFETY: c_path is NUL-terminated and statvfs only writes into `stats`.
    if unsafe { libc::statvfs(c_path.as_ptr(), stats.as_mut_ptr()) } != 0 {
        return None;
    }
    // SAFETY: initialized by the successful call above.
    let stats = unsafe { stats.assume_init() };
    Some(DiskCounters {
        block_size: stats.f_bsize as u64,
        free_blocks: stats.f_bfree as u64,
        available_blocks: stats.f_bavail as u64,
        total_blocks: stats.f_blocks as u64,
    })
}

#[cfg(not(unix))]
fn disk_counters(_path: &Path) -> Option<DiskCounters> {
    None
}
