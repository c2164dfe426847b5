//! Per-PID resource metrics sampled from the platform.
//!
//! On Linux the figures come from `/proc/<pid>/{stat,statm,io,task,fd}`.
//! Everywhere else, and whenever the platform data is missing, the sampler
//! yields the zero-filled mapping rather than an error.

use dash_core::types::AgentMetrics;
use std::time::Duration;

/// Interval between periodic samples per agent.
pub const METRICS_INTERVAL: Duration = Duration::from_secs(2);

/// Upper bound on how long a single sample may take; past it the previous
/// values are kept.
pub const SAMPLE_TIMEOUT: Duration = Duration::from_millis(500);

#[cfg(target_os = "linux")]
#[derive(Debug, Clone, Copy)]
struct CpuSample {
    ticks: u64,
    at: std::time::Instant,
}

/// Stateless beyond the previous CPU-tick observation needed to compute
/// CPU% over the inter-sample interval.
#[derive(Debug, Default)]
pub struct MetricsSampler {
    #[cfg(target_os = "linux")]
    prev_cpu: Option<CpuSample>,
    last: AgentMetrics,
}

impl MetricsSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sample the process once. A non-positive or missing PID yields the
    /// zero-filled mapping; the first successful sample reports 0 CPU.
    pub fn sample(&mut self, pid: i32) -> AgentMetrics {
        if pid <= 0 {
            return AgentMetrics::default();
        }
        let metrics = self.sample_platform(pid);
        self.last = metrics.clone();
        metrics
    }

    /// The most recent successfully sampled mapping.
    pub fn last_known(&self) -> AgentMetrics {
        self.last.clone()
    }

    #[cfg(target_os = "linux")]
    fn sample_platform(&mut self, pid: i32) -> AgentMetrics {
        use std::path::PathBuf;
        use std::time::Instant;

        let mut metrics = AgentMetrics::default();
        let proc_dir = PathBuf::from(format!("/proc/{pid}"));

        let Ok(stat) = std::fs::read_to_string(proc_dir.join("stat")) else {
            return metrics;
        };
        // Fields after the ')' delimiter; the comm field may contain spaces.
        let after_comm = stat
            .rfind(')')
            .and_then(|end| stat.get(end + 2..))
            .unwrap_or("");
        let fields: Vec<&str> = after_comm.split_whitespace().collect();
        let utime = parse_stat_field(&fields, 11);
        let stime = parse_stat_field(&fields, 12);
        let total_ticks = utime + stime;

        let now = Instant::now();
        if let Some(prev) = self.prev_cpu {
            let elapsed = now.duration_since(prev.at).as_secs_f64();
            let clk_tck = clock_ticks_per_sec();
            if elapsed > 0.0 && total_ticks >= prev.ticks {
                let cpu_secs = (total_ticks - prev.ticks) as f64 / clk_tck;
                metrics.cpu_percent = cpu_secs / elapsed * 100.0;
            }
        }
        self.prev_cpu = Some(CpuSample {
            ticks: total_ticks,
            at: now,
        });

        if let Ok(statm) = std::fs::read_to_string(proc_dir.join("statm")) {
            let resident_pages = statm
                .split_whitespace()
                .nth(1)
                .and_then(|value| value.parse::<u64>().ok())
                .unwrap_or(0);
            let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
            if page_size > 0 {
                let rss_bytes = resident_pages.saturating_mul(page_size as u64);
                metrics.memory_mb = rss_bytes as f64 / 1_048_576.0;
            }
        }

        if let Ok(io) = std::fs::read_to_string(proc_dir.join("io")) {
            for line in io.lines() {
                if let Some(rest) = line.strip_prefix("read_bytes:") {
                    metrics.io_read_bytes = rest.trim().parse().unwrap_or(0);
                } else if let Some(rest) = line.strip_prefix("write_bytes:") {
                    metrics.io_write_bytes = rest.trim().parse().unwrap_or(0);
                }
            }
        }

        metrics.thread_count = count_dir_entries(&proc_dir.join("task"));
        metrics.fd_count = count_dir_entries(&proc_dir.join("fd"));

        metrics
    }

    #[cfg(not(target_os = "linux"))]
    fn sample_platform(&mut self, _pid: i32) -> AgentMetrics {
        AgentMetrics::default()
    }
}

#[cfg(target_os = "linux")]
fn parse_stat_field(fields: &[&str], index: usize) -> u64 {
    fields
        .get(index)
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(0)
}

#[cfg(target_os = "linux")]
fn clock_ticks_per_sec() -> f64 {
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if ticks > 0 {
        ticks as f64
    } else {
        100.0
    }
}

#[cfg(target_os = "linux")]
fn count_dir_entries(path: &std::path::Path) -> u64 {
    std::fs::read_dir(path)
        .map(|entries| entries.flatten().count() as u64)
        .unwrap_or(0)
}
