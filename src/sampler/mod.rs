//! Per-container resource sampling.
//!
//! A [`Sampler`] polls a [`StatsSource`] on a fixed interval, turns the
//! cumulative counters of two consecutive [`Snapshot`]s into a [`Sample`]
//! and hands it to a [`SampleSink`]. Read failures never stop the loop;
//! only a target that is gone (or an explicit stop) does.

mod backoff;
mod cpu;
mod group;
mod runner;
mod sink;

pub use backoff::Backoff;
pub use cpu::{bytes_to_mb, cpu_percent};
pub use group::SamplerGroup;
pub use runner::{Sampler, SamplerHandle, SamplerOptions};
pub use sink::{LogSink, SampleSink};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Raw counters read from the engine at one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    /// CPU time consumed by the container since creation.
    pub cpu_total_ns: u64,
    /// CPU time consumed by the whole host since boot.
    pub system_cpu_ns: u64,
    pub cpu_count: u32,
    pub memory_used_bytes: u64,
    pub disk_used_estimate_bytes: Option<u64>,
}

/// A normalized reading, ready to be drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub cpu_percent: f64,
    pub memory_mb: f64,
    pub disk_mb: f64,
    pub sequence: u64,
    pub captured_at: DateTime<Utc>,
}

impl Sample {
    /// Build the sample for `current`, using `previous` as the CPU baseline.
    pub fn derive(sequence: u64, previous: Option<&Snapshot>, current: &Snapshot) -> Self {
        Self {
            cpu_percent: cpu_percent(previous, current),
            memory_mb: bytes_to_mb(current.memory_used_bytes),
            disk_mb: current
                .disk_used_estimate_bytes
                .map(bytes_to_mb)
                .unwrap_or(0.0),
            sequence,
            captured_at: Utc::now(),
        }
    }

    /// Flatline sample emitted for failed and terminal ticks.
    pub fn zero(sequence: u64) -> Self {
        Self {
            cpu_percent: 0.0,
            memory_mb: 0.0,
            disk_mb: 0.0,
            sequence,
            captured_at: Utc::now(),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.cpu_percent == 0.0 && self.memory_mb == 0.0 && self.disk_mb == 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    Idle,
    Running,
    Stopped,
    TargetGone,
}

impl SamplerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::TargetGone)
    }
}

impl std::fmt::Display for SamplerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::TargetGone => "target gone",
        };
        write!(f, "{}", s)
    }
}

/// Run state of a target as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Stopped,
    /// The engine did not report a state.
    Unknown,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SourceError {
    #[error("transient read error: {0}")]
    TransientRead(String),

    #[error("target '{0}' not found")]
    TargetNotFound(String),

    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),
}

impl SourceError {
    /// Whether the sampler must give up on its target.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::TargetNotFound(_))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StartError {
    #[error("container '{0}' is not running")]
    TargetGone(String),
}

/// Where a sampler reads its counters from.
#[async_trait]
pub trait StatsSource: Send + Sync {
    async fn run_state(&self, target: &str) -> Result<RunState, SourceError>;
    async fn snapshot(&self, target: &str) -> Result<Snapshot, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(cpu: u64, system: u64, memory: u64, disk: Option<u64>) -> Snapshot {
        Snapshot {
            cpu_total_ns: cpu,
            system_cpu_ns: system,
            cpu_count: 2,
            memory_used_bytes: memory,
            disk_used_estimate_bytes: disk,
        }
    }

    #[test]
    fn derive_normalizes_memory_and_disk() {
        let prev = snapshot(1000, 10_000, 0, None);
        let cur = snapshot(1500, 10_500, 104_857_600, Some(52_428_800));
        let sample = Sample::derive(2, Some(&prev), &cur);
        assert_eq!(sample.sequence, 2);
        assert!((sample.cpu_percent - 200.0).abs() < 1e-9);
        assert!((sample.memory_mb - 100.0).abs() < 1e-9);
        assert!((sample.disk_mb - 50.0).abs() < 1e-9);
    }

    #[test]
    fn missing_disk_estimate_reads_as_zero() {
        let sample = Sample::derive(1, None, &snapshot(1, 1, 1024 * 1024, None));
        assert_eq!(sample.disk_mb, 0.0);
        assert_eq!(sample.cpu_percent, 0.0);
        assert!(!sample.is_zero());
    }

    #[test]
    fn only_not_found_is_terminal() {
        assert!(SourceError::TargetNotFound("abc".into()).is_terminal());
        assert!(!SourceError::TransientRead("timeout".into()).is_terminal());
        assert!(!SourceError::MalformedSnapshot("bad".into()).is_terminal());
    }
}
