use tokio::sync::{mpsc, watch};

use crate::sampler::{Sample, SamplerState};

pub type Series = Vec<(f64, f64)>;

/// Rolling history of one container's samples, drawn as three line charts.
///
/// The graph keeps whatever it last received once the sampler finishes.
pub struct ResourceGraph {
    container: String,
    capacity: usize,
    cpu: Series,
    memory: Series,
    disk: Series,
    last: Option<Sample>,
    samples_rx: Option<mpsc::Receiver<Sample>>,
    state_rx: Option<watch::Receiver<SamplerState>>,
}

impl ResourceGraph {
    pub fn new(container: impl Into<String>, capacity: usize) -> Self {
        Self {
            container: container.into(),
            capacity: capacity.max(2),
            cpu: Vec::new(),
            memory: Vec::new(),
            disk: Vec::new(),
            last: None,
            samples_rx: None,
            state_rx: None,
        }
    }

    pub fn attach(
        &mut self,
        samples_rx: mpsc::Receiver<Sample>,
        state_rx: watch::Receiver<SamplerState>,
    ) {
        self.samples_rx = Some(samples_rx);
        self.state_rx = Some(state_rx);
    }

    /// Pull every queued sample. Returns how many were added.
    pub fn drain(&mut self) -> usize {
        let mut received = Vec::new();
        if let Some(rx) = self.samples_rx.as_mut() {
            while let Ok(sample) = rx.try_recv() {
                received.push(sample);
            }
        }
        let count = received.len();
        for sample in received {
            self.push(sample);
        }
        count
    }

    pub fn push(&mut self, sample: Sample) {
        let x = sample.sequence as f64;
        self.cpu.push((x, sample.cpu_percent));
        self.memory.push((x, sample.memory_mb));
        self.disk.push((x, sample.disk_mb));
        if self.cpu.len() > self.capacity {
            let excess = self.cpu.len() - self.capacity;
            self.cpu.drain(..excess);
            self.memory.drain(..excess);
            self.disk.drain(..excess);
        }
        self.last = Some(sample);
    }

    pub fn state(&self) -> SamplerState {
        self.state_rx
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or(SamplerState::Idle)
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn last(&self) -> Option<&Sample> {
        self.last.as_ref()
    }

    pub fn cpu(&self) -> &Series {
        &self.cpu
    }

    pub fn memory(&self) -> &Series {
        &self.memory
    }

    pub fn disk(&self) -> &Series {
        &self.disk
    }

    pub fn x_bounds(&self) -> [f64; 2] {
        match (self.cpu.first(), self.cpu.last()) {
            (Some((first, _)), Some((last, _))) if last > first => [*first, *last],
            (Some((first, _)), _) => [*first, first + 1.0],
            _ => [0.0, 1.0],
        }
    }
}

/// Upper y bound with some headroom, never below 1.
pub fn y_max(series: &Series) -> f64 {
    let max = series.iter().map(|(_, y)| *y).fold(0.0, f64::max);
    (max * 1.1).max(1.0)
}
