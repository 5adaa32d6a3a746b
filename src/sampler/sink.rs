use log::{debug, info};
use tokio::sync::mpsc;

use super::Sample;

/// Consumer of samples. Delivery must not block the sampler.
pub trait SampleSink: Send + Sync {
    fn accept(&self, sample: Sample);
}

/// Bounded channel: when the consumer falls behind the newest sample is dropped.
impl SampleSink for mpsc::Sender<Sample> {
    fn accept(&self, sample: Sample) {
        if let Err(e) = self.try_send(sample) {
            debug!("Sample dropped: {}", e);
        }
    }
}

impl SampleSink for mpsc::UnboundedSender<Sample> {
    fn accept(&self, sample: Sample) {
        if self.send(sample).is_err() {
            debug!("Sample dropped: receiver closed");
        }
    }
}

/// Writes every sample to the log.
pub struct LogSink {
    target: String,
}

impl LogSink {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

impl SampleSink for LogSink {
    fn accept(&self, sample: Sample) {
        info!(
            "{} #{} {} cpu={:.2}% mem={:.2}MB disk={:.2}MB",
            self.target,
            sample.sequence,
            sample.captured_at.format("%H:%M:%S"),
            sample.cpu_percent,
            sample.memory_mb,
            sample.disk_mb
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_channel_drops_newest() {
        let (tx, mut rx) = mpsc::channel(1);
        tx.accept(Sample::zero(1));
        tx.accept(Sample::zero(2));
        assert_eq!(rx.try_recv().map(|s| s.sequence), Ok(1));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_channel_is_ignored() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        tx.accept(Sample::zero(1));
    }
}
