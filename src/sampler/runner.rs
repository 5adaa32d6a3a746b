use std::future::Future;
use std::panic;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{
    Backoff, RunState, Sample, SampleSink, SamplerState, Snapshot, SourceError, StartError,
    StatsSource,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerOptions {
    pub interval: Duration,
    /// Upper bound for the wait after repeated read failures.
    pub max_backoff: Duration,
    /// Limit for a single StatsSource call. `None` waits forever.
    pub fetch_timeout: Option<Duration>,
}

impl SamplerOptions {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_backoff: interval,
            fetch_timeout: None,
        }
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Option<Duration>) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }
}

impl Default for SamplerOptions {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

pub struct Sampler;

impl Sampler {
    /// Spawn a polling task for `target`.
    ///
    /// Fails when the engine already reports the target as missing or not running.
    pub async fn start(
        source: Arc<dyn StatsSource>,
        target: impl Into<String>,
        options: SamplerOptions,
        sink: impl SampleSink + 'static,
    ) -> Result<SamplerHandle, StartError> {
        let target = target.into();

        match guarded(options.fetch_timeout, source.run_state(&target)).await {
            Ok(RunState::Stopped) | Err(SourceError::TargetNotFound(_)) => {
                return Err(StartError::TargetGone(target));
            }
            Ok(_) => {}
            Err(e) => warn!("Could not check state of {} before sampling: {}", target, e),
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(SamplerState::Idle);
        state_tx.send_replace(SamplerState::Running);

        info!("Start sampling {} every {:?}", target, options.interval);
        let sampler = SamplerLoop {
            source,
            target: target.clone(),
            fetch_timeout: options.fetch_timeout,
            sink: Box::new(sink),
            previous: None,
            sequence: 0,
            backoff: Backoff::new(options.interval, options.max_backoff),
            state_tx,
            stop_rx,
        };
        let task = tokio::spawn(sampler.run());

        Ok(SamplerHandle {
            target,
            stop_tx,
            state_rx,
            task,
        })
    }
}

/// Control side of a running sampler. Dropping it stops the sampler.
pub struct SamplerHandle {
    target: String,
    stop_tx: watch::Sender<bool>,
    state_rx: watch::Receiver<SamplerState>,
    task: JoinHandle<SamplerState>,
}

impl SamplerHandle {
    /// Ask the loop to exit at its next tick boundary. An in-flight tick still completes.
    pub fn stop(&self) {
        if !self.stop_tx.send_replace(true) {
            debug!("Stop requested for {}", self.target);
        }
    }

    pub fn state(&self) -> SamplerState {
        *self.state_rx.borrow()
    }

    /// Follow state changes, e.g. to show them next to a chart.
    pub fn subscribe(&self) -> watch::Receiver<SamplerState> {
        self.state_rx.clone()
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Wait for the loop to end on its own (target gone) or after `stop`.
    pub async fn join(self) -> SamplerState {
        let SamplerHandle {
            target,
            stop_tx,
            task,
            ..
        } = self;
        let result = task.await;
        drop(stop_tx);
        match result {
            Ok(state) => state,
            Err(e) => {
                error!("Sampler for {} ended abnormally: {}", target, e);
                if e.is_panic() {
                    panic::resume_unwind(e.into_panic());
                }
                SamplerState::Stopped
            }
        }
    }
}

enum Tick {
    Continue,
    TargetGone,
}

struct SamplerLoop {
    source: Arc<dyn StatsSource>,
    target: String,
    fetch_timeout: Option<Duration>,
    sink: Box<dyn SampleSink>,
    previous: Option<Snapshot>,
    sequence: u64,
    backoff: Backoff,
    state_tx: watch::Sender<SamplerState>,
    stop_rx: watch::Receiver<bool>,
}

impl SamplerLoop {
    async fn run(mut self) -> SamplerState {
        loop {
            if *self.stop_rx.borrow() {
                return self.finish(SamplerState::Stopped);
            }

            if let Tick::TargetGone = self.tick().await {
                return self.finish(SamplerState::TargetGone);
            }

            let handle_dropped = tokio::select! {
                _ = tokio::time::sleep(self.backoff.delay()) => false,
                changed = self.stop_rx.changed() => changed.is_err(),
            };
            if handle_dropped {
                return self.finish(SamplerState::Stopped);
            }
        }
    }

    async fn tick(&mut self) -> Tick {
        self.sequence += 1;
        let sequence = self.sequence;

        let run_state = guarded(self.fetch_timeout, self.source.run_state(&self.target)).await;
        match run_state {
            Ok(RunState::Running) => {}
            Ok(RunState::Stopped) => {
                info!("Container {} is not running", self.target);
                return self.target_gone(sequence);
            }
            Ok(RunState::Unknown) => {
                let e = SourceError::TransientRead("engine reported no run state".to_string());
                return self.transient(sequence, e);
            }
            Err(e) if e.is_terminal() => {
                info!("Container {} disappeared: {}", self.target, e);
                return self.target_gone(sequence);
            }
            Err(e) => return self.transient(sequence, e),
        }

        let snapshot = guarded(self.fetch_timeout, self.source.snapshot(&self.target)).await;
        match snapshot {
            Ok(snapshot) => {
                let sample = Sample::derive(sequence, self.previous.as_ref(), &snapshot);
                debug!(
                    "{} #{}: cpu={:.2}% mem={:.2}MB",
                    self.target, sequence, sample.cpu_percent, sample.memory_mb
                );
                self.sink.accept(sample);
                self.previous = Some(snapshot);
                self.backoff.mark_success();
                Tick::Continue
            }
            Err(e) if e.is_terminal() => {
                info!("Container {} disappeared: {}", self.target, e);
                self.target_gone(sequence)
            }
            Err(e) => self.transient(sequence, e),
        }
    }

    fn transient(&mut self, sequence: u64, e: SourceError) -> Tick {
        warn!("Error while sampling {} (tick {}): {}", self.target, sequence, e);
        self.sink.accept(Sample::zero(sequence));
        self.backoff.mark_failure();
        Tick::Continue
    }

    fn target_gone(&mut self, sequence: u64) -> Tick {
        self.sink.accept(Sample::zero(sequence));
        Tick::TargetGone
    }

    fn finish(&self, state: SamplerState) -> SamplerState {
        info!(
            "Sampler for {} finished after {} ticks: {}",
            self.target, self.sequence, state
        );
        self.state_tx.send_replace(state);
        state
    }
}

async fn guarded<T>(
    limit: Option<Duration>,
    call: impl Future<Output = Result<T, SourceError>>,
) -> Result<T, SourceError> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
            Err(SourceError::TransientRead(format!(
                "no answer within {:?}",
                limit
            )))
        }),
        None => call.await,
    }
}
