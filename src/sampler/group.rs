use std::collections::HashMap;
use std::sync::Arc;

use log::info;
use tokio::sync::watch;

use super::{
    SampleSink, Sampler, SamplerHandle, SamplerOptions, SamplerState, StartError, StatsSource,
};

/// One sampler per monitored container, all reading from the same source.
pub struct SamplerGroup {
    source: Arc<dyn StatsSource>,
    options: SamplerOptions,
    handles: HashMap<String, SamplerHandle>,
}

impl SamplerGroup {
    pub fn new(source: Arc<dyn StatsSource>, options: SamplerOptions) -> Self {
        Self {
            source,
            options,
            handles: HashMap::new(),
        }
    }

    /// Start sampling `target`, replacing any sampler already bound to it.
    pub async fn start(
        &mut self,
        target: &str,
        sink: impl SampleSink + 'static,
    ) -> Result<(), StartError> {
        if let Some(old) = self.handles.remove(target) {
            old.stop();
            old.join().await;
        }
        let handle =
            Sampler::start(Arc::clone(&self.source), target, self.options, sink).await?;
        self.handles.insert(target.to_string(), handle);
        Ok(())
    }

    /// Stop the sampler bound to `target`. Unknown targets are ignored.
    pub async fn stop(&mut self, target: &str) -> Option<SamplerState> {
        let handle = self.handles.remove(target)?;
        handle.stop();
        Some(handle.join().await)
    }

    pub fn subscribe(&self, target: &str) -> Option<watch::Receiver<SamplerState>> {
        self.handles.get(target).map(SamplerHandle::subscribe)
    }

    pub fn is_monitoring(&self, target: &str) -> bool {
        self.handles
            .get(target)
            .map(|h| !h.state().is_terminal())
            .unwrap_or(false)
    }

    pub async fn shutdown(&mut self) {
        info!("Stopping {} sampler(s)", self.handles.len());
        for handle in self.handles.values() {
            handle.stop();
        }
        for (_, handle) in self.handles.drain() {
            handle.join().await;
        }
    }
}
