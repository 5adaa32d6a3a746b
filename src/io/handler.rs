use eyre::Result;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use super::IoEvent;

use crate::app::App;
use crate::container_management::{start_management_process, DockerStatsSource};
use crate::sampler::{SamplerGroup, SamplerOptions};

pub struct IoAsyncHandler {
    app: Arc<Mutex<App>>,
    docker: DockerStatsSource,
    samplers: SamplerGroup,
    list_interval: Duration,
    sink_buffer: usize,
    active_task: Option<JoinHandle<()>>,
}

impl IoAsyncHandler {
    pub fn new(
        app: Arc<tokio::sync::Mutex<App>>,
        docker: DockerStatsSource,
        options: SamplerOptions,
        sink_buffer: usize,
    ) -> Self {
        let samplers = SamplerGroup::new(Arc::new(docker.clone()), options);
        Self {
            app,
            docker,
            samplers,
            list_interval: options.interval,
            sink_buffer: sink_buffer.max(1),
            active_task: None,
        }
    }

    /// We could be async here
    pub async fn handle_io_event(&mut self, io_event: IoEvent) {
        let result = match io_event {
            IoEvent::StartMonitoring => self.start_management().await,
            IoEvent::StartSampler(container_id) => self.start_sampler(container_id).await,
            IoEvent::StopSampler(container_id) => self.stop_sampler(container_id).await,
            IoEvent::Shutdown => self.shutdown().await,
        };

        if let Err(err) = result {
            error!("Oops, something wrong happen: {:?}", err);
        }
    }

    async fn abort_current_task(&mut self) {
        if let Some(task) = self.active_task.take() {
            task.abort();
            let _ = task.await;
        }
    }

    async fn start_management(&mut self) -> Result<()> {
        self.abort_current_task().await;
        let app = Arc::clone(&self.app);
        let docker = self.docker.client().clone();
        let interval = self.list_interval;
        let t = tokio::spawn(async move {
            start_management_process(docker, app, interval).await;
        });
        self.active_task = Some(t);
        Ok(())
    }

    async fn start_sampler(&mut self, container_id: String) -> Result<()> {
        info!("Start resource monitor for container: {}", container_id);
        let (samples_tx, samples_rx) = mpsc::channel(self.sink_buffer);

        if let Err(e) = self.samplers.start(&container_id, samples_tx).await {
            warn!("Cannot open resource monitor: {}", e);
            self.app.lock().await.sampler_failed(&container_id, &e);
            return Ok(());
        }

        let attached = match self.samplers.subscribe(&container_id) {
            Some(state_rx) => {
                self.app
                    .lock()
                    .await
                    .attach_sampler(&container_id, samples_rx, state_rx)
            }
            None => false,
        };
        if !attached {
            // The monitor view was closed while the sampler was starting.
            self.samplers.stop(&container_id).await;
        }
        Ok(())
    }

    async fn stop_sampler(&mut self, container_id: String) -> Result<()> {
        info!("Stop resource monitor for container: {}", container_id);
        if let Some(state) = self.samplers.stop(&container_id).await {
            info!("Resource monitor for {} ended: {}", container_id, state);
        }
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.samplers.shutdown().await;
        self.abort_current_task().await;
        Ok(())
    }
}
