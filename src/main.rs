use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use dockwatch::app::App;
use dockwatch::config::Config;
use dockwatch::container_management::DockerStatsSource;
use dockwatch::io::handler::IoAsyncHandler;
use dockwatch::io::IoEvent;
use dockwatch::sampler::{LogSink, Sampler, SamplerState};
use dockwatch::{logging, start_ui};
use eyre::{Result, WrapErr};
use log::info;

/// Live CPU, memory and disk usage of Docker containers
#[derive(Parser, Debug)]
#[command(name = "dockwatch", version)]
struct Args {
    /// JSON config file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Sampling interval in milliseconds
    #[arg(short, long)]
    interval_ms: Option<u64>,

    /// Longest wait between ticks while reads keep failing
    #[arg(long)]
    max_backoff_ms: Option<u64>,

    /// Give up on a single stats request after this many milliseconds
    #[arg(long)]
    fetch_timeout_ms: Option<u64>,

    #[arg(long)]
    log_file: Option<PathBuf>,

    /// One of off, error, warn, info, debug, trace
    #[arg(long)]
    log_level: Option<String>,

    /// Sample a single container and print every reading instead of opening the UI
    #[arg(short, long, value_name = "CONTAINER")]
    watch: Option<String>,
}

impl Args {
    fn into_config(self) -> Result<(Config, Option<String>)> {
        let mut config = Config::load(self.config.as_deref())?;
        if let Some(v) = self.interval_ms {
            config.interval_ms = v;
        }
        if let Some(v) = self.max_backoff_ms {
            config.max_backoff_ms = Some(v);
        }
        if let Some(v) = self.fetch_timeout_ms {
            config.fetch_timeout_ms = Some(v);
        }
        if let Some(v) = self.log_file {
            config.log_file = v;
        }
        if let Some(v) = self.log_level {
            config.log_level = v;
        }
        config.validate()?;
        Ok((config, self.watch))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let (config, watch) = Args::parse().into_config()?;
    logging::init(&config, watch.is_some())?;

    let docker = DockerStatsSource::connect().wrap_err("cannot connect to the Docker engine")?;

    match watch {
        Some(container) => watch_container(docker, &config, container).await,
        None => run_ui(docker, &config).await,
    }
}

async fn run_ui(docker: DockerStatsSource, config: &Config) -> Result<()> {
    let (sync_io_tx, mut sync_io_rx) = tokio::sync::mpsc::channel::<IoEvent>(100);
    let app = Arc::new(tokio::sync::Mutex::new(App::new(
        sync_io_tx.clone(),
        config.graph_history,
    )));
    let app_ui = Arc::clone(&app);

    let mut handler =
        IoAsyncHandler::new(app, docker, config.sampler_options(), config.sink_buffer);
    let io_task = tokio::spawn(async move {
        while let Some(io_event) = sync_io_rx.recv().await {
            let last = matches!(io_event, IoEvent::Shutdown);
            handler.handle_io_event(io_event).await;
            if last {
                break;
            }
        }
    });

    let ui_result = start_ui(&app_ui).await;
    sync_io_tx.send(IoEvent::Shutdown).await?;
    io_task.await?;
    ui_result
}

async fn watch_container(
    docker: DockerStatsSource,
    config: &Config,
    container: String,
) -> Result<()> {
    let handle = Sampler::start(
        Arc::new(docker),
        container.clone(),
        config.sampler_options(),
        LogSink::new(container.clone()),
    )
    .await?;

    let mut state_rx = handle.subscribe();
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping sampler for {}", container);
            handle.stop();
        }
        _ = state_rx.wait_for(SamplerState::is_terminal) => {}
    }

    let state = handle.join().await;
    info!("Stopped watching {}: {}", container, state);
    Ok(())
}
