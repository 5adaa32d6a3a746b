use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{ListContainersOptions, Stats, StatsOptions};
use bollard::errors::Error as DockerError;
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::service::{ContainerStateStatusEnum, ContainerSummary};
use bollard::Docker;
use futures::stream::StreamExt;
use log::{debug, error, info, warn};
use tokio::sync::Mutex;

use super::disk::{parse_df_used, DF_COMMAND};
use super::{Container, ContainerManagement, ContainerStatus};
use crate::sampler::{RunState, Snapshot, SourceError, StatsSource};

const NOT_FOUND: u16 = 404;
const CONFLICT: u16 = 409;

/// One frame, without waiting a second cycle for `precpu_stats`.
const SINGLE_FRAME: StatsOptions = StatsOptions {
    stream: false,
    one_shot: true,
};

/// Reads container counters from the local Docker engine.
#[derive(Clone)]
pub struct DockerStatsSource {
    docker: Docker,
}

impl DockerStatsSource {
    pub fn connect() -> Result<Self, DockerError> {
        Ok(Self::new(Docker::connect_with_local_defaults()?))
    }

    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    pub fn client(&self) -> &Docker {
        &self.docker
    }

    /// Used bytes of the container's root filesystem, if it can be probed.
    async fn disk_used(&self, container_id: &str) -> Option<u64> {
        disk_used_from(container_id, self.exec_df(container_id).await)
    }

    async fn exec_df(&self, container_id: &str) -> Result<String, DockerError> {
        let exec = self
            .docker
            .create_exec(
                container_id,
                CreateExecOptions {
                    attach_stdout: Some(true),
                    attach_stderr: Some(false),
                    cmd: Some(DF_COMMAND.to_vec()),
                    ..Default::default()
                },
            )
            .await?;

        let mut text = String::new();
        if let StartExecResults::Attached { mut output, .. } =
            self.docker.start_exec(&exec.id, None).await?
        {
            while let Some(chunk) = output.next().await {
                text.push_str(&format!("{}", chunk?));
            }
        }
        Ok(text)
    }
}

#[async_trait]
impl StatsSource for DockerStatsSource {
    async fn run_state(&self, target: &str) -> Result<RunState, SourceError> {
        let container = self
            .docker
            .inspect_container(target, None)
            .await
            .map_err(|e| classify(target, e))?;
        Ok(run_state_from(container.state.unwrap_or_default().status))
    }

    async fn snapshot(&self, target: &str) -> Result<Snapshot, SourceError> {
        let stream = &mut self.docker.stats(target, Some(SINGLE_FRAME)).take(1);
        let stats = match stream.next().await {
            Some(Ok(s)) => s,
            Some(Err(e)) => return Err(classify(target, e)),
            None => {
                return Err(SourceError::TransientRead(format!(
                    "no stats returned for {}",
                    target
                )))
            }
        };

        let mut snapshot = snapshot_from_stats(&stats);
        snapshot.disk_used_estimate_bytes = self.disk_used(target).await;
        Ok(snapshot)
    }
}

/// Reading disk usage is best-effort: every failure becomes "no estimate".
fn disk_used_from(container_id: &str, output: Result<String, DockerError>) -> Option<u64> {
    match output {
        Ok(output) => {
            let used = parse_df_used(&output);
            if used.is_none() {
                debug!("Unparseable df output from {}: {:?}", container_id, output);
            }
            used
        }
        Err(DockerError::DockerResponseServerError {
            status_code: CONFLICT,
            ..
        }) => {
            info!("Container {} is not running!", container_id);
            None
        }
        Err(e) => {
            warn!("Cannot read disk usage of {}: {}", container_id, e);
            None
        }
    }
}

fn run_state_from(status: Option<ContainerStateStatusEnum>) -> RunState {
    match status.unwrap_or(ContainerStateStatusEnum::EMPTY) {
        ContainerStateStatusEnum::RUNNING => RunState::Running,
        ContainerStateStatusEnum::EMPTY => RunState::Unknown,
        _ => RunState::Stopped,
    }
}

/// Missing counters read as zero; the CPU count falls back to the per-CPU
/// vector (cgroup v1) and then to one.
fn snapshot_from_stats(stats: &Stats) -> Snapshot {
    Snapshot {
        cpu_total_ns: stats.cpu_stats.cpu_usage.total_usage,
        system_cpu_ns: stats.cpu_stats.system_cpu_usage.unwrap_or(0),
        cpu_count: cpu_count(
            stats.cpu_stats.online_cpus,
            stats.cpu_stats.cpu_usage.percpu_usage.as_deref(),
        ),
        memory_used_bytes: stats.memory_stats.usage.unwrap_or(0),
        disk_used_estimate_bytes: None,
    }
}

fn cpu_count(online_cpus: Option<u64>, percpu_usage: Option<&[u64]>) -> u32 {
    online_cpus
        .filter(|n| *n > 0)
        .or_else(|| percpu_usage.map(|v| v.len() as u64).filter(|n| *n > 0))
        .unwrap_or(1) as u32
}

fn classify(target: &str, e: DockerError) -> SourceError {
    match e {
        DockerError::DockerResponseServerError {
            status_code: NOT_FOUND,
            ..
        } => SourceError::TargetNotFound(target.to_string()),
        DockerError::JsonDataError { .. } | DockerError::JsonSerdeError { .. } => {
            SourceError::MalformedSnapshot(e.to_string())
        }
        other => SourceError::TransientRead(other.to_string()),
    }
}

/// Keep `manager` in sync with the engine's container list until the task is aborted.
pub async fn start_management_process(
    docker: Docker,
    manager: Arc<Mutex<impl ContainerManagement + std::marker::Send + 'static>>,
    interval: Duration,
) {
    let mut alive_container_ids = HashSet::new();
    loop {
        match docker
            .list_containers(Some(ListContainersOptions::<String> {
                all: true,
                ..Default::default()
            }))
            .await
        {
            Ok(containers_summary) => {
                let containers: Vec<Container> =
                    containers_summary.into_iter().map(Container::from).collect();
                let container_ids: HashSet<String> =
                    containers.iter().map(|c| c.id.clone()).collect();
                let containers_to_remove = &alive_container_ids - &container_ids;
                if !containers_to_remove.is_empty() {
                    info!("Containers to remove: {:?}", containers_to_remove);
                }

                let mut manager = manager.lock().await;
                for container_id in containers_to_remove {
                    manager.remove_container(&container_id);
                }
                for container in containers {
                    manager.update_containers(container);
                }
                alive_container_ids = container_ids;
            }
            Err(e) => error!("Error listing containers: {}", e),
        }
        tokio::time::sleep(interval).await;
    }
}

impl From<ContainerSummary> for Container {
    fn from(summary: ContainerSummary) -> Self {
        let name = summary
            .names
            .as_ref()
            .and_then(|names| names.first())
            .map(|n| n.trim_start_matches('/').to_string())
            .unwrap_or_default();
        Container {
            id: summary.id.unwrap_or_default(),
            name,
            image: summary.image.unwrap_or_default(),
            status: ContainerStatus::from(summary.state.unwrap_or_default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_terminal() {
        let e = DockerError::DockerResponseServerError {
            status_code: 404,
            message: "No such container".to_string(),
        };
        assert_eq!(
            classify("web", e),
            SourceError::TargetNotFound("web".to_string())
        );
    }

    #[test]
    fn other_server_errors_are_transient() {
        for status_code in [409, 500] {
            let e = DockerError::DockerResponseServerError {
                status_code,
                message: "boom".to_string(),
            };
            assert!(matches!(classify("web", e), SourceError::TransientRead(_)));
        }
    }

    #[test]
    fn undecodable_payload_is_malformed() {
        let err = serde_json::from_str::<Stats>("{\"cpu_stats\":").unwrap_err();
        assert!(matches!(
            classify("web", DockerError::from(err)),
            SourceError::MalformedSnapshot(_)
        ));
    }

    #[test]
    fn failed_df_exec_is_no_estimate() {
        let df = "Filesystem 1024-blocks Used Available Capacity Mounted on\n\
                  overlay 61255492 2048 55000000 1% /\n";
        assert_eq!(disk_used_from("web", Ok(df.to_string())), Some(2048 * 1024));
        assert_eq!(disk_used_from("web", Ok("sh: df: not found".to_string())), None);
        for status_code in [409, 500] {
            let e = DockerError::DockerResponseServerError {
                status_code,
                message: "exec failed".to_string(),
            };
            assert_eq!(disk_used_from("web", Err(e)), None);
        }
    }

    #[test]
    fn stats_request_does_not_wait_for_a_second_cycle() {
        assert!(!SINGLE_FRAME.stream);
        assert!(SINGLE_FRAME.one_shot);
    }

    #[test]
    fn engine_status_maps_to_run_state() {
        use ContainerStateStatusEnum::*;
        assert_eq!(run_state_from(Some(RUNNING)), RunState::Running);
        assert_eq!(run_state_from(Some(EMPTY)), RunState::Unknown);
        assert_eq!(run_state_from(None), RunState::Unknown);
        for status in [CREATED, PAUSED, RESTARTING, REMOVING, EXITED, DEAD] {
            assert_eq!(run_state_from(Some(status)), RunState::Stopped);
        }
    }

    // What the engine answers for a container that is shutting down.
    const STOPPING_CONTAINER_STATS: &str = r#"{
        "read": "0001-01-01T00:00:00Z",
        "preread": "0001-01-01T00:00:00Z",
        "num_procs": 0,
        "pids_stats": {},
        "blkio_stats": {
            "io_service_bytes_recursive": null,
            "io_serviced_recursive": null,
            "io_queue_recursive": null,
            "io_service_time_recursive": null,
            "io_wait_time_recursive": null,
            "io_merged_recursive": null,
            "io_time_recursive": null,
            "sectors_recursive": null
        },
        "storage_stats": {},
        "cpu_stats": {
            "cpu_usage": {"total_usage": 0, "usage_in_kernelmode": 0, "usage_in_usermode": 0},
            "throttling_data": {"periods": 0, "throttled_periods": 0, "throttled_time": 0}
        },
        "precpu_stats": {
            "cpu_usage": {"total_usage": 0, "usage_in_kernelmode": 0, "usage_in_usermode": 0},
            "throttling_data": {"periods": 0, "throttled_periods": 0, "throttled_time": 0}
        },
        "memory_stats": {},
        "name": "/web",
        "id": "abc123"
    }"#;

    #[test]
    fn missing_counters_read_as_zero() {
        let stats: Stats = serde_json::from_str(STOPPING_CONTAINER_STATS).unwrap();
        assert_eq!(
            snapshot_from_stats(&stats),
            Snapshot {
                cpu_total_ns: 0,
                system_cpu_ns: 0,
                cpu_count: 1,
                memory_used_bytes: 0,
                disk_used_estimate_bytes: None,
            }
        );
    }

    #[test]
    fn cpu_count_fallbacks() {
        assert_eq!(cpu_count(Some(4), Some(&[1, 2])), 4);
        assert_eq!(cpu_count(Some(0), Some(&[1, 2, 3])), 3);
        assert_eq!(cpu_count(None, Some(&[])), 1);
        assert_eq!(cpu_count(None, None), 1);
    }

    #[test]
    fn summary_names_lose_leading_slash() {
        let summary = ContainerSummary {
            id: Some("abc123".to_string()),
            names: Some(vec!["/web".to_string()]),
            image: Some("nginx:latest".to_string()),
            state: Some("exited".to_string()),
            ..Default::default()
        };
        let container = Container::from(summary);
        assert_eq!(container.id, "abc123");
        assert_eq!(container.name, "web");
        assert_eq!(container.image, "nginx:latest");
        assert!(!container.status.is_running());
    }
}
