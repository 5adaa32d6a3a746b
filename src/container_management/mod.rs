mod disk;
mod docker;

pub use disk::parse_df_used;
pub use docker::{start_management_process, DockerStatsSource};

#[derive(Debug, Clone)]
pub struct Container {
    pub id: String,
    pub status: ContainerStatus,
    pub name: String,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerStatus {
    Created,
    Running,
    Paused,
    Stopped,
    Restarting,
    Removing,
    Exited,
    Dead,
    Unknown,
}

impl ContainerStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, ContainerStatus::Running)
    }
}

impl From<String> for ContainerStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "created" => ContainerStatus::Created,
            "running" => ContainerStatus::Running,
            "paused" => ContainerStatus::Paused,
            "stopped" => ContainerStatus::Stopped,
            "restarting" => ContainerStatus::Restarting,
            "removing" => ContainerStatus::Removing,
            "exited" => ContainerStatus::Exited,
            "dead" => ContainerStatus::Dead,
            _ => ContainerStatus::Unknown,
        }
    }
}

/// Receiver of the periodic container list.
pub trait ContainerManagement {
    fn remove_container(&mut self, id: &str);
    fn update_containers(&mut self, new_container: Container);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_states_map_to_status() {
        assert!(ContainerStatus::from("running".to_string()).is_running());
        assert_eq!(
            ContainerStatus::from("exited".to_string()),
            ContainerStatus::Exited
        );
        assert_eq!(
            ContainerStatus::from("".to_string()),
            ContainerStatus::Unknown
        );
    }
}
