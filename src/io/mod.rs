pub mod handler;

#[derive(Debug)]
pub enum IoEvent {
    StartMonitoring,
    StartSampler(String),
    StopSampler(String),
    Shutdown,
}
