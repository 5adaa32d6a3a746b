pub mod actions;
pub mod graph;
pub mod state;
pub mod ui;

use log::{debug, error};
use tokio::sync::{mpsc, watch};

use crate::container_management::{Container, ContainerManagement};
use crate::sampler::{Sample, SamplerState, StartError};
use crate::{inputs::key::Key, io::IoEvent};
use actions::{Action, Actions};
use graph::ResourceGraph;
use state::AppState;

#[derive(Debug, PartialEq, Eq)]
pub enum AppReturn {
    Exit,
    Continue,
}

pub struct App {
    containers: Vec<Container>,
    /// We could dispatch an IO event
    io_tx: mpsc::Sender<IoEvent>,
    /// Contextual actions
    actions: Actions,
    state: AppState,
    selected_container: Option<String>,
    graph: Option<ResourceGraph>,
    graph_history: usize,
    status_message: Option<String>,
}

impl App {
    pub fn new(io_tx: mpsc::Sender<IoEvent>, graph_history: usize) -> Self {
        let state = AppState::default();
        let actions = state.get_actions();

        Self {
            containers: Vec::new(),
            io_tx,
            actions,
            state,
            selected_container: None,
            graph: None,
            graph_history,
            status_message: None,
        }
    }

    /// Handle a user action
    pub async fn do_action(&mut self, key: Key) -> AppReturn {
        if let Some(action) = self.actions.find(key) {
            if self.state.is_monitoring() {
                self.do_state_monitoring_actions(*action).await
            } else {
                self.do_state_graphing_actions(*action).await
            }
        } else {
            AppReturn::Continue
        }
    }

    async fn do_state_monitoring_actions(&mut self, action: Action) -> AppReturn {
        match action {
            Action::Quit => AppReturn::Exit,
            Action::OpenMonitor => {
                self.open_monitor().await;
                AppReturn::Continue
            }
            Action::Next => {
                self.next();
                AppReturn::Continue
            }
            Action::Previous => {
                self.previous();
                AppReturn::Continue
            }
        }
    }

    async fn do_state_graphing_actions(&mut self, action: Action) -> AppReturn {
        match action {
            Action::Quit => {
                self.close_monitor().await;
                AppReturn::Continue
            }
            _ => AppReturn::Continue,
        }
    }

    async fn open_monitor(&mut self) {
        let container = match self
            .selected_container_index()
            .and_then(|i| self.containers.get(i))
        {
            Some(c) => c.clone(),
            None => return, // No container selected, do nothing
        };
        if !container.status.is_running() {
            error!(
                "Cannot open resource monitor: Container {} is not running.",
                container.id
            );
            self.status_message = Some(format!(
                "Cannot open resource monitor: Container {} is not running.",
                container.name
            ));
            return;
        }

        self.status_message = None;
        self.graph = Some(ResourceGraph::new(
            container.name.clone(),
            self.graph_history,
        ));
        self.set_state(AppState::Graphing {
            container: container.id.clone(),
        });
        self.dispatch(IoEvent::StartSampler(container.id)).await;
    }

    async fn close_monitor(&mut self) {
        if let Some(container) = self.state.graphed_container().map(str::to_string) {
            self.dispatch(IoEvent::StopSampler(container)).await;
        }
        self.graph = None;
        self.set_state(AppState::Monitoring);
    }

    /// Wire the sampler of `container` to the graph, if it is still shown.
    pub fn attach_sampler(
        &mut self,
        container: &str,
        samples_rx: mpsc::Receiver<Sample>,
        state_rx: watch::Receiver<SamplerState>,
    ) -> bool {
        if self.state.graphed_container() != Some(container) {
            return false;
        }
        match self.graph.as_mut() {
            Some(graph) => {
                graph.attach(samples_rx, state_rx);
                true
            }
            None => false,
        }
    }

    pub fn sampler_failed(&mut self, container: &str, err: &StartError) {
        self.status_message = Some(format!("Cannot open resource monitor: {}", err));
        if self.state.graphed_container() == Some(container) {
            self.graph = None;
            self.set_state(AppState::Monitoring);
        }
    }

    /// We could update the app or dispatch event on tick
    pub async fn update_on_tick(&mut self) -> AppReturn {
        if let Some(graph) = self.graph.as_mut() {
            let n = graph.drain();
            if n > 0 {
                debug!("Graph for {} received {} sample(s)", graph.container(), n);
            }
        }
        AppReturn::Continue
    }

    /// Send a network event to the IO thread
    pub async fn dispatch(&mut self, action: IoEvent) {
        if let Err(e) = self.io_tx.send(action).await {
            error!("Error from dispatch {}", e);
        };
    }

    fn set_state(&mut self, state: AppState) {
        self.state = state;
        self.actions = self.state.get_actions();
    }

    pub fn actions(&self) -> &Actions {
        &self.actions
    }
    pub fn state(&self) -> &AppState {
        &self.state
    }
    pub fn containers(&self) -> &Vec<Container> {
        &self.containers
    }
    pub fn graph(&self) -> Option<&ResourceGraph> {
        self.graph.as_ref()
    }
    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }
    pub fn selected_container(&self) -> &Option<String> {
        &self.selected_container
    }
    pub fn selected_container_index(&self) -> Option<usize> {
        self.selected_container
            .as_ref()
            .and_then(|id| self.containers.iter().position(|c| c.id == *id))
    }

    pub fn next(&mut self) {
        let index = match &self.selected_container {
            Some(i) => {
                let idx = self.containers.iter().position(|c| c.id == *i).unwrap_or(0);
                if idx + 1 >= self.containers.len() {
                    idx
                } else {
                    idx + 1
                }
            }
            None => 0,
        };

        self.selected_container = self.containers.get(index).map(|c| c.id.clone());
    }

    pub fn previous(&mut self) {
        let index = match &self.selected_container {
            Some(i) => self
                .containers
                .iter()
                .position(|c| c.id == *i)
                .unwrap_or(0)
                .saturating_sub(1),
            None => 0,
        };

        self.selected_container = self.containers.get(index).map(|c| c.id.clone());
    }
}

impl ContainerManagement for App {
    fn update_containers(&mut self, new_container: Container) {
        self.containers.retain(|c| c.id != new_container.id);
        self.containers.push(new_container);
        self.containers.sort_by(|a, b| a.name.cmp(&b.name));
    }

    fn remove_container(&mut self, id: &str) {
        self.containers.retain(|c| c.id != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container_management::ContainerStatus;

    fn container(id: &str, name: &str, status: ContainerStatus) -> Container {
        Container {
            id: id.to_string(),
            status,
            name: name.to_string(),
            image: "busybox".to_string(),
        }
    }

    fn app() -> (App, mpsc::Receiver<IoEvent>) {
        let (tx, rx) = mpsc::channel(8);
        let mut app = App::new(tx, 60);
        app.update_containers(container("b1", "beta", ContainerStatus::Exited));
        app.update_containers(container("a1", "alpha", ContainerStatus::Running));
        (app, rx)
    }

    #[tokio::test]
    async fn monitor_on_stopped_container_is_refused() {
        let (mut app, mut rx) = app();
        app.next();
        app.next();
        assert_eq!(app.selected_container().as_deref(), Some("b1"));

        app.do_action(Key::Enter).await;
        assert!(app.state().is_monitoring());
        assert!(app.status_message().is_some());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn monitor_round_trip_dispatches_start_and_stop() {
        let (mut app, mut rx) = app();
        app.next();
        app.do_action(Key::Enter).await;
        assert!(app.state().is_graphing());
        assert!(matches!(rx.try_recv(), Ok(IoEvent::StartSampler(id)) if id == "a1"));

        let (samples_tx, samples_rx) = mpsc::channel(4);
        let (_state_tx, state_rx) = watch::channel(SamplerState::Running);
        assert!(app.attach_sampler("a1", samples_rx, state_rx));
        samples_tx.try_send(Sample::zero(1)).unwrap();
        app.update_on_tick().await;
        assert_eq!(app.graph().map(|g| g.cpu().len()), Some(1));

        app.do_action(Key::Esc).await;
        assert!(app.state().is_monitoring());
        assert!(app.graph().is_none());
        assert!(matches!(rx.try_recv(), Ok(IoEvent::StopSampler(id)) if id == "a1"));
    }

    #[test]
    fn late_attach_is_rejected() {
        let (mut app, _rx) = app();
        let (_tx, samples_rx) = mpsc::channel(1);
        let (_state_tx, state_rx) = watch::channel(SamplerState::Running);
        assert!(!app.attach_sampler("a1", samples_rx, state_rx));
    }

    #[test]
    fn failed_start_returns_to_list() {
        let (mut app, _rx) = app();
        app.sampler_failed("a1", &StartError::TargetGone("a1".to_string()));
        assert!(app.state().is_monitoring());
        assert!(app
            .status_message()
            .map(|m| m.contains("not running"))
            .unwrap_or(false));
    }
}
