use super::actions::{Action, Actions};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AppState {
    Monitoring,
    Graphing { container: String },
}

impl Default for AppState {
    fn default() -> Self {
        Self::Monitoring
    }
}

impl AppState {
    pub fn get_actions(&self) -> Actions {
        if self.is_monitoring() {
            vec![
                Action::Quit,
                Action::OpenMonitor,
                Action::Next,
                Action::Previous,
            ]
            .into()
        } else {
            vec![Action::Quit].into()
        }
    }

    pub fn is_monitoring(&self) -> bool {
        matches!(self, &Self::Monitoring)
    }

    pub fn is_graphing(&self) -> bool {
        matches!(self, &Self::Graphing { .. })
    }

    pub fn graphed_container(&self) -> Option<&str> {
        match self {
            Self::Graphing { container } => Some(container),
            Self::Monitoring => None,
        }
    }
}
