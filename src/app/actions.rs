use std::collections::HashMap;
use std::fmt::{self, Display};
use std::slice::Iter;

use crate::inputs::key::Key;

/// We define all available action
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Action {
    Quit,
    OpenMonitor,
    Next,
    Previous,
}

impl Action {
    /// All available actions
    pub fn iterator() -> Iter<'static, Action> {
        static ACTIONS: [Action; 4] = [
            Action::Quit,
            Action::OpenMonitor,
            Action::Next,
            Action::Previous,
        ];
        ACTIONS.iter()
    }

    /// List of key associated to action
    pub fn keys(&self) -> &[Key] {
        match self {
            Action::Quit => &[Key::Char('q'), Key::Ctrl('c'), Key::Esc],
            Action::OpenMonitor => &[Key::Char('m'), Key::Enter],
            Action::Next => &[Key::Down, Key::Char('n'), Key::Right],
            Action::Previous => &[Key::Up, Key::Char('p'), Key::Left],
        }
    }
}

/// Could display a user friendly short description of action
impl Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let str = match self {
            Action::Quit => "Quit",
            Action::OpenMonitor => "Monitor",
            Action::Next => "Next",
            Action::Previous => "Previous",
        };
        match self.keys().first() {
            Some(key) => write!(f, "{} {}", key, str),
            None => write!(f, "{}", str),
        }
    }
}

/// The application should have some contextual actions.
#[derive(Default, Debug, Clone)]
pub struct Actions(Vec<Action>);

impl Actions {
    /// Given a key, find the corresponding action
    pub fn find(&self, key: Key) -> Option<&Action> {
        Action::iterator()
            .filter(|action| self.0.contains(action))
            .find(|action| action.keys().contains(&key))
    }

    /// Get contextual actions.
    /// (just for building a help view)
    pub fn actions(&self) -> &[Action] {
        self.0.as_slice()
    }
}

impl From<Vec<Action>> for Actions {
    /// Build contextual action
    ///
    /// # Panics
    ///
    /// If two actions have same key
    fn from(actions: Vec<Action>) -> Self {
        // Check key unicity
        let mut map: HashMap<Key, Vec<Action>> = HashMap::new();
        for action in actions.iter() {
            for key in action.keys().iter() {
                map.entry(*key).or_default().push(*action);
            }
        }
        let errors = map
            .iter()
            .filter(|(_, actions)| actions.len() > 1) // at least two actions share same shortcut
            .map(|(key, actions)| {
                let actions = actions
                    .iter()
                    .map(Action::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("Conflict key {} with actions {}", key, actions)
            })
            .collect::<Vec<_>>();
        if !errors.is_empty() {
            panic!("{}", errors.join("; "))
        }

        // Ok, we can create contextual actions
        Self(actions)
    }
}

impl Display for Actions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let actions = self
            .0
            .iter()
            .map(Action::to_string)
            .collect::<Vec<_>>()
            .join(" | ");
        write!(f, "{}", actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::state::AppState;

    #[test]
    fn contextual_actions_have_unique_keys() {
        let monitoring = AppState::Monitoring.get_actions();
        assert_eq!(monitoring.find(Key::Enter), Some(&Action::OpenMonitor));
        assert_eq!(monitoring.find(Key::Down), Some(&Action::Next));

        let graphing = AppState::Graphing {
            container: "web".to_string(),
        }
        .get_actions();
        assert_eq!(graphing.find(Key::Esc), Some(&Action::Quit));
        assert_eq!(graphing.find(Key::Enter), None);
    }

    #[test]
    #[should_panic]
    fn conflicting_keys_panic() {
        let _: Actions = vec![Action::Next, Action::Next].into();
    }
}
