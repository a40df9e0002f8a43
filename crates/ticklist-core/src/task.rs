use serde::{Deserialize, Serialize};

/// One entry in the list. Identity is its position; there is no id field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub text: String,

    #[serde(default)]
    pub selected: bool,

    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Open,
    Selected,
    Done,
    SelectedDone,
}

impl Task {
    pub fn new_open(text: String) -> Self {
        Self {
            text,
            selected: false,
            completed: false,
        }
    }

    pub fn state(&self) -> TaskState {
        match (self.selected, self.completed) {
            (false, false) => TaskState::Open,
            (true, false) => TaskState::Selected,
            (false, true) => TaskState::Done,
            (true, true) => TaskState::SelectedDone,
        }
    }
}
