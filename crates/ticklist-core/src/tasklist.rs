use tracing::{debug, trace};

use crate::task::Task;

/// Ordered, in-memory task collection. Positions are 0-based.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskList {
    tasks: Vec<Task>,
}

impl TaskList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, pos: usize) -> Option<&Task> {
        self.tasks.get(pos)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn as_slice(&self) -> &[Task] {
        &self.tasks
    }

    pub fn push(&mut self, task: Task) {
        trace!(text = %task.text, "appending task");
        self.tasks.push(task);
    }

    pub fn remove(&mut self, pos: usize) -> Option<Task> {
        if pos < self.tasks.len() {
            Some(self.tasks.remove(pos))
        } else {
            None
        }
    }

    pub fn toggle_selected(&mut self, pos: usize) -> Option<bool> {
        let task = self.tasks.get_mut(pos)?;
        task.selected = !task.selected;
        Some(task.selected)
    }

    pub fn toggle_completed(&mut self, pos: usize) -> Option<bool> {
        let task = self.tasks.get_mut(pos)?;
        task.completed = !task.completed;
        Some(task.completed)
    }

    pub fn set_text(&mut self, pos: usize, text: String) -> Option<String> {
        let task = self.tasks.get_mut(pos)?;
        Some(std::mem::replace(&mut task.text, text))
    }

    /// Selected tasks become completed and lose their selection.
    pub fn mark_selected_done(&mut self) -> usize {
        let mut changed = 0;
        for task in self.tasks.iter_mut().filter(|t| t.selected) {
            task.completed = true;
            task.selected = false;
            changed += 1;
        }
        debug!(changed, "marked selected tasks done");
        changed
    }

    /// Only tasks that are both selected and completed are reverted; a
    /// selected open task keeps its checkbox.
    pub fn undo_selected_done(&mut self) -> usize {
        let mut changed = 0;
        for task in self
            .tasks
            .iter_mut()
            .filter(|t| t.selected && t.completed)
        {
            task.completed = false;
            task.selected = false;
            changed += 1;
        }
        debug!(changed, "reverted selected completed tasks");
        changed
    }

    pub fn remove_selected(&mut self) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| !t.selected);
        let removed = before - self.tasks.len();
        debug!(removed, "removed selected tasks");
        removed
    }

    pub fn clear(&mut self) -> usize {
        let removed = self.tasks.len();
        self.tasks.clear();
        removed
    }
}
