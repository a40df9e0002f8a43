use anyhow::{Context, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::actions::{ActionVisibility, update_action_buttons};
use crate::storage::{Storage, TASKS_KEY};
use crate::task::Task;
use crate::tasklist::TaskList;
use crate::theme::{self, Theme};

/// First half of an edit. The UI shows `current_text`, collects a reply
/// however it likes, and hands both back to [`Controller::commit_edit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRequest {
    pub position: usize,
    pub current_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(String),
    RequestEdit(usize),
    CommitEdit {
        request: EditRequest,
        reply: Option<String>,
    },
    Delete(usize),
    ToggleSelect(usize),
    ToggleComplete(usize),
    DeleteSelected,
    MarkSelectedDone,
    UndoSelectedDone,
    ClearAll {
        confirmed: bool,
    },
    ToggleTheme,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Added { position: usize },
    EditRequested(EditRequest),
    Edited { position: usize },
    Selected { position: usize, selected: bool },
    Completed { position: usize, completed: bool },
    Removed { count: usize },
    Changed { count: usize },
    ThemeChanged(Theme),
    Ignored,
}

/// Owns the task list, the theme flag and the storage they persist to.
/// Every mutating handler recomputes bulk visibility and then saves.
#[derive(Debug)]
pub struct Controller<S: Storage> {
    storage: S,
    tasks: TaskList,
    visibility: ActionVisibility,
    theme: Theme,
}

impl<S: Storage> Controller<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            tasks: TaskList::new(),
            visibility: ActionVisibility::default(),
            theme: Theme::default(),
        }
    }

    /// Startup sequence: tasks, then theme, then visibility.
    #[instrument(skip(storage))]
    pub fn open(storage: S) -> anyhow::Result<Self> {
        let mut controller = Self::new(storage);
        controller.load_tasks()?;
        controller.load_theme()?;
        controller.update_action_buttons();
        Ok(controller)
    }

    pub fn tasks(&self) -> &TaskList {
        &self.tasks
    }

    pub fn visibility(&self) -> ActionVisibility {
        self.visibility
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn update_action_buttons(&mut self) -> ActionVisibility {
        self.visibility = update_action_buttons(self.tasks.as_slice());
        self.visibility
    }

    #[instrument(skip(self))]
    pub fn apply(&mut self, command: Command) -> anyhow::Result<Outcome> {
        debug!(?command, "applying command");
        match command {
            Command::Add(text) => self.add_task(&text),
            Command::RequestEdit(pos) => self.request_edit(pos).map(Outcome::EditRequested),
            Command::CommitEdit { request, reply } => self.commit_edit(request, reply.as_deref()),
            Command::Delete(pos) => self.delete_task(pos),
            Command::ToggleSelect(pos) => self.toggle_select(pos),
            Command::ToggleComplete(pos) => self.toggle_complete(pos),
            Command::DeleteSelected => self.delete_selected_tasks(),
            Command::MarkSelectedDone => self.mark_selected_done(),
            Command::UndoSelectedDone => self.undo_selected_done(),
            Command::ClearAll { confirmed } => self.clear_all_tasks(confirmed),
            Command::ToggleTheme => self.toggle_dark_mode().map(Outcome::ThemeChanged),
        }
    }

    #[instrument(skip(self, text))]
    pub fn add_task(&mut self, text: &str) -> anyhow::Result<Outcome> {
        let text = text.trim();
        if text.is_empty() {
            debug!("ignoring empty task text");
            return Ok(Outcome::Ignored);
        }

        self.create_task(Task::new_open(text.to_string()));
        self.save_tasks()?;
        info!(count = self.tasks.len(), "task added");
        Ok(Outcome::Added {
            position: self.tasks.len() - 1,
        })
    }

    /// Appends a record as-is. Used by load; does not save.
    pub fn create_task(&mut self, task: Task) {
        self.tasks.push(task);
        self.update_action_buttons();
    }

    pub fn request_edit(&self, pos: usize) -> anyhow::Result<EditRequest> {
        let task = self.task_at(pos)?;
        Ok(EditRequest {
            position: pos,
            current_text: task.text.clone(),
        })
    }

    /// A reply of `None` is a cancel; a blank reply is treated the same way.
    /// Any other reply is stored exactly as typed.
    #[instrument(skip(self, reply), fields(position = request.position))]
    pub fn commit_edit(
        &mut self,
        request: EditRequest,
        reply: Option<&str>,
    ) -> anyhow::Result<Outcome> {
        let current = self.task_at(request.position)?;
        if current.text != request.current_text {
            return Err(anyhow!(
                "task #{} changed since the edit was requested",
                request.position + 1
            ));
        }

        let Some(text) = reply.filter(|t| !t.trim().is_empty()) else {
            debug!("edit cancelled");
            return Ok(Outcome::Ignored);
        };

        self.tasks.set_text(request.position, text.to_string());
        self.save_tasks()?;
        info!("task edited");
        Ok(Outcome::Edited {
            position: request.position,
        })
    }

    #[instrument(skip(self))]
    pub fn delete_task(&mut self, pos: usize) -> anyhow::Result<Outcome> {
        self.tasks
            .remove(pos)
            .ok_or_else(|| missing_task(pos))?;
        self.update_action_buttons();
        self.save_tasks()?;
        Ok(Outcome::Removed { count: 1 })
    }

    #[instrument(skip(self))]
    pub fn toggle_select(&mut self, pos: usize) -> anyhow::Result<Outcome> {
        let selected = self
            .tasks
            .toggle_selected(pos)
            .ok_or_else(|| missing_task(pos))?;
        self.update_action_buttons();
        self.save_tasks()?;
        Ok(Outcome::Selected {
            position: pos,
            selected,
        })
    }

    #[instrument(skip(self))]
    pub fn toggle_complete(&mut self, pos: usize) -> anyhow::Result<Outcome> {
        let completed = self
            .tasks
            .toggle_completed(pos)
            .ok_or_else(|| missing_task(pos))?;
        self.update_action_buttons();
        self.save_tasks()?;
        Ok(Outcome::Completed {
            position: pos,
            completed,
        })
    }

    #[instrument(skip(self))]
    pub fn mark_selected_done(&mut self) -> anyhow::Result<Outcome> {
        let count = self.tasks.mark_selected_done();
        self.update_action_buttons();
        self.save_tasks()?;
        Ok(Outcome::Changed { count })
    }

    #[instrument(skip(self))]
    pub fn undo_selected_done(&mut self) -> anyhow::Result<Outcome> {
        let count = self.tasks.undo_selected_done();
        self.update_action_buttons();
        self.save_tasks()?;
        Ok(Outcome::Changed { count })
    }

    #[instrument(skip(self))]
    pub fn delete_selected_tasks(&mut self) -> anyhow::Result<Outcome> {
        let count = self.tasks.remove_selected();
        self.update_action_buttons();
        self.save_tasks()?;
        Ok(Outcome::Removed { count })
    }

    /// Removes the persisted key rather than writing an empty array. The
    /// in-memory list is only cleared once the key is gone.
    #[instrument(skip(self))]
    pub fn clear_all_tasks(&mut self, confirmed: bool) -> anyhow::Result<Outcome> {
        if !confirmed {
            debug!("clear all declined");
            return Ok(Outcome::Ignored);
        }

        self.storage.remove_item(TASKS_KEY)?;
        let count = self.tasks.clear();
        self.update_action_buttons();
        info!(count, "cleared all tasks");
        Ok(Outcome::Removed { count })
    }

    #[instrument(skip(self))]
    pub fn toggle_dark_mode(&mut self) -> anyhow::Result<Theme> {
        self.theme = theme::toggle_dark_mode(&mut self.storage, self.theme)?;
        Ok(self.theme)
    }

    #[instrument(skip(self))]
    pub fn load_theme(&mut self) -> anyhow::Result<Theme> {
        self.theme = theme::load_theme(&self.storage)?;
        Ok(self.theme)
    }

    #[instrument(skip(self))]
    pub fn save_tasks(&mut self) -> anyhow::Result<()> {
        let serialized = serde_json::to_string(self.tasks.as_slice())?;
        debug!(count = self.tasks.len(), "saving tasks");
        self.storage
            .set_item(TASKS_KEY, &serialized)
            .context("failed to save tasks")
    }

    /// Replaces the in-memory list with the stored one. Absent or
    /// unreadable data loads as an empty list.
    #[instrument(skip(self))]
    pub fn load_tasks(&mut self) -> anyhow::Result<usize> {
        let stored = self.storage.get_item(TASKS_KEY)?;
        let records = match stored.as_deref() {
            None => vec![],
            Some(raw) => match serde_json::from_str::<Vec<Task>>(raw) {
                Ok(records) => records,
                Err(err) => {
                    warn!(error = %err, "stored tasks are not a task array; starting empty");
                    vec![]
                }
            },
        };

        self.tasks = TaskList::new();
        for task in records {
            self.create_task(task);
        }
        self.update_action_buttons();

        debug!(count = self.tasks.len(), "loaded tasks");
        Ok(self.tasks.len())
    }

    fn task_at(&self, pos: usize) -> anyhow::Result<&Task> {
        self.tasks.get(pos).ok_or_else(|| missing_task(pos))
    }
}

fn missing_task(pos: usize) -> anyhow::Error {
    anyhow!("no task #{}", pos + 1)
}
