use tracing::trace;

use crate::task::Task;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionSummary {
    pub any_selected: bool,
    pub any_completed_selected: bool,
}

impl SelectionSummary {
    pub fn scan(tasks: &[Task]) -> Self {
        Self {
            any_selected: tasks.iter().any(|t| t.selected),
            any_completed_selected: tasks.iter().any(|t| t.selected && t.completed),
        }
    }
}

/// Which bulk controls are offered for the current list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionVisibility {
    pub delete_selected: bool,
    pub mark_done: bool,
    pub undo_done: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkAction {
    DeleteSelected,
    MarkDone,
    UndoDone,
}

impl BulkAction {
    pub fn label(self) -> &'static str {
        match self {
            Self::DeleteSelected => "delete selected",
            Self::MarkDone => "mark done",
            Self::UndoDone => "undo done",
        }
    }

    pub fn command_name(self) -> &'static str {
        match self {
            Self::DeleteSelected => "purge",
            Self::MarkDone => "done",
            Self::UndoDone => "undo",
        }
    }
}

impl ActionVisibility {
    pub fn is_visible(&self, action: BulkAction) -> bool {
        match action {
            BulkAction::DeleteSelected => self.delete_selected,
            BulkAction::MarkDone => self.mark_done,
            BulkAction::UndoDone => self.undo_done,
        }
    }

    pub fn visible(&self) -> Vec<BulkAction> {
        [
            BulkAction::DeleteSelected,
            BulkAction::MarkDone,
            BulkAction::UndoDone,
        ]
        .into_iter()
        .filter(|action| self.is_visible(*action))
        .collect()
    }
}

pub fn update_action_buttons(tasks: &[Task]) -> ActionVisibility {
    let summary = SelectionSummary::scan(tasks);
    let visibility = ActionVisibility {
        delete_selected: summary.any_selected,
        mark_done: summary.any_selected,
        undo_done: summary.any_completed_selected,
    };
    trace!(?visibility, "recomputed bulk action visibility");
    visibility
}

#[cfg(test)]
mod tests {
    use super::{ActionVisibility, BulkAction, update_action_buttons};
    use crate::task::Task;

    fn task(selected: bool, completed: bool) -> Task {
        Task {
            text: "t".to_string(),
            selected,
            completed,
        }
    }

    #[test]
    fn empty_list_hides_everything() {
        assert_eq!(update_action_buttons(&[]), ActionVisibility::default());
    }

    #[test]
    fn selected_open_task_shows_delete_and_done() {
        let vis = update_action_buttons(&[task(true, false), task(false, false)]);
        assert!(vis.delete_selected);
        assert!(vis.mark_done);
        assert!(!vis.undo_done);
        assert_eq!(
            vis.visible(),
            vec![BulkAction::DeleteSelected, BulkAction::MarkDone]
        );
    }

    #[test]
    fn unselected_completed_task_does_not_offer_undo() {
        let vis = update_action_buttons(&[task(false, true)]);
        assert_eq!(vis, ActionVisibility::default());
    }

    #[test]
    fn selected_completed_task_offers_all_three() {
        let vis = update_action_buttons(&[task(true, true)]);
        assert_eq!(vis.visible().len(), 3);
    }

    #[test]
    fn recompute_is_stable() {
        let tasks = vec![task(true, true), task(false, false)];
        assert_eq!(update_action_buttons(&tasks), update_action_buttons(&tasks));
    }
}
