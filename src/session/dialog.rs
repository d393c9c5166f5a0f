//! Form submissions and the dialog state around them.

use crate::{
    domain::{parse_due_date, ColumnId, Priority, Task, TaskId},
    error::{BoardError, Result},
    session::{
        mutator::{Mutation, Settlement},
        BoardSession,
    },
    storage::{require_palette_color, BoardUpdate},
};
use chrono::NaiveDate;
use std::str::FromStr;
use tracing::debug;

/// Which dialog, if any, the board currently shows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum UiState {
    #[default]
    Idle,
    EditingBoard,
    Filtering,
    CreatingColumn,
    EditingColumn(ColumnId),
    ConfirmingTaskDelete(TaskId),
    ConfirmingColumnDelete(ColumnId),
}

/// Raw task form input, as typed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskForm {
    pub title: String,
    pub description: String,
    pub assignee: String,
    /// One of `low`, `medium`, `high`; blank means medium
    pub priority: String,
    /// `YYYY-MM-DD` or an RFC 3339 timestamp; blank means none
    pub due_date: String,
}

/// Validated task form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFields {
    pub title: String,
    pub description: Option<String>,
    pub assignee: Option<String>,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
}

impl TaskForm {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn parse(&self) -> Result<TaskFields> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(BoardError::validation("title", "title is required"));
        }

        let priority = match self.priority.trim() {
            "" => Priority::default(),
            value => Priority::from_str(value)?,
        };
        let due_date = match self.due_date.trim() {
            "" => None,
            value => Some(parse_due_date(value)?),
        };

        Ok(TaskFields {
            title: title.to_string(),
            description: optional(&self.description),
            assignee: optional(&self.assignee),
            priority,
            due_date,
        })
    }
}

impl TaskFields {
    fn write_to(self, task: &mut Task) {
        task.title = self.title;
        task.description = self.description;
        task.assignee = self.assignee;
        task.priority = self.priority;
        task.due_date = self.due_date;
    }
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn required_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(BoardError::validation("title", "title is required"));
    }
    Ok(title.to_string())
}

impl BoardSession {
    pub fn open_board_editor(&mut self) {
        self.ui = UiState::EditingBoard;
    }

    /// Saves the board header. A blank color keeps the current one.
    pub async fn submit_board_edit(&mut self, title: &str, color: &str) -> Result<Settlement> {
        let title = required_title(title)?;
        let color = match color.trim() {
            "" => None,
            color => {
                require_palette_color(color)?;
                Some(color.to_string())
            }
        };

        let update = BoardUpdate {
            title: Some(title),
            color,
        };
        let settlement = self.execute(Mutation::UpdateBoard(update)).await?;
        self.close_on_success(settlement);
        Ok(settlement)
    }

    pub fn open_filter(&mut self) {
        self.ui = UiState::Filtering;
    }

    pub fn close_filter(&mut self) {
        if self.ui == UiState::Filtering {
            self.ui = UiState::Idle;
        }
    }

    pub fn open_column_creator(&mut self) {
        self.ui = UiState::CreatingColumn;
    }

    /// Appends a new column
    pub async fn submit_new_column(&mut self, title: &str) -> Result<Settlement> {
        let title = required_title(title)?;
        let mut column = crate::domain::Column::new(title);
        column.position = self.board.columns().len();

        let settlement = self.execute(Mutation::CreateColumn(column)).await?;
        self.close_on_success(settlement);
        Ok(settlement)
    }

    pub fn open_column_editor(&mut self, column_id: &ColumnId) -> Result<()> {
        if self.board.column(column_id).is_none() {
            return Err(BoardError::InvalidTarget(format!("unknown column {}", column_id)));
        }
        self.ui = UiState::EditingColumn(column_id.clone());
        Ok(())
    }

    /// Renames the column opened with [`BoardSession::open_column_editor`]
    pub async fn submit_column_edit(&mut self, title: &str) -> Result<Settlement> {
        let UiState::EditingColumn(column_id) = self.ui.clone() else {
            return Err(BoardError::InvalidTarget("no column is being edited".to_string()));
        };
        let title = required_title(title)?;

        let settlement = self
            .execute(Mutation::RenameColumn { column_id, title })
            .await?;
        self.close_on_success(settlement);
        Ok(settlement)
    }

    /// Creates a task at the end of `column_id`, or of the first column
    pub async fn submit_new_task(
        &mut self,
        form: &TaskForm,
        column_id: Option<&ColumnId>,
    ) -> Result<Settlement> {
        let fields = form.parse()?;
        let column = match column_id {
            Some(id) => self
                .board
                .column(id)
                .ok_or_else(|| BoardError::InvalidTarget(format!("unknown column {}", id)))?,
            None => self
                .board
                .first_column()
                .ok_or(BoardError::NoColumnAvailable)?,
        };

        let mut task = Task::new(fields.title.clone(), column.id.clone());
        task.position = column.len();
        fields.write_to(&mut task);

        self.execute(Mutation::CreateTask(task)).await
    }

    /// Replaces the editable attributes of a task
    pub async fn submit_task_edit(
        &mut self,
        task_id: &TaskId,
        form: &TaskForm,
    ) -> Result<Settlement> {
        let fields = form.parse()?;
        let mut task = self
            .board
            .task(task_id)
            .cloned()
            .ok_or_else(|| BoardError::InvalidTarget(format!("unknown task {}", task_id)))?;
        fields.write_to(&mut task);

        self.execute(Mutation::UpdateTask(task)).await
    }

    pub fn request_delete_task(&mut self, task_id: &TaskId) -> Result<()> {
        if self.board.task(task_id).is_none() {
            return Err(BoardError::InvalidTarget(format!("unknown task {}", task_id)));
        }
        self.ui = UiState::ConfirmingTaskDelete(task_id.clone());
        Ok(())
    }

    pub fn request_delete_column(&mut self, column_id: &ColumnId) -> Result<()> {
        if self.board.column(column_id).is_none() {
            return Err(BoardError::InvalidTarget(format!("unknown column {}", column_id)));
        }
        self.ui = UiState::ConfirmingColumnDelete(column_id.clone());
        Ok(())
    }

    /// Carries out the pending delete confirmation and dismisses it.
    ///
    /// A delete refused because the target is still being saved keeps the
    /// confirmation open so it can be confirmed again.
    pub async fn confirm_delete(&mut self) -> Result<Settlement> {
        let confirming = std::mem::take(&mut self.ui);
        let mutation = match &confirming {
            UiState::ConfirmingTaskDelete(task_id) => Some(Mutation::DeleteTask(task_id.clone())),
            UiState::ConfirmingColumnDelete(column_id) => {
                Some(Mutation::DeleteColumn(column_id.clone()))
            }
            _ => None,
        };
        let Some(mutation) = mutation else {
            debug!("Nothing to confirm in {:?}", confirming);
            self.ui = confirming;
            return Ok(Settlement::Unchanged);
        };

        match self.execute(mutation).await {
            // The target vanished while the dialog was open
            Err(BoardError::InvalidTarget(reason)) => {
                debug!("Delete skipped: {}", reason);
                Ok(Settlement::Unchanged)
            }
            Err(e @ BoardError::Busy(_)) => {
                self.ui = confirming;
                Err(e)
            }
            result => result,
        }
    }

    /// Dismisses whatever dialog is open, discarding its captured target
    pub fn cancel(&mut self) {
        self.ui = UiState::Idle;
    }

    /// Forms stay open after a failed save so the input can be resubmitted
    fn close_on_success(&mut self, settlement: Settlement) {
        if matches!(settlement, Settlement::Confirmed | Settlement::Unchanged) {
            self.ui = UiState::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SessionConfig,
        domain::Board,
        session::test_support::{ids, session},
        storage::MemoryStorage,
    };
    use std::sync::Arc;

    #[test]
    fn test_form_parsing() {
        let form = TaskForm {
            title: "  Review PR ".to_string(),
            description: "   ".to_string(),
            assignee: "kim".to_string(),
            priority: "high".to_string(),
            due_date: "2024-05-01".to_string(),
        };
        let fields = form.parse().unwrap();

        assert_eq!(fields.title, "Review PR");
        assert_eq!(fields.description, None);
        assert_eq!(fields.assignee.as_deref(), Some("kim"));
        assert_eq!(fields.priority, Priority::High);
        assert_eq!(fields.due_date, NaiveDate::from_ymd_opt(2024, 5, 1));

        let defaults = TaskForm::titled("Plain").parse().unwrap();
        assert_eq!(defaults.priority, Priority::Medium);
        assert_eq!(defaults.due_date, None);
    }

    #[test]
    fn test_form_rejects_bad_input() {
        let cases = [
            (TaskForm::titled("   "), "title"),
            (
                TaskForm {
                    priority: "urgent".to_string(),
                    ..TaskForm::titled("x")
                },
                "priority",
            ),
            (
                TaskForm {
                    due_date: "next week".to_string(),
                    ..TaskForm::titled("x")
                },
                "due_date",
            ),
        ];
        for (form, expected) in cases {
            match form.parse() {
                Err(BoardError::Validation { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected validation error on {}, got {:?}", expected, other),
            }
        }
    }

    #[tokio::test]
    async fn test_new_task_goes_to_end_of_first_column() {
        let (mut session, store) = session();

        let settlement = session
            .submit_new_task(&TaskForm::titled("e"), None)
            .await
            .unwrap();

        assert_eq!(settlement, Settlement::Confirmed);
        let todo = ids(session.board(), "todo");
        assert_eq!(todo.len(), 4);
        assert_eq!(&todo[..3], ["a", "b", "c"]);
        let stored = store.snapshot().await.unwrap();
        assert_eq!(ids(&stored, "todo"), todo);
    }

    #[tokio::test]
    async fn test_new_task_in_chosen_column() {
        let (mut session, _store) = session();

        session
            .submit_new_task(&TaskForm::titled("e"), Some(&ColumnId::from("done")))
            .await
            .unwrap();
        assert_eq!(ids(session.board(), "done").len(), 1);

        let result = session
            .submit_new_task(&TaskForm::titled("f"), Some(&ColumnId::from("ghost")))
            .await;
        assert!(matches!(result, Err(BoardError::InvalidTarget(_))));
    }

    #[tokio::test]
    async fn test_invalid_task_form_is_never_sent() {
        let (mut session, store) = session();
        let before = session.board().clone();

        let result = session.submit_new_task(&TaskForm::titled(""), None).await;

        assert!(matches!(result, Err(BoardError::Validation { .. })));
        assert_eq!(session.board(), &before);
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_new_task_without_columns() {
        let board = Board::new("Empty", "bg-blue-500");
        let store = Arc::new(MemoryStorage::with_board(board.clone()));
        let mut session = BoardSession::new(board, store, SessionConfig::default());

        let result = session.submit_new_task(&TaskForm::titled("e"), None).await;
        assert!(matches!(result, Err(BoardError::NoColumnAvailable)));
    }

    #[tokio::test]
    async fn test_task_edit() {
        let (mut session, store) = session();
        let task_id = TaskId::from("a");
        let form = TaskForm {
            assignee: "lee".to_string(),
            priority: "high".to_string(),
            ..TaskForm::titled("Renamed")
        };

        let settlement = session.submit_task_edit(&task_id, &form).await.unwrap();

        assert_eq!(settlement, Settlement::Confirmed);
        let task = session.board().task(&task_id).unwrap();
        assert_eq!(task.title, "Renamed");
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.assignee.as_deref(), Some("lee"));
        assert_eq!(ids(session.board(), "todo"), ["a", "b", "c"]);
        let stored = store.snapshot().await.unwrap();
        assert_eq!(stored.task(&task_id), Some(task));
    }

    #[tokio::test]
    async fn test_confirmed_task_delete() {
        let (mut session, store) = session();
        let task_id = TaskId::from("b");

        session.request_delete_task(&task_id).unwrap();
        assert_eq!(session.ui_state(), &UiState::ConfirmingTaskDelete(task_id.clone()));

        let settlement = session.confirm_delete().await.unwrap();

        assert_eq!(settlement, Settlement::Confirmed);
        assert_eq!(session.ui_state(), &UiState::Idle);
        assert_eq!(ids(session.board(), "todo"), ["a", "c"]);
        assert!(store.snapshot().await.unwrap().task(&task_id).is_none());
    }

    #[tokio::test]
    async fn test_cancelled_delete_changes_nothing() {
        let (mut session, store) = session();
        let before = session.board().clone();

        session.request_delete_column(&ColumnId::from("todo")).unwrap();
        session.cancel();

        assert_eq!(session.ui_state(), &UiState::Idle);
        assert_eq!(session.confirm_delete().await.unwrap(), Settlement::Unchanged);
        assert_eq!(session.board(), &before);
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_task_delete_restores_position() {
        let (mut session, store) = session();
        let before = session.board().clone();
        store.set_failing(true);

        session.request_delete_task(&TaskId::from("b")).unwrap();
        let settlement = session.confirm_delete().await.unwrap();

        assert_eq!(settlement, Settlement::Reverted);
        assert_eq!(session.ui_state(), &UiState::Idle);
        assert_eq!(session.board(), &before);
        assert_eq!(session.notices().len(), 1);
    }

    #[tokio::test]
    async fn test_column_delete_takes_its_tasks() {
        let (mut session, store) = session();

        session.request_delete_column(&ColumnId::from("todo")).unwrap();
        session.confirm_delete().await.unwrap();

        let board = session.board();
        assert!(board.column(&ColumnId::from("todo")).is_none());
        assert!(board.task(&TaskId::from("a")).is_none());
        assert_eq!(board.total_tasks(), 1);
        assert_eq!(board.columns()[0].position, 0);
        let stored = store.snapshot().await.unwrap();
        assert_eq!(stored.total_tasks(), 1);
    }

    #[tokio::test]
    async fn test_delete_of_vanished_target() {
        let (mut session, _store) = session();
        let task_id = TaskId::from("c");
        session.request_delete_task(&task_id).unwrap();
        session
            .execute(Mutation::DeleteTask(task_id.clone()))
            .await
            .unwrap();

        assert_eq!(session.confirm_delete().await.unwrap(), Settlement::Unchanged);
        assert_eq!(session.ui_state(), &UiState::Idle);
    }

    #[tokio::test]
    async fn test_delete_waits_for_pending_save() {
        let (mut session, store) = session();
        let task_id = TaskId::from("a");

        session.drag_start("a");
        let pending = session.begin_drop(Some("done")).unwrap();
        session.request_delete_task(&task_id).unwrap();

        let result = session.confirm_delete().await;
        assert!(matches!(result, Err(BoardError::Busy(_))));
        assert_eq!(session.ui_state(), &UiState::ConfirmingTaskDelete(task_id.clone()));
        assert!(session.board().task(&task_id).is_some());

        let result = pending.persist(store.as_ref()).await;
        session.settle(pending, result).await;
        assert_eq!(session.confirm_delete().await.unwrap(), Settlement::Confirmed);
        assert_eq!(session.ui_state(), &UiState::Idle);
        assert!(session.board().task(&task_id).is_none());
        assert!(store.snapshot().await.unwrap().task(&task_id).is_none());
    }

    #[test]
    fn test_delete_request_for_unknown_item() {
        let (mut session, _store) = session();
        assert!(session.request_delete_task(&TaskId::from("ghost")).is_err());
        assert!(session.request_delete_column(&ColumnId::from("ghost")).is_err());
        assert_eq!(session.ui_state(), &UiState::Idle);
    }

    #[tokio::test]
    async fn test_column_create_and_rename() {
        let (mut session, store) = session();

        session.open_column_creator();
        assert_eq!(session.ui_state(), &UiState::CreatingColumn);
        session.submit_new_column("Blocked").await.unwrap();
        assert_eq!(session.ui_state(), &UiState::Idle);
        let last = session.board().columns().last().unwrap();
        assert_eq!(last.title, "Blocked");
        assert_eq!(last.position, 3);

        let column_id = ColumnId::from("doing");
        session.open_column_editor(&column_id).unwrap();
        session.submit_column_edit("In Progress").await.unwrap();
        assert_eq!(session.ui_state(), &UiState::Idle);
        assert_eq!(session.board().column(&column_id).unwrap().title, "In Progress");

        let stored = store.snapshot().await.unwrap();
        assert_eq!(stored.columns().len(), 4);
        assert_eq!(stored.column(&column_id).unwrap().title, "In Progress");
    }

    #[tokio::test]
    async fn test_column_edit_requires_open_editor() {
        let (mut session, _store) = session();
        let result = session.submit_column_edit("Anything").await;
        assert!(matches!(result, Err(BoardError::InvalidTarget(_))));
        assert!(session.open_column_editor(&ColumnId::from("ghost")).is_err());
    }

    #[tokio::test]
    async fn test_board_edit() {
        let (mut session, store) = session();

        session.open_board_editor();
        session.submit_board_edit("Roadmap", "").await.unwrap();
        assert_eq!(session.board().title, "Roadmap");
        assert_eq!(session.board().color, "bg-blue-500");
        assert_eq!(session.ui_state(), &UiState::Idle);

        session.submit_board_edit("Roadmap", "bg-green-500").await.unwrap();
        let stored = store.snapshot().await.unwrap();
        assert_eq!(stored.title, "Roadmap");
        assert_eq!(stored.color, "bg-green-500");
    }

    #[tokio::test]
    async fn test_board_edit_validation() {
        let (mut session, store) = session();
        session.open_board_editor();

        let result = session.submit_board_edit("Roadmap", "#ff0000").await;
        assert!(matches!(result, Err(BoardError::Validation { .. })));
        let result = session.submit_board_edit(" ", "").await;
        assert!(matches!(result, Err(BoardError::Validation { .. })));

        assert_eq!(session.ui_state(), &UiState::EditingBoard);
        assert_eq!(session.board().title, "Sample");
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_board_edit_keeps_dialog_open() {
        let (mut session, store) = session();
        store.set_failing(true);
        session.open_board_editor();

        let settlement = session.submit_board_edit("Roadmap", "").await.unwrap();

        assert_eq!(settlement, Settlement::Reverted);
        assert_eq!(session.board().title, "Sample");
        assert_eq!(session.ui_state(), &UiState::EditingBoard);
    }

    #[test]
    fn test_filter_dialog() {
        let (mut session, _store) = session();
        session.open_filter();
        assert_eq!(session.ui_state(), &UiState::Filtering);
        session.filter_mut().toggle_assignee("kim");
        session.close_filter();
        assert_eq!(session.ui_state(), &UiState::Idle);
        assert!(session.filter().is_active());
    }
}
