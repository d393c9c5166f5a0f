use crate::{
    config::BoardConfig,
    domain::{Board, Column, ColumnId, Task, TaskId, BOARD_COLORS},
    error::{BoardError, Result},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(feature = "file-storage")]
pub mod file_storage;
pub mod memory_storage;

#[cfg(feature = "file-storage")]
pub use file_storage::FileStorage;
pub use memory_storage::MemoryStorage;

/// Partial edit of the board header
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardUpdate {
    pub title: Option<String>,
    pub color: Option<String>,
}

/// Authoritative storage for a board, its columns and its tasks
#[async_trait]
pub trait BoardStore: Send + Sync {
    /// Initializes the storage backend, creating a board from `config` if
    /// none exists yet. An existing board is left as it is.
    async fn initialize(&self, config: &BoardConfig) -> Result<()>;

    /// Checks if a board has been initialized
    async fn is_initialized(&self) -> bool;

    /// Loads the whole board with its tasks
    async fn load_board(&self) -> Result<Board>;

    /// Creates a task in `task.column_id` at `task.position`
    async fn create_task(&self, task: &Task) -> Result<Task>;

    /// Saves the editable attributes of a task
    async fn update_task(&self, task: &Task) -> Result<Task>;

    /// Deletes a task
    async fn delete_task(&self, id: &TaskId) -> Result<()>;

    /// Moves a task to an index of a column
    async fn move_task(&self, id: &TaskId, column_id: &ColumnId, index: usize) -> Result<()>;

    /// Creates an empty column at `column.position`
    async fn create_column(&self, column: &Column) -> Result<Column>;

    /// Renames a column
    async fn update_column(&self, id: &ColumnId, title: &str) -> Result<()>;

    /// Deletes a column and every task in it
    async fn delete_column(&self, id: &ColumnId) -> Result<()>;

    /// Moves a column to an index of the board
    async fn move_column(&self, id: &ColumnId, index: usize) -> Result<()>;

    /// Updates the board title and/or color
    async fn update_board(&self, update: &BoardUpdate) -> Result<()>;
}

/// Rejects blank required titles
pub(crate) fn require_title(field: &str, title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(BoardError::validation(field, "title is required"));
    }
    Ok(())
}

pub(crate) fn require_palette_color(color: &str) -> Result<()> {
    if !BOARD_COLORS.contains(&color) {
        return Err(BoardError::validation(
            "color",
            format!("'{}' is not a board color", color),
        ));
    }
    Ok(())
}

// The helpers below hold the backend-side semantics shared by the stores.

pub(crate) fn create_task_in(board: &mut Board, task: &Task) -> Result<Task> {
    require_title("title", &task.title)?;
    if board.task(&task.id).is_some() {
        return Err(BoardError::validation(
            "id",
            format!("task {} already exists", task.id),
        ));
    }
    board.insert_task(task.clone(), &task.column_id, task.position)?;
    stored_task(board, &task.id)
}

pub(crate) fn update_task_in(board: &mut Board, task: &Task) -> Result<Task> {
    require_title("title", &task.title)?;
    board.replace_task(task.clone())?;
    stored_task(board, &task.id)
}

pub(crate) fn delete_task_in(board: &mut Board, id: &TaskId) -> Result<Task> {
    board
        .remove_task(id)
        .ok_or_else(|| BoardError::task_not_found(id))
}

pub(crate) fn move_task_in(
    board: &mut Board,
    id: &TaskId,
    column_id: &ColumnId,
    index: usize,
) -> Result<()> {
    if board.task(id).is_none() {
        return Err(BoardError::task_not_found(id));
    }
    board.move_task(id, column_id, index)?;
    Ok(())
}

pub(crate) fn create_column_in(board: &mut Board, column: &Column) -> Result<Column> {
    require_title("title", &column.title)?;
    board.insert_column(column.clone(), column.position)?;
    board
        .column(&column.id)
        .cloned()
        .ok_or_else(|| BoardError::column_not_found(&column.id))
}

pub(crate) fn update_column_in(board: &mut Board, id: &ColumnId, title: &str) -> Result<()> {
    require_title("title", title)?;
    board.rename_column(id, title)?;
    Ok(())
}

pub(crate) fn delete_column_in(board: &mut Board, id: &ColumnId) -> Result<Vec<Task>> {
    board
        .remove_column(id)
        .map(|(_, tasks)| tasks)
        .ok_or_else(|| BoardError::column_not_found(id))
}

pub(crate) fn move_column_in(board: &mut Board, id: &ColumnId, index: usize) -> Result<()> {
    board.reorder_column(id, index)?;
    Ok(())
}

pub(crate) fn update_board_in(board: &mut Board, update: &BoardUpdate) -> Result<()> {
    if let Some(title) = &update.title {
        require_title("title", title)?;
    }
    if let Some(color) = &update.color {
        require_palette_color(color)?;
    }
    if let Some(title) = &update.title {
        board.set_title(title.clone());
    }
    if let Some(color) = &update.color {
        board.set_color(color.clone());
    }
    Ok(())
}

fn stored_task(board: &Board, id: &TaskId) -> Result<Task> {
    board
        .task(id)
        .cloned()
        .ok_or_else(|| BoardError::task_not_found(id))
}
