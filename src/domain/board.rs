use crate::{
    config::BoardConfig,
    domain::{
        column::{Column, ColumnId},
        task::{Task, TaskId},
    },
    error::{BoardError, Result},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

/// Swatches a board may be painted with
pub const BOARD_COLORS: [&str; 12] = [
    "bg-blue-500",
    "bg-green-500",
    "bg-yellow-500",
    "bg-red-500",
    "bg-purple-500",
    "bg-pink-500",
    "bg-indigo-500",
    "bg-gray-500",
    "bg-orange-500",
    "bg-teal-500",
    "bg-cyan-500",
    "bg-emerald-500",
];

/// Kanban board state: the ordered columns and the tasks they hold.
///
/// Every structural mutation renumbers the affected `position` fields so they
/// stay dense (`0..len`) for both columns and the tasks inside each column.
/// Task records live in a registry keyed by id; columns only hold the order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: String,
    pub title: String,
    pub color: String,
    columns: Vec<Column>,
    #[serde(skip)]
    tasks: HashMap<TaskId, Task>,
}

impl Board {
    pub fn new(title: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            color: color.into(),
            columns: Vec::new(),
            tasks: HashMap::new(),
        }
    }

    /// Builds an empty board with the configured default columns
    pub fn from_config(config: &BoardConfig) -> Self {
        let mut board = Self::new(config.title.clone(), config.color.clone());
        for title in &config.columns {
            board.push_column(Column::new(title.clone()));
        }
        board
    }

    /// Attaches task records loaded separately from the board layout.
    ///
    /// Column sequences referencing missing tasks are pruned and tasks no
    /// column references are dropped, so the result always satisfies the
    /// board invariants.
    pub fn with_tasks(mut self, tasks: impl IntoIterator<Item = Task>) -> Self {
        let mut pool: HashMap<TaskId, Task> =
            tasks.into_iter().map(|t| (t.id.clone(), t)).collect();
        self.tasks.clear();

        for col_idx in 0..self.columns.len() {
            let ids = std::mem::take(&mut self.columns[col_idx].task_ids);
            for id in ids {
                match pool.remove(&id) {
                    Some(mut task) => {
                        task.column_id = self.columns[col_idx].id.clone();
                        self.columns[col_idx].task_ids.push(id.clone());
                        self.tasks.insert(id, task);
                    }
                    None => warn!("Dropping reference to missing task {}", id),
                }
            }
            self.renumber_column(col_idx);
        }

        for id in pool.keys() {
            warn!("Dropping task {} that no column references", id);
        }
        self.renumber_columns();
        self
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, column_id: &ColumnId) -> Option<&Column> {
        self.columns.iter().find(|c| &c.id == column_id)
    }

    pub fn column_index(&self, column_id: &ColumnId) -> Option<usize> {
        self.columns.iter().position(|c| &c.id == column_id)
    }

    pub fn first_column(&self) -> Option<&Column> {
        self.columns.first()
    }

    pub fn task(&self, task_id: &TaskId) -> Option<&Task> {
        self.tasks.get(task_id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Column holding the task, if any
    pub fn column_of(&self, task_id: &TaskId) -> Option<&Column> {
        self.locate(task_id).map(|(col_idx, _)| &self.columns[col_idx])
    }

    /// Column id and index of a task within it
    pub fn locate_task(&self, task_id: &TaskId) -> Option<(ColumnId, usize)> {
        self.locate(task_id)
            .map(|(col_idx, idx)| (self.columns[col_idx].id.clone(), idx))
    }

    /// Tasks of a column in display order
    pub fn ordered_tasks(&self, column_id: &ColumnId) -> Vec<&Task> {
        self.column(column_id)
            .map(|column| {
                column
                    .task_ids
                    .iter()
                    .filter_map(|id| self.tasks.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn total_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Inserts a task into a column at `index`, clamped to the column length.
    ///
    /// A task already on the board is detached from its old place first.
    /// Returns the index the task landed at.
    pub fn insert_task(
        &mut self,
        mut task: Task,
        column_id: &ColumnId,
        index: usize,
    ) -> Result<usize> {
        let col_idx = self
            .column_index(column_id)
            .ok_or_else(|| BoardError::InvalidTarget(format!("unknown column {}", column_id)))?;

        if self.tasks.contains_key(&task.id) {
            self.detach(&task.id);
        }

        let column = &mut self.columns[col_idx];
        let index = index.min(column.task_ids.len());
        column.task_ids.insert(index, task.id.clone());
        task.column_id = column.id.clone();
        self.tasks.insert(task.id.clone(), task);
        self.renumber_column(col_idx);
        Ok(index)
    }

    /// Removes a task from the board. Absent ids are ignored.
    pub fn remove_task(&mut self, task_id: &TaskId) -> Option<Task> {
        self.detach(task_id);
        self.tasks.remove(task_id)
    }

    /// Moves a task to `target_index` of `target_column_id` in one step.
    ///
    /// Returns `false` when the task already sits at that place, in which
    /// case the board is left untouched.
    pub fn move_task(
        &mut self,
        task_id: &TaskId,
        target_column_id: &ColumnId,
        target_index: usize,
    ) -> Result<bool> {
        let (from_col, from_idx) = self
            .locate(task_id)
            .ok_or_else(|| BoardError::InvalidTarget(format!("unknown task {}", task_id)))?;
        let to_col = self.column_index(target_column_id).ok_or_else(|| {
            BoardError::InvalidTarget(format!("unknown column {}", target_column_id))
        })?;

        if from_col == to_col {
            let last = self.columns[from_col].task_ids.len() - 1;
            let to_idx = target_index.min(last);
            if to_idx == from_idx {
                return Ok(false);
            }
            let ids = &mut self.columns[from_col].task_ids;
            let id = ids.remove(from_idx);
            ids.insert(to_idx, id);
            self.renumber_column(from_col);
            return Ok(true);
        }

        let id = self.columns[from_col].task_ids.remove(from_idx);
        let target = &mut self.columns[to_col];
        let to_idx = target_index.min(target.task_ids.len());
        target.task_ids.insert(to_idx, id);
        let target_id = target.id.clone();
        if let Some(task) = self.tasks.get_mut(task_id) {
            task.column_id = target_id;
        }
        self.renumber_column(from_col);
        self.renumber_column(to_col);
        Ok(true)
    }

    /// Replaces a task record with an authoritative copy, keeping its local
    /// placement. Returns the record it replaced.
    pub fn replace_task(&mut self, task: Task) -> Result<Task> {
        let existing = self
            .tasks
            .get_mut(&task.id)
            .ok_or_else(|| BoardError::task_not_found(&task.id))?;
        let column_id = existing.column_id.clone();
        let position = existing.position;
        let previous = std::mem::replace(existing, task);
        existing.column_id = column_id;
        existing.position = position;
        Ok(previous)
    }

    /// Applies edited attributes to a task. Returns the record before the edit.
    pub fn edit_task(&mut self, edited: &Task) -> Result<Task> {
        let existing = self
            .tasks
            .get_mut(&edited.id)
            .ok_or_else(|| BoardError::task_not_found(&edited.id))?;
        let previous = existing.clone();
        existing.apply_edits(edited);
        Ok(previous)
    }

    /// Inserts an empty column at `index`, clamped to the column count
    pub fn insert_column(&mut self, column: Column, index: usize) -> Result<usize> {
        if self.column_index(&column.id).is_some() {
            return Err(BoardError::InvalidTarget(format!(
                "column {} already exists",
                column.id
            )));
        }
        if !column.is_empty() {
            return Err(BoardError::InvalidTarget(format!(
                "column {} must be inserted empty",
                column.id
            )));
        }
        let index = index.min(self.columns.len());
        self.columns.insert(index, column);
        self.renumber_columns();
        Ok(index)
    }

    /// Appends an empty column
    pub fn push_column(&mut self, column: Column) -> usize {
        let index = self.columns.len();
        let mut column = column;
        column.task_ids.clear();
        self.columns.push(column);
        self.renumber_columns();
        index
    }

    /// Removes a column together with all of its tasks.
    ///
    /// The returned column still lists its task ids and carries its former
    /// position; the tasks come back in display order.
    pub fn remove_column(&mut self, column_id: &ColumnId) -> Option<(Column, Vec<Task>)> {
        let col_idx = self.column_index(column_id)?;
        let column = self.columns.remove(col_idx);
        let tasks = column
            .task_ids
            .iter()
            .filter_map(|id| self.tasks.remove(id))
            .collect();
        self.renumber_columns();
        Some((column, tasks))
    }

    /// Moves a column to `index`. Returns `false` if it is already there.
    pub fn reorder_column(&mut self, column_id: &ColumnId, index: usize) -> Result<bool> {
        let from = self
            .column_index(column_id)
            .ok_or_else(|| BoardError::InvalidTarget(format!("unknown column {}", column_id)))?;
        let to = index.min(self.columns.len() - 1);
        if from == to {
            return Ok(false);
        }
        let column = self.columns.remove(from);
        self.columns.insert(to, column);
        self.renumber_columns();
        Ok(true)
    }

    /// Renames a column. Returns the previous title.
    pub fn rename_column(
        &mut self,
        column_id: &ColumnId,
        title: impl Into<String>,
    ) -> Result<String> {
        let column = self
            .columns
            .iter_mut()
            .find(|c| &c.id == column_id)
            .ok_or_else(|| BoardError::column_not_found(column_id))?;
        Ok(std::mem::replace(&mut column.title, title.into()))
    }

    pub fn set_title(&mut self, title: impl Into<String>) -> String {
        std::mem::replace(&mut self.title, title.into())
    }

    pub fn set_color(&mut self, color: impl Into<String>) -> String {
        std::mem::replace(&mut self.color, color.into())
    }

    /// Verifies the structural invariants of the board
    pub fn check_invariants(&self) -> Result<()> {
        let mut seen: HashMap<&TaskId, &ColumnId> = HashMap::new();

        for (col_idx, column) in self.columns.iter().enumerate() {
            if column.position != col_idx {
                return Err(BoardError::InvariantViolation(format!(
                    "column {} has position {} at index {}",
                    column.id, column.position, col_idx
                )));
            }
            for (idx, id) in column.task_ids.iter().enumerate() {
                if let Some(other) = seen.insert(id, &column.id) {
                    return Err(BoardError::InvariantViolation(format!(
                        "task {} appears in columns {} and {}",
                        id, other, column.id
                    )));
                }
                let task = self.tasks.get(id).ok_or_else(|| {
                    BoardError::InvariantViolation(format!(
                        "column {} lists unknown task {}",
                        column.id, id
                    ))
                })?;
                if task.column_id != column.id || task.position != idx {
                    return Err(BoardError::InvariantViolation(format!(
                        "task {} records {}#{} but sits at {}#{}",
                        id, task.column_id, task.position, column.id, idx
                    )));
                }
            }
        }

        if seen.len() != self.tasks.len() {
            return Err(BoardError::InvariantViolation(format!(
                "{} tasks registered but {} placed",
                self.tasks.len(),
                seen.len()
            )));
        }
        Ok(())
    }

    fn locate(&self, task_id: &TaskId) -> Option<(usize, usize)> {
        self.columns
            .iter()
            .enumerate()
            .find_map(|(col_idx, column)| column.index_of(task_id).map(|idx| (col_idx, idx)))
    }

    /// Takes a task id out of its column without dropping the record
    fn detach(&mut self, task_id: &TaskId) {
        if let Some((col_idx, idx)) = self.locate(task_id) {
            self.columns[col_idx].task_ids.remove(idx);
            self.renumber_column(col_idx);
        }
    }

    fn renumber_column(&mut self, col_idx: usize) {
        let column = &self.columns[col_idx];
        for (position, id) in column.task_ids.iter().enumerate() {
            if let Some(task) = self.tasks.get_mut(id) {
                task.position = position;
            }
        }
    }

    fn renumber_columns(&mut self) {
        for (position, column) in self.columns.iter_mut().enumerate() {
            column.position = position;
        }
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::from_config(&BoardConfig::default())
    }
}
