//! Optimistic application of board mutations.
//!
//! A mutation is applied to the local board first and remembered together
//! with the record needed to undo it. The backend call happens afterwards;
//! when it fails the mutation is reconciled by undoing it or by reloading the
//! board from the store.

use crate::{
    config::ReconcileStrategy,
    domain::{Board, Column, ColumnId, Task, TaskId},
    error::{BoardError, Result},
    session::gesture::MoveIntent,
    storage::{require_palette_color, require_title, BoardStore, BoardUpdate},
};
use std::{collections::HashSet, fmt};
use tracing::{debug, info, warn};

/// A change to the board that is mirrored to the store
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    MoveTask {
        task_id: TaskId,
        column_id: ColumnId,
        index: usize,
    },
    MoveColumn {
        column_id: ColumnId,
        index: usize,
    },
    CreateTask(Task),
    UpdateTask(Task),
    DeleteTask(TaskId),
    CreateColumn(Column),
    RenameColumn {
        column_id: ColumnId,
        title: String,
    },
    DeleteColumn(ColumnId),
    UpdateBoard(BoardUpdate),
}

impl Mutation {
    /// The entity whose persistence this mutation serializes on
    pub fn key(&self) -> EntityKey {
        match self {
            Mutation::MoveTask { task_id, .. } | Mutation::DeleteTask(task_id) => {
                EntityKey::Task(task_id.clone())
            }
            Mutation::CreateTask(task) | Mutation::UpdateTask(task) => {
                EntityKey::Task(task.id.clone())
            }
            Mutation::MoveColumn { column_id, .. }
            | Mutation::RenameColumn { column_id, .. }
            | Mutation::DeleteColumn(column_id) => EntityKey::Column(column_id.clone()),
            Mutation::CreateColumn(column) => EntityKey::Column(column.id.clone()),
            Mutation::UpdateBoard(_) => EntityKey::Board,
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::MoveTask { task_id, .. } => write!(f, "move task {}", task_id),
            Mutation::MoveColumn { column_id, .. } => write!(f, "move column {}", column_id),
            Mutation::CreateTask(task) => write!(f, "create task '{}'", task.title),
            Mutation::UpdateTask(task) => write!(f, "update task '{}'", task.title),
            Mutation::DeleteTask(task_id) => write!(f, "delete task {}", task_id),
            Mutation::CreateColumn(column) => write!(f, "create column '{}'", column.title),
            Mutation::RenameColumn { title, .. } => write!(f, "rename column to '{}'", title),
            Mutation::DeleteColumn(column_id) => write!(f, "delete column {}", column_id),
            Mutation::UpdateBoard(_) => write!(f, "update board"),
        }
    }
}

impl MoveIntent {
    /// The mutation a drop asks for, if any
    pub fn into_mutation(self) -> Option<Mutation> {
        match self {
            MoveIntent::ReorderWithinColumn {
                task_id,
                column_id,
                to,
                ..
            } => Some(Mutation::MoveTask {
                task_id,
                column_id,
                index: to,
            }),
            MoveIntent::MoveAcrossColumn {
                task_id,
                to_column,
                index,
                ..
            } => Some(Mutation::MoveTask {
                task_id,
                column_id: to_column,
                index,
            }),
            MoveIntent::ReorderColumn { column_id, to, .. } => Some(Mutation::MoveColumn {
                column_id,
                index: to,
            }),
            MoveIntent::NoOp => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKey {
    /// Board title and color
    Board,
    /// Order of the columns on the board
    ColumnList,
    Column(ColumnId),
    Task(TaskId),
}

impl EntityKey {
    fn id(&self) -> Option<&str> {
        match self {
            EntityKey::Board | EntityKey::ColumnList => None,
            EntityKey::Column(id) => Some(id.as_str()),
            EntityKey::Task(id) => Some(id.as_str()),
        }
    }
}

/// Every entity whose state or ordering `mutation` depends on, its own key first.
///
/// A task move reserves both columns because its index and its undo record are
/// only meaningful while no other change reorders them.
fn footprint(board: &Board, mutation: &Mutation) -> Vec<EntityKey> {
    let mut keys = vec![mutation.key()];
    match mutation {
        Mutation::MoveTask {
            task_id, column_id, ..
        } => {
            if let Some(source) = board.column_of(task_id) {
                keys.push(EntityKey::Column(source.id.clone()));
            }
            keys.push(EntityKey::Column(column_id.clone()));
        }
        Mutation::CreateTask(task) => keys.push(EntityKey::Column(task.column_id.clone())),
        Mutation::DeleteTask(task_id) => {
            if let Some(column) = board.column_of(task_id) {
                keys.push(EntityKey::Column(column.id.clone()));
            }
        }
        Mutation::MoveColumn { .. } | Mutation::CreateColumn(_) => keys.push(EntityKey::ColumnList),
        Mutation::DeleteColumn(column_id) => {
            keys.push(EntityKey::ColumnList);
            if let Some(column) = board.column(column_id) {
                keys.extend(column.task_ids.iter().cloned().map(EntityKey::Task));
            }
        }
        Mutation::UpdateTask(_) | Mutation::RenameColumn { .. } | Mutation::UpdateBoard(_) => {}
    }

    let mut unique = Vec::with_capacity(keys.len());
    for key in keys {
        if !unique.contains(&key) {
            unique.push(key);
        }
    }
    unique
}

/// Record that reverses a locally applied mutation
#[derive(Debug, Clone)]
enum Undo {
    MoveTask {
        task_id: TaskId,
        column_id: ColumnId,
        index: usize,
    },
    MoveColumn {
        column_id: ColumnId,
        index: usize,
    },
    RemoveTask(TaskId),
    RestoreTask {
        task: Task,
        column_id: ColumnId,
        index: usize,
    },
    ReplaceTask(Task),
    RemoveColumn(ColumnId),
    RestoreColumn {
        column: Column,
        tasks: Vec<Task>,
    },
    RenameColumn {
        column_id: ColumnId,
        title: String,
    },
    RestoreBoard {
        title: String,
        color: String,
    },
}

impl Undo {
    fn apply(self, board: &mut Board) -> Result<()> {
        match self {
            Undo::MoveTask {
                task_id,
                column_id,
                index,
            } => {
                board.move_task(&task_id, &column_id, index)?;
            }
            Undo::MoveColumn { column_id, index } => {
                board.reorder_column(&column_id, index)?;
            }
            Undo::RemoveTask(task_id) => {
                board.remove_task(&task_id);
            }
            Undo::RestoreTask {
                task,
                column_id,
                index,
            } => {
                board.insert_task(task, &column_id, index)?;
            }
            Undo::ReplaceTask(task) => {
                board.replace_task(task)?;
            }
            Undo::RemoveColumn(column_id) => {
                board.remove_column(&column_id);
            }
            Undo::RestoreColumn { column, tasks } => {
                let mut empty = column.clone();
                empty.task_ids.clear();
                board.insert_column(empty, column.position)?;
                for (index, task) in tasks.into_iter().enumerate() {
                    board.insert_task(task, &column.id, index)?;
                }
            }
            Undo::RenameColumn { column_id, title } => {
                board.rename_column(&column_id, title)?;
            }
            Undo::RestoreBoard { title, color } => {
                board.set_title(title);
                board.set_color(color);
            }
        }
        Ok(())
    }
}

/// What the store handed back for a persisted mutation
#[derive(Debug, Clone, PartialEq)]
pub enum Persisted {
    Done,
    Task(Task),
    Column(Column),
}

/// Final outcome of a mutation once the backend has answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Nothing needed to change
    Unchanged,
    /// The backend accepted the change
    Confirmed,
    /// The backend refused; the local change was undone
    Reverted,
    /// The backend refused; the board was reloaded from the store
    Refetched,
    /// The backend refused and the local board could not be brought back in
    /// line with it
    Unreconciled,
}

/// A failure the user should be told about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub cause: String,
}

/// A mutation applied locally and awaiting its backend call
#[derive(Debug)]
pub struct PendingMutation {
    mutation: Mutation,
    undo: Undo,
    key: EntityKey,
    reserved: Vec<EntityKey>,
    attempts: u32,
}

impl PendingMutation {
    pub fn mutation(&self) -> &Mutation {
        &self.mutation
    }

    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    /// Sends the mutation to the store, repeating transient failures
    pub async fn persist(&self, store: &dyn BoardStore) -> Result<Persisted> {
        let mut attempt = 1;
        loop {
            match self.send(store).await {
                Err(e) if e.is_transient() && attempt < self.attempts => {
                    warn!("Attempt {} to {} failed: {}", attempt, self.mutation, e);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn send(&self, store: &dyn BoardStore) -> Result<Persisted> {
        match &self.mutation {
            Mutation::MoveTask {
                task_id,
                column_id,
                index,
            } => store.move_task(task_id, column_id, *index).await.map(|_| Persisted::Done),
            Mutation::MoveColumn { column_id, index } => store
                .move_column(column_id, *index)
                .await
                .map(|_| Persisted::Done),
            Mutation::CreateTask(task) => store.create_task(task).await.map(Persisted::Task),
            Mutation::UpdateTask(task) => store.update_task(task).await.map(Persisted::Task),
            Mutation::DeleteTask(task_id) => match store.delete_task(task_id).await {
                // Already gone on the backend, which is where we wanted to end up
                Err(BoardError::NotFound { .. }) => Ok(Persisted::Done),
                result => result.map(|_| Persisted::Done),
            },
            Mutation::CreateColumn(column) => {
                store.create_column(column).await.map(Persisted::Column)
            }
            Mutation::RenameColumn { column_id, title } => store
                .update_column(column_id, title)
                .await
                .map(|_| Persisted::Done),
            Mutation::DeleteColumn(column_id) => match store.delete_column(column_id).await {
                Err(BoardError::NotFound { .. }) => Ok(Persisted::Done),
                result => result.map(|_| Persisted::Done),
            },
            Mutation::UpdateBoard(update) => {
                store.update_board(update).await.map(|_| Persisted::Done)
            }
        }
    }
}

/// Applies mutations locally and reconciles them with backend outcomes.
///
/// Tracks which entities have a backend call in flight and refuses to start
/// a second mutation on any of them until the first has settled.
#[derive(Debug)]
pub struct OptimisticMutator {
    in_flight: HashSet<EntityKey>,
    pending: usize,
    attempts: u32,
    strategy: ReconcileStrategy,
}

impl OptimisticMutator {
    pub fn new(attempts: u32, strategy: ReconcileStrategy) -> Self {
        Self {
            in_flight: HashSet::new(),
            pending: 0,
            attempts: attempts.max(1),
            strategy,
        }
    }

    pub fn is_in_flight(&self, key: &EntityKey) -> bool {
        self.in_flight.contains(key)
    }

    /// Whether the task or column with this id has a backend call in flight
    pub fn is_pending_id(&self, id: &str) -> bool {
        self.in_flight.iter().any(|key| key.id() == Some(id))
    }

    /// Number of mutations awaiting settlement
    pub fn in_flight_count(&self) -> usize {
        self.pending
    }

    /// Applies `mutation` to the board.
    ///
    /// Returns `None` when the mutation leaves the board as it is; nothing
    /// needs persisting then. Validation and target errors are returned
    /// before the board is touched.
    pub fn begin(
        &mut self,
        board: &mut Board,
        mutation: Mutation,
    ) -> Result<Option<PendingMutation>> {
        let reserved = footprint(board, &mutation);
        if let Some(key) = reserved.iter().find(|key| self.in_flight.contains(key)) {
            debug!("Refusing to {} while {:?} is being saved", mutation, key);
            return Err(BoardError::Busy(format!("{:?}", key)));
        }

        let applied = apply(board, mutation)?;
        let Some((mutation, undo)) = applied else {
            return Ok(None);
        };

        self.in_flight.extend(reserved.iter().cloned());
        self.pending += 1;
        debug!("Applied {} locally", mutation);
        Ok(Some(PendingMutation {
            key: mutation.key(),
            mutation,
            undo,
            reserved,
            attempts: self.attempts,
        }))
    }

    /// Folds the backend outcome of a pending mutation into the board
    pub async fn settle(
        &mut self,
        board: &mut Board,
        store: &dyn BoardStore,
        pending: PendingMutation,
        result: Result<Persisted>,
    ) -> (Settlement, Option<Notice>) {
        for key in &pending.reserved {
            self.in_flight.remove(key);
        }
        self.pending = self.pending.saturating_sub(1);

        let error = match result {
            Ok(persisted) => {
                merge(board, persisted);
                return (Settlement::Confirmed, None);
            }
            Err(e) => e,
        };

        warn!("Could not {}: {}", pending.mutation, error);
        let notice = |message: String| Notice {
            message,
            cause: error.to_string(),
        };

        // A reload would discard changes that are still being saved
        let can_refetch = self.pending == 0;
        if self.strategy == ReconcileStrategy::Refetch {
            if !can_refetch {
                debug!("Not reloading while {} other changes are being saved", self.pending);
            } else if let Some(settlement) = refetch(board, store).await {
                let message = format!("Could not {}; the board was reloaded", pending.mutation);
                return (settlement, Some(notice(message)));
            }
        }

        let description = pending.mutation.to_string();
        match pending.undo.apply(board) {
            Ok(()) => {
                info!("Reverted {}", description);
                let message = format!("Could not {}; the change was undone", description);
                (Settlement::Reverted, Some(notice(message)))
            }
            Err(undo_error) => {
                warn!("Undoing {} failed: {}", description, undo_error);
                if self.strategy != ReconcileStrategy::Refetch && can_refetch {
                    if let Some(settlement) = refetch(board, store).await {
                        let message = format!("Could not {}; the board was reloaded", description);
                        return (settlement, Some(notice(message)));
                    }
                }
                let message = format!(
                    "Could not {}; the board may be out of date, reload to retry",
                    description
                );
                (Settlement::Unreconciled, Some(notice(message)))
            }
        }
    }
}

/// Applies a mutation locally, returning the mutation as it should be
/// persisted together with its undo record
fn apply(board: &mut Board, mutation: Mutation) -> Result<Option<(Mutation, Undo)>> {
    let applied = match mutation {
        Mutation::MoveTask {
            task_id,
            column_id,
            index,
        } => {
            let (from_column, from_index) = board
                .locate_task(&task_id)
                .ok_or_else(|| BoardError::InvalidTarget(format!("unknown task {}", task_id)))?;
            if !board.move_task(&task_id, &column_id, index)? {
                return Ok(None);
            }
            // Persist where the task actually landed after clamping
            let landed = board.locate_task(&task_id).map(|(_, i)| i).unwrap_or(index);
            (
                Mutation::MoveTask {
                    task_id: task_id.clone(),
                    column_id,
                    index: landed,
                },
                Undo::MoveTask {
                    task_id,
                    column_id: from_column,
                    index: from_index,
                },
            )
        }
        Mutation::MoveColumn { column_id, index } => {
            let from = board
                .column_index(&column_id)
                .ok_or_else(|| BoardError::InvalidTarget(format!("unknown column {}", column_id)))?;
            if !board.reorder_column(&column_id, index)? {
                return Ok(None);
            }
            let landed = board.column_index(&column_id).unwrap_or(index);
            (
                Mutation::MoveColumn {
                    column_id: column_id.clone(),
                    index: landed,
                },
                Undo::MoveColumn {
                    column_id,
                    index: from,
                },
            )
        }
        Mutation::CreateTask(task) => {
            require_title("title", &task.title)?;
            if board.task(&task.id).is_some() {
                return Err(BoardError::validation(
                    "id",
                    format!("task {} already exists", task.id),
                ));
            }
            let id = task.id.clone();
            let column_id = task.column_id.clone();
            let position = task.position;
            board.insert_task(task, &column_id, position)?;
            let record = stored(board, &id)?;
            (Mutation::CreateTask(record), Undo::RemoveTask(id))
        }
        Mutation::UpdateTask(task) => {
            require_title("title", &task.title)?;
            let previous = board.edit_task(&task)?;
            let record = stored(board, &task.id)?;
            (Mutation::UpdateTask(record), Undo::ReplaceTask(previous))
        }
        Mutation::DeleteTask(task_id) => {
            let (column_id, index) = board
                .locate_task(&task_id)
                .ok_or_else(|| BoardError::InvalidTarget(format!("unknown task {}", task_id)))?;
            let task = board
                .remove_task(&task_id)
                .ok_or_else(|| BoardError::task_not_found(&task_id))?;
            (
                Mutation::DeleteTask(task_id),
                Undo::RestoreTask {
                    task,
                    column_id,
                    index,
                },
            )
        }
        Mutation::CreateColumn(column) => {
            require_title("title", &column.title)?;
            let id = column.id.clone();
            let position = column.position;
            board.insert_column(column, position)?;
            let record = board
                .column(&id)
                .cloned()
                .ok_or_else(|| BoardError::column_not_found(&id))?;
            (Mutation::CreateColumn(record), Undo::RemoveColumn(id))
        }
        Mutation::RenameColumn { column_id, title } => {
            require_title("title", &title)?;
            let previous = board.rename_column(&column_id, title.clone())?;
            if previous == title {
                return Ok(None);
            }
            (
                Mutation::RenameColumn {
                    column_id: column_id.clone(),
                    title,
                },
                Undo::RenameColumn {
                    column_id,
                    title: previous,
                },
            )
        }
        Mutation::DeleteColumn(column_id) => {
            let (column, tasks) = board
                .remove_column(&column_id)
                .ok_or_else(|| BoardError::InvalidTarget(format!("unknown column {}", column_id)))?;
            (
                Mutation::DeleteColumn(column_id),
                Undo::RestoreColumn { column, tasks },
            )
        }
        Mutation::UpdateBoard(update) => {
            if let Some(title) = &update.title {
                require_title("title", title)?;
            }
            if let Some(color) = &update.color {
                require_palette_color(color)?;
            }
            let undo = Undo::RestoreBoard {
                title: board.title.clone(),
                color: board.color.clone(),
            };
            if let Some(title) = &update.title {
                board.set_title(title.clone());
            }
            if let Some(color) = &update.color {
                board.set_color(color.clone());
            }
            (Mutation::UpdateBoard(update), undo)
        }
    };
    Ok(Some(applied))
}

fn stored(board: &Board, task_id: &TaskId) -> Result<Task> {
    board
        .task(task_id)
        .cloned()
        .ok_or_else(|| BoardError::task_not_found(task_id))
}

/// Adopts the authoritative record returned by the store
fn merge(board: &mut Board, persisted: Persisted) {
    match persisted {
        Persisted::Done => {}
        Persisted::Task(task) => {
            let id = task.id.clone();
            if let Err(e) = board.replace_task(task) {
                debug!("Skipping merge of task {}: {}", id, e);
            }
        }
        Persisted::Column(column) => {
            let differs = board
                .column(&column.id)
                .map(|local| local.title != column.title)
                .unwrap_or(false);
            if differs {
                if let Err(e) = board.rename_column(&column.id, column.title.clone()) {
                    debug!("Skipping merge of column {}: {}", column.id, e);
                }
            }
        }
    }
}

/// Replaces the board with the stored one. `None` if the store is unreachable.
async fn refetch(board: &mut Board, store: &dyn BoardStore) -> Option<Settlement> {
    match store.load_board().await {
        Ok(fresh) => {
            info!("Reloaded board {} from the store", fresh.id);
            *board = fresh;
            Some(Settlement::Refetched)
        }
        Err(e) => {
            warn!("Reloading the board failed: {}", e);
            None
        }
    }
}
