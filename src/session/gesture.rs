//! Drag gesture state machine.
//!
//! A gesture moves `Idle -> Dragging -> Resolving -> Idle`. Only the end of a
//! gesture produces a [`MoveIntent`]; hover updates are answered with a
//! [`DropHint`] through `&self` and cannot touch the board.

use crate::domain::{Board, ColumnId, Task, TaskId};
use tracing::debug;

/// What is being dragged
#[derive(Debug, Clone, PartialEq)]
pub enum DragSubject {
    /// Snapshot of the task taken when the drag started, for the drag overlay
    Task(Task),
    Column(ColumnId),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum DragState {
    #[default]
    Idle,
    Dragging(DragSubject),
    Resolving(DragSubject),
}

/// Classified result of a finished drag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveIntent {
    ReorderWithinColumn {
        task_id: TaskId,
        column_id: ColumnId,
        from: usize,
        to: usize,
    },
    MoveAcrossColumn {
        task_id: TaskId,
        from_column: ColumnId,
        to_column: ColumnId,
        index: usize,
    },
    ReorderColumn {
        column_id: ColumnId,
        from: usize,
        to: usize,
    },
    NoOp,
}

/// Where a drop would land, for highlighting while hovering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropHint {
    pub column_id: ColumnId,
    pub over_task: Option<TaskId>,
}

/// A drop target resolved against the board
enum Target {
    Task {
        column: usize,
        index: usize,
        column_id: ColumnId,
    },
    Column {
        column: usize,
        column_id: ColumnId,
        len: usize,
    },
}

impl Target {
    /// Task ids win over column ids; a column is only the target when no
    /// task is under the pointer.
    fn resolve(board: &Board, over_id: &str) -> Option<Self> {
        let task_id = TaskId::from(over_id);
        if let Some((column_id, index)) = board.locate_task(&task_id) {
            let column = board.column_index(&column_id)?;
            return Some(Target::Task {
                column,
                index,
                column_id,
            });
        }

        let column_id = ColumnId::from(over_id);
        let column = board.column_index(&column_id)?;
        let len = board.columns()[column].len();
        Some(Target::Column {
            column,
            column_id,
            len,
        })
    }

    fn column(&self) -> usize {
        match self {
            Target::Task { column, .. } | Target::Column { column, .. } => *column,
        }
    }
}

#[derive(Debug, Default)]
pub struct GestureInterpreter {
    state: DragState,
}

impl GestureInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    /// The item under the pointer while a drag is active
    pub fn drag_context(&self) -> Option<&DragSubject> {
        match &self.state {
            DragState::Dragging(subject) => Some(subject),
            _ => None,
        }
    }

    /// Starts a drag of the task or column named `active_id`.
    ///
    /// Unknown ids are ignored. Returns whether a drag is now active.
    pub fn start(&mut self, board: &Board, active_id: &str) -> bool {
        let subject = if let Some(task) = board.task(&TaskId::from(active_id)) {
            DragSubject::Task(task.clone())
        } else if board.column(&ColumnId::from(active_id)).is_some() {
            DragSubject::Column(ColumnId::from(active_id))
        } else {
            debug!("Ignoring drag of unknown item {}", active_id);
            return false;
        };

        if !matches!(self.state, DragState::Idle) {
            debug!("Drag of {} replaces an unfinished gesture", active_id);
        }
        self.state = DragState::Dragging(subject);
        true
    }

    /// Reports where the current drag would land. Never changes any state.
    pub fn over(&self, board: &Board, over_id: Option<&str>) -> Option<DropHint> {
        self.drag_context()?;
        match Target::resolve(board, over_id?)? {
            Target::Task { column_id, .. } => Some(DropHint {
                column_id,
                over_task: over_id.map(TaskId::from),
            }),
            Target::Column { column_id, .. } => Some(DropHint {
                column_id,
                over_task: None,
            }),
        }
    }

    /// Abandons the current drag without an intent
    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }

    /// Finishes the drag and classifies the drop. Always returns to `Idle`.
    pub fn end(&mut self, board: &Board, over_id: Option<&str>) -> MoveIntent {
        let subject = match std::mem::take(&mut self.state) {
            DragState::Dragging(subject) => subject,
            _ => return MoveIntent::NoOp,
        };

        self.state = DragState::Resolving(subject.clone());
        let intent = match (&subject, over_id) {
            (_, None) => MoveIntent::NoOp,
            (DragSubject::Task(task), Some(over)) => classify_task(board, &task.id, over),
            (DragSubject::Column(column_id), Some(over)) => classify_column(board, column_id, over),
        };
        self.state = DragState::Idle;

        debug!("Drop over {:?} classified as {:?}", over_id, intent);
        intent
    }
}

fn classify_task(board: &Board, task_id: &TaskId, over_id: &str) -> MoveIntent {
    let Some((source_id, from)) = board.locate_task(task_id) else {
        return MoveIntent::NoOp;
    };
    let Some(source) = board.column_index(&source_id) else {
        return MoveIntent::NoOp;
    };

    match Target::resolve(board, over_id) {
        Some(Target::Task {
            column,
            index,
            column_id,
        }) => {
            if column != source {
                MoveIntent::MoveAcrossColumn {
                    task_id: task_id.clone(),
                    from_column: source_id,
                    to_column: column_id,
                    index,
                }
            } else if index != from {
                MoveIntent::ReorderWithinColumn {
                    task_id: task_id.clone(),
                    column_id: source_id,
                    from,
                    to: index,
                }
            } else {
                MoveIntent::NoOp
            }
        }
        Some(Target::Column {
            column,
            column_id,
            len,
        }) if column != source => MoveIntent::MoveAcrossColumn {
            task_id: task_id.clone(),
            from_column: source_id,
            to_column: column_id,
            index: len,
        },
        _ => MoveIntent::NoOp,
    }
}

fn classify_column(board: &Board, column_id: &ColumnId, over_id: &str) -> MoveIntent {
    let Some(from) = board.column_index(column_id) else {
        return MoveIntent::NoOp;
    };
    match Target::resolve(board, over_id) {
        Some(target) if target.column() != from => MoveIntent::ReorderColumn {
            column_id: column_id.clone(),
            from,
            to: target.column(),
        },
        _ => MoveIntent::NoOp,
    }
}
