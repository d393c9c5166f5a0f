//! # Kanban Core
//!
//! Board state and drag-reorder reconciliation for kanban boards.
//!
//! The crate keeps an ordered, in-memory model of a board's columns and
//! tasks, turns pointer drag gestures into move intents, applies every change
//! optimistically and reconciles it with an authoritative [`BoardStore`]
//! once the backend answers. Rendering, dialogs and transport are left to
//! the caller.

pub mod config;
pub mod domain;
pub mod error;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use config::{BoardConfig, ReconcileStrategy, SessionConfig};
pub use domain::{
    board::{Board, BOARD_COLORS},
    column::{Column, ColumnId},
    filter::{project, FilterState, FilteredColumn, FilteredView},
    task::{Priority, Task, TaskId},
};
pub use error::{BoardError, Result};
pub use session::{
    dialog::{TaskForm, UiState},
    gesture::{DragState, DragSubject, DropHint, MoveIntent},
    mutator::{Mutation, Notice, PendingMutation, Persisted, Settlement},
    BoardSession,
};
pub use storage::{BoardStore, BoardUpdate, MemoryStorage};

#[cfg(feature = "file-storage")]
pub use storage::FileStorage;
