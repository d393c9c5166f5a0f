//! The interactive surface of a board: what a renderer reads and the
//! handlers it calls for pointer gestures and form submissions.
//!
//! Handlers take `&mut self` and run one at a time. Every mutation is applied
//! to the local board before its backend call is issued, and a failed call is
//! reconciled before the handler returns. Callers that need to keep handling
//! events while a call is in flight can use [`BoardSession::begin_drop`],
//! [`PendingMutation::persist`] and [`BoardSession::settle`] separately.

pub mod dialog;
pub mod gesture;
pub mod mutator;

use crate::{
    config::SessionConfig,
    domain::{project, Board, FilterState, FilteredView},
    error::{BoardError, Result},
    storage::BoardStore,
};
use dialog::UiState;
use gesture::{DragState, DragSubject, DropHint, GestureInterpreter};
use mutator::{Mutation, Notice, OptimisticMutator, PendingMutation, Persisted, Settlement};
use std::sync::Arc;
use tracing::{debug, info};

pub struct BoardSession {
    board: Board,
    store: Arc<dyn BoardStore>,
    config: SessionConfig,
    gestures: GestureInterpreter,
    mutator: OptimisticMutator,
    ui: UiState,
    filter: FilterState,
    notices: Vec<Notice>,
}

impl BoardSession {
    /// Loads the board from `store`, initializing the store first if needed
    pub async fn open(store: Arc<dyn BoardStore>, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        if !store.is_initialized().await {
            store.initialize(&config.board).await?;
        }
        let board = store.load_board().await?;
        info!(
            "Opened board '{}' with {} columns and {} tasks",
            board.title,
            board.columns().len(),
            board.total_tasks()
        );
        Ok(Self::new(board, store, config))
    }

    pub fn new(board: Board, store: Arc<dyn BoardStore>, config: SessionConfig) -> Self {
        let mutator = OptimisticMutator::new(config.persist_attempts, config.reconcile);
        Self {
            board,
            store,
            config,
            gestures: GestureInterpreter::new(),
            mutator,
            ui: UiState::Idle,
            filter: FilterState::default(),
            notices: Vec::new(),
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// The board as it should be rendered under the current filter
    pub fn view(&self) -> FilteredView<'_> {
        project(&self.board, &self.filter)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn BoardStore> {
        Arc::clone(&self.store)
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut FilterState {
        &mut self.filter
    }

    pub fn ui_state(&self) -> &UiState {
        &self.ui
    }

    pub fn drag_state(&self) -> &DragState {
        self.gestures.state()
    }

    pub fn drag_context(&self) -> Option<&DragSubject> {
        self.gestures.drag_context()
    }

    /// Failures waiting to be shown to the user
    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Whether a backend call for the task or column `id` is still running
    pub fn is_pending(&self, id: &str) -> bool {
        self.mutator.is_pending_id(id)
    }

    /// Starts dragging a task or column. Items that are still being saved
    /// cannot be picked up.
    pub fn drag_start(&mut self, active_id: &str) -> bool {
        if self.mutator.is_pending_id(active_id) {
            debug!("Ignoring drag of {} while it is being saved", active_id);
            return false;
        }
        self.gestures.start(&self.board, active_id)
    }

    pub fn drag_over(&self, over_id: Option<&str>) -> Option<DropHint> {
        self.gestures.over(&self.board, over_id)
    }

    pub fn drag_cancel(&mut self) {
        self.gestures.cancel();
    }

    /// Finishes a drag: applies the drop locally, persists it and reconciles
    pub async fn drag_end(&mut self, over_id: Option<&str>) -> Settlement {
        match self.begin_drop(over_id) {
            Some(pending) => self.run(pending).await,
            None => Settlement::Unchanged,
        }
    }

    /// Applies a drop locally and hands back the call still to be persisted.
    ///
    /// Drops that change nothing, point at unknown items or collide with a
    /// save in flight yield `None` and leave the board alone.
    pub fn begin_drop(&mut self, over_id: Option<&str>) -> Option<PendingMutation> {
        let mutation = self.gestures.end(&self.board, over_id).into_mutation()?;
        match self.mutator.begin(&mut self.board, mutation) {
            Ok(pending) => pending,
            Err(e) => {
                debug!("Drop ignored: {}", e);
                None
            }
        }
    }

    /// Applies any mutation locally without persisting it yet
    pub fn begin(&mut self, mutation: Mutation) -> Result<Option<PendingMutation>> {
        self.mutator.begin(&mut self.board, mutation)
    }

    /// Folds the outcome of [`PendingMutation::persist`] into the board
    pub async fn settle(
        &mut self,
        pending: PendingMutation,
        result: Result<Persisted>,
    ) -> Settlement {
        let store = Arc::clone(&self.store);
        let (settlement, notice) = self
            .mutator
            .settle(&mut self.board, store.as_ref(), pending, result)
            .await;
        if let Some(notice) = notice {
            self.notices.push(notice);
        }
        settlement
    }

    /// Applies, persists and reconciles a mutation in one go
    pub async fn execute(&mut self, mutation: Mutation) -> Result<Settlement> {
        match self.begin(mutation)? {
            Some(pending) => Ok(self.run(pending).await),
            None => Ok(Settlement::Unchanged),
        }
    }

    /// Replaces the local board with the stored one
    pub async fn reload(&mut self) -> Result<()> {
        if self.mutator.in_flight_count() > 0 {
            return Err(BoardError::Busy("board".to_string()));
        }
        self.board = self.store.load_board().await?;
        Ok(())
    }

    async fn run(&mut self, pending: PendingMutation) -> Settlement {
        let store = Arc::clone(&self.store);
        let result = pending.persist(store.as_ref()).await;
        self.settle(pending, result).await
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::{
        config::SessionConfig,
        domain::{Board, Column, ColumnId, Priority, Task, TaskId},
        session::BoardSession,
        storage::MemoryStorage,
    };
    use std::sync::Arc;

    /// `todo: [a, b, c]`, `doing: [d]`, `done: []`
    pub(crate) fn sample_board() -> Board {
        let mut board = Board::new("Sample", "bg-blue-500");
        let layout = [
            ("todo", vec![("a", Priority::Low), ("b", Priority::High), ("c", Priority::High)]),
            ("doing", vec![("d", Priority::Medium)]),
            ("done", vec![]),
        ];
        for (column, tasks) in layout {
            let column_id = ColumnId::from(column);
            board.push_column(Column::with_id(column_id.clone(), column));
            for (id, priority) in tasks {
                let task = Task::with_id(TaskId::from(id), id, column_id.clone())
                    .with_priority(priority);
                board.insert_task(task, &column_id, usize::MAX).unwrap();
            }
        }
        board
    }

    pub(crate) fn session_with(config: SessionConfig) -> (BoardSession, Arc<MemoryStorage>) {
        let board = sample_board();
        let store = Arc::new(MemoryStorage::with_board(board.clone()));
        let session = BoardSession::new(board, store.clone(), config);
        (session, store)
    }

    pub(crate) fn session() -> (BoardSession, Arc<MemoryStorage>) {
        session_with(SessionConfig::default())
    }

    pub(crate) fn ids(board: &Board, column: &str) -> Vec<String> {
        board
            .column(&ColumnId::from(column))
            .map(|c| c.task_ids.iter().map(|id| id.to_string()).collect())
            .unwrap_or_default()
    }
}
