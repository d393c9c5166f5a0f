use crate::{
    config::BoardConfig,
    domain::{Board, Column, ColumnId, Task, TaskId},
    error::{BoardError, Result},
    storage::{self, BoardStore, BoardUpdate},
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

/// In-process board store.
///
/// Calls can be made to fail on demand, which lets callers exercise the
/// reconciliation paths without a real backend.
pub struct MemoryStorage {
    board: Mutex<Option<Board>>,
    failures: AtomicUsize,
    calls: AtomicUsize,
}

impl MemoryStorage {
    /// Creates an empty, uninitialized store
    pub fn new() -> Self {
        Self {
            board: Mutex::new(None),
            failures: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Creates a store already holding `board`
    pub fn with_board(board: Board) -> Self {
        Self {
            board: Mutex::new(Some(board)),
            failures: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Makes the next `count` calls fail with a persistence error
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Makes every call fail until switched off again
    pub fn set_failing(&self, failing: bool) {
        let count = if failing { usize::MAX } else { 0 };
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Number of backend calls received so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Copy of the stored board
    pub async fn snapshot(&self) -> Option<Board> {
        self.board.lock().await.clone()
    }

    fn admit(&self, operation: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match n {
                0 => None,
                usize::MAX => Some(usize::MAX),
                n => Some(n - 1),
            })
            .is_ok();
        if failing {
            debug!("Injected failure for {}", operation);
            return Err(BoardError::Persistence(format!("{} failed", operation)));
        }
        Ok(())
    }

    async fn with_board_mut<T>(
        &self,
        operation: &str,
        f: impl FnOnce(&mut Board) -> Result<T> + Send,
    ) -> Result<T> {
        self.admit(operation)?;
        let mut guard = self.board.lock().await;
        let board = guard.as_mut().ok_or(BoardError::BoardNotInitialized)?;
        f(board)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BoardStore for MemoryStorage {
    async fn initialize(&self, config: &BoardConfig) -> Result<()> {
        self.admit("initialize")?;
        let mut guard = self.board.lock().await;
        if guard.is_none() {
            *guard = Some(Board::from_config(config));
        }
        Ok(())
    }

    async fn is_initialized(&self) -> bool {
        self.board.lock().await.is_some()
    }

    async fn load_board(&self) -> Result<Board> {
        self.admit("load_board")?;
        self.board
            .lock()
            .await
            .clone()
            .ok_or(BoardError::BoardNotInitialized)
    }

    async fn create_task(&self, task: &Task) -> Result<Task> {
        self.with_board_mut("create_task", |board| storage::create_task_in(board, task))
            .await
    }

    async fn update_task(&self, task: &Task) -> Result<Task> {
        self.with_board_mut("update_task", |board| storage::update_task_in(board, task))
            .await
    }

    async fn delete_task(&self, id: &TaskId) -> Result<()> {
        self.with_board_mut("delete_task", |board| {
            storage::delete_task_in(board, id).map(|_| ())
        })
        .await
    }

    async fn move_task(&self, id: &TaskId, column_id: &ColumnId, index: usize) -> Result<()> {
        self.with_board_mut("move_task", |board| {
            storage::move_task_in(board, id, column_id, index)
        })
        .await
    }

    async fn create_column(&self, column: &Column) -> Result<Column> {
        self.with_board_mut("create_column", |board| {
            storage::create_column_in(board, column)
        })
        .await
    }

    async fn update_column(&self, id: &ColumnId, title: &str) -> Result<()> {
        self.with_board_mut("update_column", |board| {
            storage::update_column_in(board, id, title)
        })
        .await
    }

    async fn delete_column(&self, id: &ColumnId) -> Result<()> {
        self.with_board_mut("delete_column", |board| {
            storage::delete_column_in(board, id).map(|_| ())
        })
        .await
    }

    async fn move_column(&self, id: &ColumnId, index: usize) -> Result<()> {
        self.with_board_mut("move_column", |board| {
            storage::move_column_in(board, id, index)
        })
        .await
    }

    async fn update_board(&self, update: &BoardUpdate) -> Result<()> {
        self.with_board_mut("update_board", |board| {
            storage::update_board_in(board, update)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn initialized() -> MemoryStorage {
        let storage = MemoryStorage::default();
        storage.initialize(&BoardConfig::default()).await.unwrap();
        storage
    }

    #[tokio::test]
    async fn test_initialize_creates_default_board() {
        let storage = MemoryStorage::default();
        assert!(!storage.is_initialized().await);

        storage.initialize(&BoardConfig::default()).await.unwrap();

        assert!(storage.is_initialized().await);
        let board = storage.load_board().await.unwrap();
        assert_eq!(board.columns().len(), BoardConfig::default().columns.len());
    }

    #[tokio::test]
    async fn test_uninitialized_store_rejects_writes() {
        let storage = MemoryStorage::default();
        let result = storage.update_board(&BoardUpdate::default()).await;
        assert!(matches!(result, Err(BoardError::BoardNotInitialized)));
    }

    #[tokio::test]
    async fn test_create_and_move_task() {
        let storage = initialized().await;
        let board = storage.load_board().await.unwrap();
        let first = board.columns()[0].id.clone();
        let second = board.columns()[1].id.clone();

        let task = Task::new("Write docs", first.clone());
        let stored = storage.create_task(&task).await.unwrap();
        assert_eq!(stored.column_id, first);

        storage.move_task(&task.id, &second, 0).await.unwrap();

        let board = storage.load_board().await.unwrap();
        assert_eq!(board.column_of(&task.id).unwrap().id, second);
    }

    #[tokio::test]
    async fn test_create_task_validates() {
        let storage = initialized().await;
        let board = storage.load_board().await.unwrap();

        let blank = Task::new("   ", board.columns()[0].id.clone());
        assert!(matches!(
            storage.create_task(&blank).await,
            Err(BoardError::Validation { .. })
        ));

        let lost = Task::new("Lost", ColumnId::from("missing"));
        assert!(matches!(
            storage.create_task(&lost).await,
            Err(BoardError::InvalidTarget(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_missing_task_is_not_found() {
        let storage = initialized().await;
        let result = storage.delete_task(&TaskId::from("nope")).await;
        assert!(matches!(result, Err(BoardError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_update_board_checks_palette() {
        let storage = initialized().await;
        let update = BoardUpdate {
            title: Some("Roadmap".to_string()),
            color: Some("bg-plaid-500".to_string()),
        };
        assert!(storage.update_board(&update).await.is_err());

        let update = BoardUpdate {
            title: Some("Roadmap".to_string()),
            color: Some("bg-teal-500".to_string()),
        };
        storage.update_board(&update).await.unwrap();
        let board = storage.load_board().await.unwrap();
        assert_eq!(board.title, "Roadmap");
        assert_eq!(board.color, "bg-teal-500");
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let storage = initialized().await;

        storage.fail_next(2);
        assert!(matches!(
            storage.load_board().await,
            Err(BoardError::Persistence(_))
        ));
        assert!(storage.load_board().await.is_err());
        assert!(storage.load_board().await.is_ok());

        storage.set_failing(true);
        for _ in 0..5 {
            assert!(storage.load_board().await.is_err());
        }
        storage.set_failing(false);
        assert!(storage.load_board().await.is_ok());
    }
}
