use crate::{
    config::BoardConfig,
    domain::{Board, Column, ColumnId, Task, TaskId},
    error::{BoardError, Result},
    storage::{self, BoardStore, BoardUpdate},
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::{fs, sync::Mutex};
use tracing::{debug, warn};

/// File-based storage: the board layout in `board.json`, one JSON file per
/// task under `tasks/`.
pub struct FileStorage {
    root_path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    const KANBAN_DIR: &'static str = ".kanban";
    const TASKS_DIR: &'static str = "tasks";
    const BOARD_FILE: &'static str = "board.json";

    /// Creates a new FileStorage instance for the given project root
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            root_path: project_root.as_ref().join(Self::KANBAN_DIR),
            write_lock: Mutex::new(()),
        }
    }

    fn tasks_dir(&self) -> PathBuf {
        self.root_path.join(Self::TASKS_DIR)
    }

    fn board_file(&self) -> PathBuf {
        self.root_path.join(Self::BOARD_FILE)
    }

    fn task_file(&self, id: &TaskId) -> PathBuf {
        self.tasks_dir().join(format!("{}.json", id.as_str()))
    }

    async fn ensure_directory_exists(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path).await?;
        }
        Ok(())
    }

    async fn read_board(&self) -> Result<Board> {
        let board_file = self.board_file();

        if !board_file.exists() {
            return Err(BoardError::BoardNotInitialized);
        }

        let contents = fs::read_to_string(&board_file).await?;
        let layout: Board = serde_json::from_str(&contents)?;

        let mut tasks = Vec::new();
        for column in layout.columns() {
            for id in &column.task_ids {
                let file_path = self.task_file(id);
                if !file_path.exists() {
                    warn!("Task file for {} is missing", id);
                    continue;
                }
                let contents = fs::read_to_string(&file_path).await?;
                tasks.push(serde_json::from_str::<Task>(&contents)?);
            }
        }

        Ok(layout.with_tasks(tasks))
    }

    /// Writes the layout and every task record of the board
    async fn write_board(&self, board: &Board) -> Result<()> {
        self.ensure_directory_exists(&self.tasks_dir()).await?;

        for task in board.tasks() {
            let json = serde_json::to_string_pretty(task)?;
            fs::write(self.task_file(&task.id), json).await?;
        }

        let json = serde_json::to_string_pretty(board)?;
        fs::write(self.board_file(), json).await?;
        Ok(())
    }

    async fn remove_task_files(&self, tasks: &[Task]) -> Result<()> {
        for task in tasks {
            let file_path = self.task_file(&task.id);
            if file_path.exists() {
                fs::remove_file(file_path).await?;
            }
        }
        Ok(())
    }

    /// Loads the board, applies `f` and writes the result back
    async fn update<T: Send>(
        &self,
        operation: &str,
        f: impl FnOnce(&mut Board) -> Result<T> + Send,
    ) -> Result<T> {
        let _guard = self.write_lock.lock().await;
        let mut board = self.read_board().await?;
        let value = f(&mut board)?;
        self.write_board(&board).await?;
        debug!("Persisted {} to {}", operation, self.root_path.display());
        Ok(value)
    }
}

#[async_trait]
impl BoardStore for FileStorage {
    async fn initialize(&self, config: &BoardConfig) -> Result<()> {
        self.ensure_directory_exists(&self.root_path).await?;
        self.ensure_directory_exists(&self.tasks_dir()).await?;

        if !self.board_file().exists() {
            let board = Board::from_config(config);
            self.write_board(&board).await?;
        }

        Ok(())
    }

    async fn is_initialized(&self) -> bool {
        self.root_path.exists() && self.board_file().exists()
    }

    async fn load_board(&self) -> Result<Board> {
        self.read_board().await
    }

    async fn create_task(&self, task: &Task) -> Result<Task> {
        self.update("create_task", |board| storage::create_task_in(board, task))
            .await
    }

    async fn update_task(&self, task: &Task) -> Result<Task> {
        self.update("update_task", |board| storage::update_task_in(board, task))
            .await
    }

    async fn delete_task(&self, id: &TaskId) -> Result<()> {
        let removed = self
            .update("delete_task", |board| storage::delete_task_in(board, id))
            .await?;
        self.remove_task_files(&[removed]).await
    }

    async fn move_task(&self, id: &TaskId, column_id: &ColumnId, index: usize) -> Result<()> {
        self.update("move_task", |board| {
            storage::move_task_in(board, id, column_id, index)
        })
        .await
    }

    async fn create_column(&self, column: &Column) -> Result<Column> {
        self.update("create_column", |board| {
            storage::create_column_in(board, column)
        })
        .await
    }

    async fn update_column(&self, id: &ColumnId, title: &str) -> Result<()> {
        self.update("update_column", |board| {
            storage::update_column_in(board, id, title)
        })
        .await
    }

    async fn delete_column(&self, id: &ColumnId) -> Result<()> {
        let removed = self
            .update("delete_column", |board| storage::delete_column_in(board, id))
            .await?;
        self.remove_task_files(&removed).await
    }

    async fn move_column(&self, id: &ColumnId, index: usize) -> Result<()> {
        self.update("move_column", |board| {
            storage::move_column_in(board, id, index)
        })
        .await
    }

    async fn update_board(&self, update: &BoardUpdate) -> Result<()> {
        self.update("update_board", |board| {
            storage::update_board_in(board, update)
        })
        .await
    }
}
