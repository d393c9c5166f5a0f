pub mod board;
pub mod column;
pub mod filter;
pub mod task;

pub use board::{Board, BOARD_COLORS};
pub use column::{Column, ColumnId};
pub use filter::{project, FilterState, FilteredColumn, FilteredView};
pub use task::{parse_due_date, Priority, Task, TaskId};
