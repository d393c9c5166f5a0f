use crate::domain::{
    board::Board,
    column::ColumnId,
    task::{Priority, Task},
};
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// Which tasks the board should currently display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    /// Allowed priorities; empty means any
    pub priorities: BTreeSet<Priority>,
    /// Allowed assignees; empty means any
    pub assignees: BTreeSet<String>,
    pub due_date: Option<NaiveDate>,
    /// Keep tasks without a due date while a due date filter is set
    pub include_undated: bool,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            priorities: BTreeSet::new(),
            assignees: BTreeSet::new(),
            due_date: None,
            include_undated: true,
        }
    }
}

impl FilterState {
    pub fn toggle_priority(&mut self, priority: Priority) {
        if !self.priorities.remove(&priority) {
            self.priorities.insert(priority);
        }
    }

    pub fn toggle_assignee(&mut self, assignee: &str) {
        if !self.assignees.remove(assignee) {
            self.assignees.insert(assignee.to_string());
        }
    }

    pub fn set_due_date(&mut self, due_date: Option<NaiveDate>) {
        self.due_date = due_date;
    }

    /// Resets every constraint, keeping the undated policy
    pub fn clear(&mut self) {
        self.priorities.clear();
        self.assignees.clear();
        self.due_date = None;
    }

    /// Number of constraints in effect, as shown on the filter badge
    pub fn active_count(&self) -> usize {
        self.priorities.len() + self.assignees.len() + usize::from(self.due_date.is_some())
    }

    pub fn is_active(&self) -> bool {
        self.active_count() > 0
    }

    pub fn matches(&self, task: &Task) -> bool {
        if !self.priorities.is_empty() && !self.priorities.contains(&task.priority) {
            return false;
        }

        if !self.assignees.is_empty() {
            let assigned = task
                .assignee
                .as_deref()
                .map(|a| self.assignees.contains(a))
                .unwrap_or(false);
            if !assigned {
                return false;
            }
        }

        match (self.due_date, task.due_date) {
            (None, _) => true,
            (Some(_), None) => self.include_undated,
            (Some(wanted), Some(due)) => wanted == due,
        }
    }
}

/// A column as it should be displayed
#[derive(Debug, Clone)]
pub struct FilteredColumn<'a> {
    pub id: &'a ColumnId,
    pub title: &'a str,
    pub position: usize,
    /// Tasks matching the filter, in board order
    pub tasks: Vec<&'a Task>,
    /// Number of tasks in the column before filtering
    pub total: usize,
}

/// Read-only projection of a board narrowed by a filter
#[derive(Debug, Clone)]
pub struct FilteredView<'a> {
    pub columns: Vec<FilteredColumn<'a>>,
}

impl<'a> FilteredView<'a> {
    pub fn task_count(&self) -> usize {
        self.columns.iter().map(|c| c.tasks.len()).sum()
    }

    pub fn column(&self, column_id: &ColumnId) -> Option<&FilteredColumn<'a>> {
        self.columns.iter().find(|c| c.id == column_id)
    }
}

/// Projects the board through the filter. Every column is kept, in order;
/// only the tasks inside each column are narrowed.
pub fn project<'a>(board: &'a Board, filter: &FilterState) -> FilteredView<'a> {
    let columns = board
        .columns()
        .iter()
        .map(|column| {
            let tasks: Vec<&Task> = board
                .ordered_tasks(&column.id)
                .into_iter()
                .filter(|task| filter.matches(task))
                .collect();
            FilteredColumn {
                id: &column.id,
                title: &column.title,
                position: column.position,
                tasks,
                total: column.len(),
            }
        })
        .collect();

    FilteredView { columns }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{column::Column, task::parse_due_date, task::TaskId};

    fn day(s: &str) -> NaiveDate {
        parse_due_date(s).unwrap()
    }

    fn sample_board() -> Board {
        let mut board = Board::new("Filters", "bg-blue-500");
        let todo = ColumnId::from("todo");
        let done = ColumnId::from("done");
        board.push_column(Column::with_id(todo.clone(), "To Do"));
        board.push_column(Column::with_id(done.clone(), "Done"));

        let tasks = [
            ("t1", Priority::Low, Some("2024-05-01"), Some("ana")),
            ("t2", Priority::High, Some("2024-05-02"), Some("ben")),
            ("t3", Priority::Medium, None, None),
            ("t4", Priority::High, Some("2024-05-01T22:45:00-07:00"), Some("ana")),
        ];
        for (id, priority, due, assignee) in tasks {
            let mut task =
                Task::with_id(TaskId::from(id), id, todo.clone()).with_priority(priority);
            task.due_date = due.map(day);
            task.assignee = assignee.map(str::to_string);
            board.insert_task(task, &todo, usize::MAX).unwrap();
        }
        board
    }

    fn titles(view: &FilteredView<'_>, column: &str) -> Vec<String> {
        view.column(&ColumnId::from(column))
            .unwrap()
            .tasks
            .iter()
            .map(|t| t.title.clone())
            .collect()
    }

    #[test]
    fn test_empty_filter_shows_everything() {
        let board = sample_board();
        let view = project(&board, &FilterState::default());

        assert_eq!(view.task_count(), 4);
        assert_eq!(view.columns.len(), 2);
        assert_eq!(titles(&view, "todo"), ["t1", "t2", "t3", "t4"]);
    }

    #[test]
    fn test_priority_filter_keeps_order() {
        let board = sample_board();
        let mut filter = FilterState::default();
        filter.toggle_priority(Priority::High);

        let view = project(&board, &filter);

        assert_eq!(titles(&view, "todo"), ["t2", "t4"]);
        assert_eq!(view.column(&ColumnId::from("todo")).unwrap().total, 4);
    }

    #[test]
    fn test_due_date_filter_ignores_time_of_day() {
        let board = sample_board();
        let mut filter = FilterState::default();
        filter.set_due_date(Some(day("2024-05-01")));

        let view = project(&board, &filter);

        // t3 has no due date and is exempt from the date test
        assert_eq!(titles(&view, "todo"), ["t1", "t3", "t4"]);
    }

    #[test]
    fn test_due_date_filter_can_exclude_undated() {
        let board = sample_board();
        let mut filter = FilterState {
            include_undated: false,
            ..FilterState::default()
        };
        filter.set_due_date(Some(day("2024-05-01")));

        let view = project(&board, &filter);

        assert_eq!(titles(&view, "todo"), ["t1", "t4"]);
    }

    #[test]
    fn test_assignee_filter() {
        let board = sample_board();
        let mut filter = FilterState::default();
        filter.toggle_assignee("ana");

        let view = project(&board, &filter);
        assert_eq!(titles(&view, "todo"), ["t1", "t4"]);

        filter.toggle_assignee("ana");
        assert!(!filter.is_active());
    }

    #[test]
    fn test_filters_combine() {
        let board = sample_board();
        let mut filter = FilterState::default();
        filter.toggle_priority(Priority::High);
        filter.set_due_date(Some(day("2024-05-02")));

        let view = project(&board, &filter);
        assert_eq!(titles(&view, "todo"), ["t2"]);
    }

    #[test]
    fn test_projection_leaves_board_untouched() {
        let board = sample_board();
        let before = board.clone();
        let mut filter = FilterState::default();
        filter.toggle_priority(Priority::Low);

        let _ = project(&board, &filter);
        assert_eq!(board, before);
    }

    #[test]
    fn test_active_count_and_clear() {
        let mut filter = FilterState::default();
        filter.toggle_priority(Priority::High);
        filter.toggle_priority(Priority::Low);
        filter.toggle_assignee("ben");
        filter.set_due_date(Some(day("2024-01-01")));
        assert_eq!(filter.active_count(), 4);

        filter.toggle_priority(Priority::Low);
        assert_eq!(filter.active_count(), 3);

        filter.clear();
        assert_eq!(filter.active_count(), 0);
        assert!(filter.include_undated);
    }
}
