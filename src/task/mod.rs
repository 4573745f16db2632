#![forbid(unsafe_code)]

pub mod list;
pub mod model;
pub mod query;
pub mod repository;

pub use list::TaskList;
pub use model::{NewTask, Task, TaskPatch};
pub use query::{FilterParams, Pagination, SortDirection, SortField, SortParams, TaskView};
pub use repository::{StoredTaskRepository, TaskRepository};
