//! Task model and status aggregation

mod model;

pub use model::{aggregate_status, Task, TaskStatus};
