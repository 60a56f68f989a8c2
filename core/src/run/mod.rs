//! Run model: one organization's execution of a task

mod model;

pub use model::{Run, RunUpdate};
