//! Persistence layer: repository trait and file-backed implementation

mod file_store;
mod repository;

pub use file_store::FileRegistry;
pub use repository::Registry;
