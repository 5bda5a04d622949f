//! Storage Module
//!
//! Persistence for Item States behind the [`ItemRepository`] trait:
//! - SQLite repository with versioned migrations and optimistic writes
//! - In-memory repository with write-failure injection

mod memory;
mod migrations;
mod repository;
mod sqlite;

pub use memory::MemoryRepository;
pub use migrations::MIGRATIONS;
pub use repository::{ItemRepository, Result, StorageError};
pub use sqlite::SqliteRepository;
