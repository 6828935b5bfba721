pub mod database;
pub mod kv_repository;

pub use kv_repository::{KvRepository, KvStore, MemoryStore};
