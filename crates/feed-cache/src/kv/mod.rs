//! Key-value stores backing the client-local cache

mod file;
mod memory;
mod redis_store;

pub use file::FileKeyValueStore;
pub use memory::MemoryKeyValueStore;
pub use redis_store::RedisKeyValueStore;
