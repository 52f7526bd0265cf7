pub mod kafka_channel;
#[cfg(feature = "db")]
pub mod libsql_status_store;
pub mod memory_channel;
pub mod memory_status_store;
pub mod sqlite_status_store;

pub use kafka_channel::KafkaChannel;
#[cfg(feature = "db")]
pub use libsql_status_store::LibsqlStatusStore;
pub use memory_channel::InMemoryChannel;
pub use memory_status_store::InMemoryStatusStore;
pub use sqlite_status_store::SqliteStatusStore;
