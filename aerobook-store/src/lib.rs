pub mod app_config;
pub mod database;
pub mod memory;
pub mod pg;

pub use app_config::{Config, DatabaseConfig, WorkerConfig};
pub use database::DbClient;
pub use memory::MemoryStore;
pub use pg::PgStore;
