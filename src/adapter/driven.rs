// 駆動される側アダプター（ロガー・オラクル・サーバー・ストア実装）

mod console_logger;
mod in_memory_cart_server;
mod in_memory_oracle;
mod snapshot_store;

pub use console_logger::{ConsoleLogger, LogEntry};
pub use in_memory_cart_server::InMemoryCartServer;
pub use in_memory_oracle::InMemoryInventoryOracle;
pub use snapshot_store::{FileSnapshotStore, InMemorySnapshotStore};
