//! Persistence layer — the `ChatStore` trait and its backends.

pub mod http;
pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod traits;

pub use http::HttpChatStore;
pub use libsql_backend::LibSqlChatStore;
pub use memory::InMemoryChatStore;
pub use traits::ChatStore;
