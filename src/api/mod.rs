//! REST server — chat and message endpoints backed by a `ChatStore`.

pub mod routes;
pub mod service;

pub use routes::chat_routes;
pub use service::ChatService;
