pub mod api;
pub mod bridge;
pub mod config;
pub mod engine;
pub mod models;
pub mod translate;
mod utils;

pub use api::WebSocketServer;
pub use bridge::Bridge;
pub use config::ServerConfig;
pub use engine::Engine;
