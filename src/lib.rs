//! Client side of a ride's group chat: one WebSocket connection per room,
//! a history snapshot on connect, live messages after that.
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod session;
pub mod state;

pub use config::ChatConfig;
pub use error::{ChatErr, ChatResult};
pub use models::{ChatMessage, Frame, Identity, OutgoingMessage};
pub use session::RoomSession;
pub use state::RoomView;
