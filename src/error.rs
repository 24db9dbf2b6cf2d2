use std::fmt::Display;
use tokio_tungstenite::tungstenite;

pub type ChatResult<T> = Result<T, ChatErr>;

#[derive(thiserror::Error, Debug)]
pub enum ChatErr {
    #[error("Config: {0}")]
    Config(String),

    #[error("URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Transport: {0}")]
    Transport(#[from] tungstenite::Error),

    #[error("neither a history array nor a live message (history: {history}; live: {live})")]
    Shape { history: serde_json::Error, live: serde_json::Error },

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
}

/* ── helper: turn any displayable error into Config ── */
pub fn config<E: Display>(e: E) -> ChatErr { ChatErr::Config(e.to_string()) }
