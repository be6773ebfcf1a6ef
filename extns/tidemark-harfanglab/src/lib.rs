//! Client for the Harfanglab EDR agent inventory. Agents are listed ordered by the time they were
//! first seen, using offset/limit pagination with a `next` link.

pub mod agents;

pub use agents::{AgentPage, AgentQuery, HarfanglabClient, HarfanglabConfig};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error("Transport - {0}")]
    Transport(String),

    #[error("Status {status} - {body}")]
    Status { status: u16, body: String },

    #[error("Decode - {0}")]
    Decode(String),

    #[error("Config - {0}")]
    Config(String),
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            Error::Decode(value.to_string())
        } else {
            Error::Transport(value.to_string())
        }
    }
}
