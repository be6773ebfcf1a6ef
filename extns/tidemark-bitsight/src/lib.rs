//! Client for the Bitsight ratings API findings of a single company. Findings can only be
//! filtered by the day they were last seen, and are paged with offset/limit.

pub mod findings;

pub use findings::{BitsightClient, BitsightConfig, FindingsPage, FindingsQuery};

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
