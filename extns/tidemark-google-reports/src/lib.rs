//! Client for the Google Workspace Admin SDK Reports API (activity listing). Activities are paged
//! with an opaque `nextPageToken`.
//!
//! Minting the OAuth access token (service account with domain-wide delegation) happens outside of
//! this crate, the client only sends the bearer token it was given.

pub mod activities;

pub use activities::{ActivitiesPage, ActivityQuery, ApplicationName, ReportsClient, ReportsConfig};

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
