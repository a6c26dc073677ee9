// SPDX-License-Identifier: MIT
//! Errors returned by the backend client.

use std::{error::Error as StdError, fmt};

#[derive(Debug)]
pub enum BackendError {
    /// The short code contains characters that cannot appear in a short link
    InvalidShortCode(String),
    /// Connection, TLS, or timeout failure before a response arrived
    Transport(reqwest::Error),
    /// The backend answered with a non-2xx status or `success: false`
    Rejected { status: u16, message: String },
    /// The response body did not match the expected envelope
    Decode(String),
}

impl BackendError {
    /// HTTP status, when the backend produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Rejected { status, .. } => Some(*status),
            BackendError::Transport(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// True when the resource does not exist (404) on the backend.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::InvalidShortCode(code) => write!(f, "Invalid short code '{}'", code),
            BackendError::Transport(err) => write!(f, "Backend request failed: {}", err),
            BackendError::Rejected { status, message } => {
                write!(f, "Backend rejected request ({}): {}", status, message)
            }
            BackendError::Decode(reason) => write!(f, "Malformed backend response: {}", reason),
        }
    }
}

impl StdError for BackendError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            BackendError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(error: reqwest::Error) -> Self {
        BackendError::Transport(error)
    }
}
