use std::fmt;
use std::sync::Arc;

use reqwest::StatusCode;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Json(serde_json::Error),
    Reqwest(reqwest::Error),
    /// Non-success response: status plus the response body.
    Http(StatusCode, String),
    Config(String),
    /// Handed to queued callers when the refresh they waited on failed.
    Refresh(Arc<Error>),
    /// The refresh a caller was queued behind was dropped before it settled.
    RefreshAbandoned,
}

impl Error {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Http(status, _) => Some(*status),
            Error::Reqwest(err) => err.status(),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "io error: {}", err),
            Error::Json(err) => write!(f, "json error: {}", err),
            Error::Reqwest(err) => write!(f, "http client error: {}", err),
            Error::Http(status, body) => write!(f, "http {}: {}", status, body),
            Error::Config(msg) => write!(f, "config error: {}", msg),
            Error::Refresh(err) => write!(f, "session refresh failed: {}", err),
            Error::RefreshAbandoned => write!(f, "session refresh abandoned before completion"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::Reqwest(err) => Some(err),
            Error::Refresh(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Reqwest(err)
    }
}
