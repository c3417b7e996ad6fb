//! Failures talking to the game service.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: String },
    #[error("could not reach game service at {endpoint}: {source}")]
    Unreachable {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("game service returned {status} for {endpoint}: {detail}")]
    Status {
        endpoint: String,
        status: u16,
        detail: String,
    },
    #[error("malformed response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("response from {endpoint} is missing '{field}'")]
    MissingField {
        endpoint: String,
        field: &'static str,
    },
}

impl TransportError {
    pub(crate) fn from_reqwest(endpoint: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                endpoint: endpoint.to_string(),
            }
        } else {
            Self::Unreachable {
                endpoint: endpoint.to_string(),
                source,
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }

    /// Short, generic text suitable for the status line. Details stay in the logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Timeout { .. } | Self::Unreachable { .. } => {
                "Game server unreachable; check the connection and retry."
            }
            Self::Status { status: 404, .. } => {
                "Game session not found on the server; start a new game."
            }
            Self::Status { .. } => "Game server rejected the request.",
            Self::Decode { .. } | Self::MissingField { .. } => {
                "Game server sent an unreadable response."
            }
        }
    }
}
