use std::net::SocketAddr;

use apns::PushClientError;

use crate::envelope::ResponseStatus;

/// Reasons a push form cannot be turned into a notification.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Token is required")]
    MissingToken,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Payload is required")]
    MissingPayload,
    #[error("Payload is not valid JSON: {0}")]
    MalformedPayload(#[from] serde_json::Error),
    #[error("Payload must be a JSON object")]
    PayloadNotObject,
    #[error("Payload is {size} bytes, limit is {limit}")]
    PayloadTooLarge { size: usize, limit: usize },
    #[error("Unknown push type: {0}")]
    UnknownPushMode(String),
    #[error("Unreadable request body: {0}")]
    Body(String),
}

impl DecodeError {
    /// Envelope status reported for this failure.
    pub fn status(&self) -> ResponseStatus {
        match self {
            DecodeError::MalformedPayload(_) | DecodeError::PayloadNotObject => {
                ResponseStatus::PayloadBodyDecodeError
            }
            DecodeError::PayloadTooLarge { .. } => ResponseStatus::PayloadTooLarge,
            DecodeError::MissingToken
            | DecodeError::InvalidToken(_)
            | DecodeError::MissingPayload
            | DecodeError::UnknownPushMode(_)
            | DecodeError::Body(_) => ResponseStatus::InvalidNotifyFormat,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FeedbackError {
    #[error("Fetch Feedback Over limit 100: requested {0}")]
    OverLimit(usize),
    #[error("Invalid feedback limit: {0}")]
    InvalidLimit(String),
    #[error("Failed to fetch feedback: {0}")]
    Fetch(#[from] PushClientError),
}

impl FeedbackError {
    pub fn status(&self) -> ResponseStatus {
        match self {
            FeedbackError::OverLimit(_) => ResponseStatus::FetchFeedbackOverLimit,
            FeedbackError::InvalidLimit(_) => ResponseStatus::InvalidArguments,
            FeedbackError::Fetch(_) => ResponseStatus::Error,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: hyper::Error,
    },
    #[error("Invalid configuration: {0}")]
    Config(String),
}
