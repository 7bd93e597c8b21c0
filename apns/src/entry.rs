//! Values exchanged between the HTTP bridge and a push client.
use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::PushClientError;

/// Length in bytes of a device token.
pub const DEVICE_TOKEN_LEN: usize = 32;

/// How a notification is framed for the gateway.
///
/// `Enhanced` carries an identifier and expiry so the gateway can report
/// per-notification errors; `Simple` does not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum PushMode {
    Simple,
    #[default]
    Enhanced,
}

impl FromStr for PushMode {
    type Err = PushClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "1" | "enhanced" => Ok(PushMode::Enhanced),
            "0" | "simple" => Ok(PushMode::Simple),
            other => Err(PushClientError::UnknownPushMode(other.to_string())),
        }
    }
}

/// A device token, hex encoded on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceToken([u8; DEVICE_TOKEN_LEN]);

impl DeviceToken {
    pub fn new(bytes: [u8; DEVICE_TOKEN_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DEVICE_TOKEN_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for DeviceToken {
    type Err = PushClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; DEVICE_TOKEN_LEN];
        hex::decode_to_slice(s.trim(), &mut bytes)
            .map_err(|e| PushClientError::InvalidToken(e.to_string()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for DeviceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for DeviceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceToken({})", self.to_hex())
    }
}

impl Serialize for DeviceToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// A notification ready to hand to the push client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushRequest {
    pub mode: PushMode,
    /// Per-server identifier echoed back on the matching [`DeliveryOutcome`].
    pub identifier: u32,
    /// After this instant the gateway may drop the notification.
    pub expiry: DateTime<Utc>,
    pub token: DeviceToken,
    /// Compact JSON payload.
    pub payload: Vec<u8>,
}

/// Gateway verdict for one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    /// Rejected with an APNs error-response status code.
    Rejected { code: u8 },
}

/// Human readable text for an APNs error-response status code.
pub fn rejection_reason(code: u8) -> &'static str {
    match code {
        0 => "no errors encountered",
        1 => "processing error",
        2 => "missing device token",
        3 => "missing topic",
        4 => "missing payload",
        5 => "invalid token size",
        6 => "invalid topic size",
        7 => "invalid payload size",
        8 => "invalid token",
        10 => "shutdown",
        _ => "unknown",
    }
}

/// Result of one push attempt, produced asynchronously by the push client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub identifier: u32,
    pub token: DeviceToken,
    pub status: DeliveryStatus,
    pub error: Option<String>,
}

impl DeliveryOutcome {
    pub fn delivered(request: &PushRequest) -> Self {
        Self {
            identifier: request.identifier,
            token: request.token,
            status: DeliveryStatus::Delivered,
            error: None,
        }
    }

    pub fn rejected(request: &PushRequest, code: u8) -> Self {
        Self {
            identifier: request.identifier,
            token: request.token,
            status: DeliveryStatus::Rejected { code },
            error: Some(rejection_reason(code).to_string()),
        }
    }

    pub fn is_delivered(&self) -> bool {
        self.status == DeliveryStatus::Delivered
    }
}

/// A device token the feedback service reported as no longer valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FeedbackRecord {
    pub token: DeviceToken,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub time: DateTime<Utc>,
}

impl FeedbackRecord {
    pub fn new(token: DeviceToken, time: DateTime<Utc>) -> Self {
        Self { token, time }
    }
}

/// Identifies one feedback fetch. Every event produced for the fetch carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchSession(Uuid);

impl FetchSession {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FetchSession {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FetchSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Ask the push client for up to `limit` feedback records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    pub session: FetchSession,
    pub limit: usize,
}

/// One item on the feedback channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackEvent {
    Record {
        session: FetchSession,
        record: FeedbackRecord,
    },
    /// The feedback service has nothing more for this session.
    EndOfBatch { session: FetchSession },
}

impl FeedbackEvent {
    pub fn session(&self) -> FetchSession {
        match self {
            FeedbackEvent::Record { session, .. } | FeedbackEvent::EndOfBatch { session } => {
                *session
            }
        }
    }
}
