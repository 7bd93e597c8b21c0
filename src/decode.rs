//! Form and query decoding for the HTTP endpoints.

use std::{collections::HashMap, num::IntErrorKind};

use apns::{DeviceToken, PushMode};
use serde_json::Value;

use crate::error::{DecodeError, FeedbackError};

pub const PUSH_MODE_FIELD: &str = "pt";
pub const TOKEN_FIELD: &str = "token";
pub const PAYLOAD_FIELD: &str = "payload";
pub const LIMIT_FIELD: &str = "limit";

/// A push form that passed decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushForm {
    pub mode: PushMode,
    pub token: DeviceToken,
    /// Compact JSON.
    pub payload: Vec<u8>,
}

/// Parse `application/x-www-form-urlencoded` bytes. The first value of a
/// repeated key wins.
pub fn form_fields(input: &[u8]) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    for (key, value) in url::form_urlencoded::parse(input) {
        fields
            .entry(key.into_owned())
            .or_insert_with(|| value.into_owned());
    }
    fields
}

pub fn decode_push_form(body: &[u8], max_payload_bytes: usize) -> Result<PushForm, DecodeError> {
    let fields = form_fields(body);

    let mode = match fields.get(PUSH_MODE_FIELD) {
        Some(tag) => tag
            .parse::<PushMode>()
            .map_err(|_| DecodeError::UnknownPushMode(tag.clone()))?,
        None => PushMode::default(),
    };

    let token = match fields.get(TOKEN_FIELD).map(|t| t.trim()) {
        None | Some("") => return Err(DecodeError::MissingToken),
        Some(token) => token
            .parse::<DeviceToken>()
            .map_err(|e| DecodeError::InvalidToken(e.to_string()))?,
    };

    let raw = match fields.get(PAYLOAD_FIELD) {
        None => return Err(DecodeError::MissingPayload),
        Some(raw) if raw.trim().is_empty() => return Err(DecodeError::MissingPayload),
        Some(raw) => raw,
    };
    let value: Value = serde_json::from_str(raw)?;
    if !value.is_object() {
        return Err(DecodeError::PayloadNotObject);
    }
    let payload = serde_json::to_vec(&value)?;
    if payload.len() > max_payload_bytes {
        return Err(DecodeError::PayloadTooLarge {
            size: payload.len(),
            limit: max_payload_bytes,
        });
    }

    Ok(PushForm {
        mode,
        token,
        payload,
    })
}

/// Read `limit` from a raw query string, falling back to `default` when absent.
///
/// A numeric value too large for `usize` saturates so it is reported as over
/// the limit rather than as malformed.
pub fn parse_limit(query: Option<&str>, default: usize) -> Result<usize, FeedbackError> {
    let fields = form_fields(query.unwrap_or_default().as_bytes());
    let Some(raw) = fields.get(LIMIT_FIELD).map(|v| v.trim()) else {
        return Ok(default);
    };
    if raw.is_empty() {
        return Ok(default);
    }
    match raw.parse::<usize>() {
        Ok(limit) => Ok(limit),
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => Ok(usize::MAX),
        Err(_) => Err(FeedbackError::InvalidLimit(raw.to_string())),
    }
}
