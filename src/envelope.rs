//! The uniform reply written for every request.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use log::{error, info};
use serde::{Serialize, Serializer};
use serde_json::Value;

pub const CONTENT_TYPE: &str = "text/json";

/// Outcome code carried inside the envelope. The HTTP status is always 200.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Success,
    InvalidProto,
    InvalidNotifyFormat,
    InvalidArguments,
    PayloadBodyDecodeError,
    PayloadTooLarge,
    Error,
    FetchFeedbackOverLimit,
}

impl ResponseStatus {
    pub fn code(self) -> u16 {
        match self {
            ResponseStatus::Success => 200,
            ResponseStatus::InvalidProto => 201,
            ResponseStatus::InvalidNotifyFormat => 400,
            ResponseStatus::InvalidArguments => 401,
            ResponseStatus::PayloadBodyDecodeError => 402,
            ResponseStatus::PayloadTooLarge => 413,
            ResponseStatus::Error => 500,
            ResponseStatus::FetchFeedbackOverLimit => 501,
        }
    }
}

impl Serialize for ResponseStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.code())
    }
}

/// `{ "Status": <int>, "Error": <string|null>, "Body": <payload|null> }`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResponseEnvelope {
    status: ResponseStatus,
    error: Option<String>,
    body: Option<Value>,
}

impl ResponseEnvelope {
    pub fn success(body: Option<Value>) -> Self {
        Self {
            status: ResponseStatus::Success,
            error: None,
            body,
        }
    }

    pub fn failure(status: ResponseStatus, error: impl ToString) -> Self {
        Self {
            status,
            error: Some(error.to_string()),
            body: None,
        }
    }

    /// A successful reply whose body is known to be incomplete.
    pub fn partial(body: Value, note: impl ToString) -> Self {
        Self {
            status: ResponseStatus::Success,
            error: Some(note.to_string()),
            body: Some(body),
        }
    }

    pub fn status(&self) -> ResponseStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn marshal(&self) -> Vec<u8> {
        match serde_json::to_vec(self) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("APNSHTTPSERVER|MARSHAL|FAIL|{e}");
                br#"{"Status":500,"Error":"response marshal failed","Body":null}"#.to_vec()
            }
        }
    }
}

impl IntoResponse for ResponseEnvelope {
    fn into_response(self) -> Response {
        let body = self.marshal();
        info!("APNSHTTPSERVER|RESPONSE|{}", String::from_utf8_lossy(&body));
        let mut response = (StatusCode::OK, body).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(CONTENT_TYPE),
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_shape() {
        let ok = ResponseEnvelope::success(None);
        assert_eq!(ok.marshal(), br#"{"Status":200,"Error":null,"Body":null}"#.to_vec());

        let err = ResponseEnvelope::failure(ResponseStatus::InvalidProto, "Unsupported GET");
        let value: Value = serde_json::from_slice(&err.marshal()).unwrap();
        assert_eq!(
            value,
            json!({ "Status": 201, "Error": "Unsupported GET", "Body": null })
        );
    }

    #[test]
    fn test_marshal_is_stable() {
        let envelope = ResponseEnvelope::partial(json!([{ "Token": "ab", "Time": 1 }]), "late");
        assert_eq!(envelope.marshal(), envelope.clone().marshal());
        assert_eq!(envelope.status(), ResponseStatus::Success);
        assert_eq!(envelope.error(), Some("late"));
    }

    #[test]
    fn test_into_response_sets_content_type() {
        let response = ResponseEnvelope::failure(ResponseStatus::Error, "boom").into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
        assert_eq!(content_type.to_str().unwrap(), CONTENT_TYPE);
    }
}
