//! HTTP endpoints. Every call answers with exactly one [`ResponseEnvelope`].

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, RawQuery, State},
    http::Method,
    routing::any,
    Router,
};
use log::warn;

use crate::{
    decode::{decode_push_form, parse_limit},
    dispatcher::PushDispatcher,
    envelope::{ResponseEnvelope, ResponseStatus},
    error::DecodeError,
    feedback::FeedbackCollector,
};

pub const PUSH_PATH: &str = "/apns/push";
pub const FEEDBACK_PATH: &str = "/apns/feedback";

/// Upper bound on a push form body. The JSON payload limit is checked
/// separately after decoding.
pub const MAX_FORM_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct HttpFacade {
    dispatcher: Arc<PushDispatcher>,
    collector: Arc<FeedbackCollector>,
    default_feedback_limit: usize,
    max_payload_bytes: usize,
}

impl HttpFacade {
    pub fn new(
        dispatcher: Arc<PushDispatcher>,
        collector: Arc<FeedbackCollector>,
        default_feedback_limit: usize,
        max_payload_bytes: usize,
    ) -> Self {
        Self {
            dispatcher,
            collector,
            default_feedback_limit,
            max_payload_bytes,
        }
    }

    /// Routes for this facade only; nothing is registered globally.
    pub fn router(self) -> Router {
        Router::new()
            .route(PUSH_PATH, any(handle_push))
            .route(FEEDBACK_PATH, any(handle_feedback))
            .layer(DefaultBodyLimit::max(MAX_FORM_BYTES))
            .with_state(self)
    }

    pub async fn push(&self, method: &Method, body: &[u8]) -> ResponseEnvelope {
        if method != Method::POST {
            return unsupported(method);
        }
        let form = match decode_push_form(body, self.max_payload_bytes) {
            Ok(form) => form,
            Err(e) => {
                warn!("APNSHTTPSERVER|PUSH|DECODE|FAIL|{e}");
                return ResponseEnvelope::failure(e.status(), e);
            }
        };
        match self.dispatcher.dispatch(form).await {
            Ok(_) => ResponseEnvelope::success(None),
            Err(e) => ResponseEnvelope::failure(ResponseStatus::Error, e),
        }
    }

    pub async fn feedback(&self, method: &Method, query: Option<&str>) -> ResponseEnvelope {
        if method != Method::GET {
            return unsupported(method);
        }
        let batch = match parse_limit(query, self.default_feedback_limit) {
            Ok(limit) => self.collector.collect(limit).await,
            Err(e) => Err(e),
        };
        let batch = match batch {
            Ok(batch) => batch,
            Err(e) => {
                warn!("APNSHTTPSERVER|FEEDBACK|FAIL|{e}");
                return ResponseEnvelope::failure(e.status(), e);
            }
        };
        let count = batch.records.len();
        match serde_json::to_value(&batch.records) {
            Ok(body) if batch.complete => ResponseEnvelope::success(Some(body)),
            Ok(body) => ResponseEnvelope::partial(
                body,
                format!("Feedback batch incomplete: {count} records before deadline"),
            ),
            Err(e) => ResponseEnvelope::failure(ResponseStatus::Error, e),
        }
    }
}

fn unsupported(method: &Method) -> ResponseEnvelope {
    ResponseEnvelope::failure(
        ResponseStatus::InvalidProto,
        format!("Unsupported {method} method invoke!"),
    )
}

async fn handle_push(
    State(facade): State<HttpFacade>,
    method: Method,
    body: Result<Bytes, BytesRejection>,
) -> ResponseEnvelope {
    match body {
        Ok(body) => facade.push(&method, &body).await,
        Err(rejection) if method == Method::POST => {
            let e = DecodeError::Body(rejection.body_text());
            ResponseEnvelope::failure(e.status(), e)
        }
        Err(_) => unsupported(&method),
    }
}

async fn handle_feedback(
    State(facade): State<HttpFacade>,
    method: Method,
    RawQuery(query): RawQuery,
) -> ResponseEnvelope {
    facade.feedback(&method, query.as_deref()).await
}
