//! Push client interface.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{DeliveryOutcome, FeedbackEvent, FetchRequest, PushClientError, PushRequest};

/// Production APNs gateway.
pub const GATEWAY_ADDR: &str = "gateway.push.apple.com:2195";
/// Production APNs feedback service.
pub const FEEDBACK_ADDR: &str = "feedback.push.apple.com:2196";
pub const SANDBOX_GATEWAY_ADDR: &str = "gateway.sandbox.push.apple.com:2195";
pub const SANDBOX_FEEDBACK_ADDR: &str = "feedback.sandbox.push.apple.com:2196";

/// Client certificate used to authenticate against the gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateMaterial {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushClientConfig {
    pub cert: CertificateMaterial,
    pub push_addr: String,
    pub feedback_addr: String,
}

impl Default for PushClientConfig {
    fn default() -> Self {
        Self {
            cert: CertificateMaterial::default(),
            push_addr: GATEWAY_ADDR.to_string(),
            feedback_addr: FEEDBACK_ADDR.to_string(),
        }
    }
}

/// Sending halves of the two output streams a push client writes to.
#[derive(Debug, Clone)]
pub struct ClientChannels {
    pub responses: mpsc::Sender<DeliveryOutcome>,
    pub feedback: mpsc::Sender<FeedbackEvent>,
}

#[async_trait]
pub trait PushClient: Send + Sync + 'static {
    /// Queue a notification for delivery.
    ///
    /// Returns once the submission is accepted; the verdict is later written
    /// to the response channel.
    async fn send(&self, request: PushRequest) -> Result<(), PushClientError>;

    /// Start a feedback fetch.
    ///
    /// Records for `request.session` are written to the feedback channel,
    /// at most `request.limit` of them, followed by
    /// [`FeedbackEvent::EndOfBatch`].
    async fn fetch_feedback(&self, request: FetchRequest) -> Result<(), PushClientError>;

    /// Release connections and background tasks owned by the client.
    async fn shutdown(&self);
}
