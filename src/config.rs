use std::{net::SocketAddr, time::Duration};

use apns::PushClientConfig;

use crate::feedback::MAX_FEEDBACK_LIMIT;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:7070";
pub const DEFAULT_EXPIRY_SECS: u32 = 3600;
pub const DEFAULT_FEEDBACK_TIMEOUT: Duration = Duration::from_secs(5);
/// Legacy APNs payload ceiling.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 256;

/// Startup configuration. Read-only once the server is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Certificate material and upstream push/feedback addresses.
    pub client: PushClientConfig,
    /// Seconds a queued push stays valid at the gateway.
    pub expiry_secs: u32,
    /// Batch size used when a feedback request carries no `limit`.
    pub default_feedback_limit: usize,
    /// Longest a feedback request waits for its batch.
    pub feedback_timeout: Duration,
    pub max_payload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            client: PushClientConfig::default(),
            expiry_secs: DEFAULT_EXPIRY_SECS,
            default_feedback_limit: MAX_FEEDBACK_LIMIT,
            feedback_timeout: DEFAULT_FEEDBACK_TIMEOUT,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}
