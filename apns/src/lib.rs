//! Push client seam for the APNs HTTP bridge.
//!
//! The bridge talks to the gateway only through [`PushClient`]: submissions go
//! in, and delivery outcomes and feedback events come back on the channels in
//! [`ClientChannels`].

mod client;
mod entry;
mod error;
mod memory;

pub use client::{
    CertificateMaterial, ClientChannels, PushClient, PushClientConfig, FEEDBACK_ADDR,
    GATEWAY_ADDR, SANDBOX_FEEDBACK_ADDR, SANDBOX_GATEWAY_ADDR,
};
pub use entry::{
    rejection_reason, DeliveryOutcome, DeliveryStatus, DeviceToken, FeedbackEvent,
    FeedbackRecord, FetchRequest, FetchSession, PushMode, PushRequest, DEVICE_TOKEN_LEN,
};
pub use error::PushClientError;
pub use memory::{MemoryPushClient, SENT_HISTORY_LIMIT};
