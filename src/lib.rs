//! HTTP bridge in front of an asynchronous APNs push client.
//!
//! `POST /apns/push` hands a notification to the client and returns as soon
//! as it is accepted. `GET /apns/feedback` starts a feedback fetch and waits,
//! up to a deadline, for the records to come back on the feedback channel.

pub mod cli;
pub mod config;
pub mod decode;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod feedback;
pub mod http;
pub mod server;

pub use config::ServerConfig;
pub use envelope::{ResponseEnvelope, ResponseStatus};
pub use error::{DecodeError, FeedbackError, ServerError};
pub use feedback::{FeedbackBatch, FeedbackCollector, MAX_FEEDBACK_LIMIT};
pub use http::{HttpFacade, FEEDBACK_PATH, PUSH_PATH};
pub use server::{ApnsHttpServer, DeliveryStats};
