/// Errors surfaced by a push client when a submission or fetch is not accepted.
///
/// Delivery failures are not reported here: they arrive later as
/// [`DeliveryOutcome`](crate::DeliveryOutcome) values on the response channel.
#[derive(Debug, thiserror::Error)]
pub enum PushClientError {
    #[error("Push client is shut down")]
    ShutDown,
    #[error("Push gateway unreachable: {0}")]
    GatewayUnreachable(String),
    #[error("Feedback service unreachable: {0}")]
    FeedbackUnreachable(String),
    #[error("Invalid device token: {0}")]
    InvalidToken(String),
    #[error("Unknown push mode: {0}")]
    UnknownPushMode(String),
}
