//! Hands decoded pushes to the push client without waiting for delivery.

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use apns::{PushClient, PushClientError, PushRequest};
use chrono::{DateTime, Duration, Utc};
use log::{debug, error};

use crate::decode::PushForm;

pub struct PushDispatcher {
    client: Arc<dyn PushClient>,
    next_identifier: AtomicU32,
    expiry_secs: u32,
}

impl PushDispatcher {
    pub fn new(client: Arc<dyn PushClient>, expiry_secs: u32) -> Self {
        Self {
            client,
            next_identifier: AtomicU32::new(1),
            expiry_secs,
        }
    }

    /// Submit `form` and return the identifier assigned to it.
    ///
    /// `Ok` only means the client accepted the submission; the delivery
    /// verdict arrives later on the response channel under the same
    /// identifier.
    pub async fn dispatch(&self, form: PushForm) -> Result<u32, PushClientError> {
        let identifier = self.next_identifier.fetch_add(1, Ordering::Relaxed);
        let request = PushRequest {
            mode: form.mode,
            identifier,
            expiry: self.expiry_from(Utc::now()),
            token: form.token,
            payload: form.payload,
        };
        debug!(
            "APNSHTTPSERVER|PUSH|DISPATCH|id={identifier} token={} mode={:?}",
            request.token, request.mode
        );
        self.client.send(request).await.inspect_err(|e| {
            error!("APNSHTTPSERVER|PUSH|FAIL|id={identifier} {e}");
        })?;
        Ok(identifier)
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(Duration::seconds(i64::from(self.expiry_secs)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apns::{ClientChannels, DeviceToken, MemoryPushClient, PushClientConfig, PushMode};
    use tokio::sync::mpsc;

    fn form() -> PushForm {
        PushForm {
            mode: PushMode::Enhanced,
            token: DeviceToken::new([7; 32]),
            payload: b"{}".to_vec(),
        }
    }

    fn setup() -> (PushDispatcher, MemoryPushClient, mpsc::Receiver<apns::DeliveryOutcome>) {
        let (responses, response_rx) = mpsc::channel(100);
        let (feedback, _feedback_rx) = mpsc::channel(1000);
        let client = MemoryPushClient::new(
            PushClientConfig::default(),
            ClientChannels {
                responses,
                feedback,
            },
        );
        (
            PushDispatcher::new(Arc::new(client.clone()), 3600),
            client,
            response_rx,
        )
    }

    #[tokio::test]
    async fn test_dispatch_assigns_identifiers_and_expiry() {
        let (dispatcher, client, mut responses) = setup();
        let before = Utc::now();

        assert_eq!(dispatcher.dispatch(form()).await.unwrap(), 1);
        assert_eq!(dispatcher.dispatch(form()).await.unwrap(), 2);

        let sent = client.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].expiry >= before + Duration::seconds(3600));
        assert!(responses.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_dispatch_surfaces_rejected_submission() {
        let (dispatcher, client, _responses) = setup();
        client.fail_sends(Some("gateway down".to_string()));

        let err = dispatcher.dispatch(form()).await.unwrap_err();
        assert!(err.to_string().contains("gateway down"));
        assert!(client.sent().is_empty());
    }

    #[test]
    fn test_expiry_saturates() {
        let (responses, _r) = mpsc::channel(1);
        let (feedback, _f) = mpsc::channel(1);
        let client = MemoryPushClient::new(
            PushClientConfig::default(),
            ClientChannels {
                responses,
                feedback,
            },
        );
        let dispatcher = PushDispatcher::new(Arc::new(client), u32::MAX);
        assert_eq!(
            dispatcher.expiry_from(DateTime::<Utc>::MAX_UTC),
            DateTime::<Utc>::MAX_UTC
        );
    }
}
