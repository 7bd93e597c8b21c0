//! Server lifecycle: channels, push client, router, listener and shutdown.

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use apns::{
    rejection_reason, ClientChannels, DeliveryOutcome, DeliveryStatus, PushClient,
    PushClientConfig,
};
use axum::Router;
use log::{debug, error, info, warn};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    config::ServerConfig, dispatcher::PushDispatcher, error::ServerError,
    feedback::FeedbackCollector, http::HttpFacade,
};

pub const RESPONSE_CHANNEL_CAPACITY: usize = 100;
pub const FEEDBACK_CHANNEL_CAPACITY: usize = 1000;

/// Counters kept by the delivery-outcome drain.
#[derive(Debug, Default)]
pub struct DeliveryStats {
    delivered: AtomicU64,
    rejected: AtomicU64,
}

impl DeliveryStats {
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    fn record(&self, outcome: &DeliveryOutcome) {
        match outcome.status {
            DeliveryStatus::Delivered => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "APNSHTTPSERVER|DELIVERY|SUCC|id={} token={}",
                    outcome.identifier, outcome.token
                );
            }
            DeliveryStatus::Rejected { code } => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "APNSHTTPSERVER|DELIVERY|FAIL|id={} token={} status={code} {}",
                    outcome.identifier,
                    outcome.token,
                    outcome
                        .error
                        .as_deref()
                        .unwrap_or_else(|| rejection_reason(code))
                );
            }
        }
    }
}

/// A running HTTP bridge.
///
/// Each instance owns its router, channels and push client, so any number of
/// them can run side by side in one process.
pub struct ApnsHttpServer {
    local_addr: SocketAddr,
    router: Router,
    client: Arc<dyn PushClient>,
    stats: Arc<DeliveryStats>,
    cancel: CancellationToken,
    listener: JoinHandle<()>,
    outcomes: JoinHandle<()>,
}

impl ApnsHttpServer {
    /// Wire everything up and start listening on `config.bind_addr`.
    ///
    /// `connect` builds the push client from the upstream configuration and
    /// the sending halves of the response and feedback channels. If the
    /// listener cannot bind, the client is shut down again and
    /// [`ServerError::Bind`] is returned.
    pub async fn start<C, F>(config: ServerConfig, connect: F) -> Result<Self, ServerError>
    where
        C: PushClient,
        F: FnOnce(PushClientConfig, ClientChannels) -> C,
    {
        let (responses_tx, responses_rx) = mpsc::channel(RESPONSE_CHANNEL_CAPACITY);
        let (feedback_tx, feedback_rx) = mpsc::channel(FEEDBACK_CHANNEL_CAPACITY);

        let client: Arc<dyn PushClient> = Arc::new(connect(
            config.client.clone(),
            ClientChannels {
                responses: responses_tx,
                feedback: feedback_tx,
            },
        ));

        let cancel = CancellationToken::new();
        let dispatcher = Arc::new(PushDispatcher::new(client.clone(), config.expiry_secs));
        let collector = Arc::new(FeedbackCollector::new(
            client.clone(),
            feedback_rx,
            config.feedback_timeout,
            cancel.child_token(),
        ));
        let router = HttpFacade::new(
            dispatcher,
            collector,
            config.default_feedback_limit,
            config.max_payload_bytes,
        )
        .router();

        let builder = match axum::Server::try_bind(&config.bind_addr) {
            Ok(builder) => builder,
            Err(source) => {
                error!("APNSHTTPSERVER|LISTEN|FAIL|{}|{source}", config.bind_addr);
                client.shutdown().await;
                return Err(ServerError::Bind {
                    addr: config.bind_addr,
                    source,
                });
            }
        };
        let server = builder.serve(router.clone().into_make_service());
        let local_addr = server.local_addr();
        let shutdown = cancel.clone();
        let listener = tokio::spawn(async move {
            let graceful = server.with_graceful_shutdown(async move { shutdown.cancelled().await });
            if let Err(e) = graceful.await {
                error!("APNSHTTPSERVER|LISTEN|FAIL|{e}");
            }
        });
        info!("APNSHTTPSERVER|LISTEN|SUCC|{local_addr} .....");

        let stats = Arc::new(DeliveryStats::default());
        let outcomes = tokio::spawn(drain_outcomes(responses_rx, stats.clone(), cancel.clone()));

        Ok(Self {
            local_addr,
            router,
            client,
            stats,
            cancel,
            listener,
            outcomes,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The routes served by this instance, for driving handlers directly.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn stats(&self) -> &DeliveryStats {
        &self.stats
    }

    /// Release the push client, stop the listener and the outcome drain.
    ///
    /// In-flight feedback drains return what they have so far. Outcomes
    /// already queued are counted; later sends on the response channel fail.
    pub async fn shutdown(self) {
        self.client.shutdown().await;
        self.cancel.cancel();
        if let Err(e) = self.listener.await {
            error!("APNSHTTPSERVER|SHUTDOWN|listener task failed: {e}");
        }
        if let Err(e) = self.outcomes.await {
            error!("APNSHTTPSERVER|SHUTDOWN|outcome drain task failed: {e}");
        }
        info!("APNS HTTP SERVER SHUTDOWN SUCC ....");
    }
}

/// Keep the response channel empty so the push client never blocks on it.
async fn drain_outcomes(
    mut outcomes: mpsc::Receiver<DeliveryOutcome>,
    stats: Arc<DeliveryStats>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            outcome = outcomes.recv() => match outcome {
                Some(outcome) => stats.record(&outcome),
                None => break,
            },
            _ = cancel.cancelled() => {
                // Count what is already queued, refuse anything sent later.
                outcomes.close();
                while let Some(outcome) = outcomes.recv().await {
                    stats.record(&outcome);
                }
                break;
            }
        }
    }
    debug!("APNSHTTPSERVER|DELIVERY|drain stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use apns::{DeviceToken, PushMode, PushRequest};
    use chrono::Utc;

    fn outcome(status: DeliveryStatus) -> DeliveryOutcome {
        let request = PushRequest {
            mode: PushMode::Enhanced,
            identifier: 1,
            expiry: Utc::now(),
            token: DeviceToken::new([1; 32]),
            payload: Vec::new(),
        };
        match status {
            DeliveryStatus::Delivered => DeliveryOutcome::delivered(&request),
            DeliveryStatus::Rejected { code } => DeliveryOutcome::rejected(&request, code),
        }
    }

    #[tokio::test]
    async fn test_drain_counts_outcomes() {
        let (tx, rx) = mpsc::channel(RESPONSE_CHANNEL_CAPACITY);
        let stats = Arc::new(DeliveryStats::default());
        let drain = tokio::spawn(drain_outcomes(rx, stats.clone(), CancellationToken::new()));

        tx.send(outcome(DeliveryStatus::Delivered)).await.unwrap();
        tx.send(outcome(DeliveryStatus::Rejected { code: 8 }))
            .await
            .unwrap();
        tx.send(outcome(DeliveryStatus::Delivered)).await.unwrap();
        drop(tx);
        drain.await.unwrap();

        assert_eq!(stats.delivered(), 2);
        assert_eq!(stats.rejected(), 1);
    }

    #[tokio::test]
    async fn test_drain_stops_on_cancel_while_senders_live() {
        let (tx, rx) = mpsc::channel(RESPONSE_CHANNEL_CAPACITY);
        let stats = Arc::new(DeliveryStats::default());
        let cancel = CancellationToken::new();

        tx.send(outcome(DeliveryStatus::Delivered)).await.unwrap();
        cancel.cancel();
        drain_outcomes(rx, stats.clone(), cancel).await;

        assert_eq!(stats.delivered(), 1);
        assert!(tx.is_closed());
        assert!(tx.send(outcome(DeliveryStatus::Delivered)).await.is_err());
        assert_eq!(stats.delivered(), 1);
    }
}
