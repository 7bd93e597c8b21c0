//! In-process stand-in for the APNs gateway and feedback service.
//!
//! Every accepted push is answered on the response channel from a spawned
//! task, and feedback fetches are served from a local queue of invalidated
//! tokens. Pushes to tokens marked with [`MemoryPushClient::reject_token`]
//! are rejected with status 8 (invalid token) and the token is queued for
//! feedback, mirroring what the real gateway reports.
//!
//! Failure knobs (`fail_sends`, `fail_fetches`, `stall_feedback`) let callers
//! exercise the error paths of whatever sits on top of the client.

use std::{
    collections::{HashSet, VecDeque},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info};
use tokio_util::sync::CancellationToken;

use crate::{
    ClientChannels, DeliveryOutcome, DeviceToken, FeedbackEvent, FeedbackRecord, FetchRequest,
    PushClient, PushClientConfig, PushClientError, PushRequest,
};

const INVALID_TOKEN_STATUS: u8 = 8;

/// Accepted pushes kept for inspection; older ones are forgotten.
pub const SENT_HISTORY_LIMIT: usize = 1024;

#[derive(Clone)]
pub struct MemoryPushClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: PushClientConfig,
    channels: ClientChannels,
    cancel: CancellationToken,
    shut_down: AtomicBool,
    shutdowns: AtomicUsize,
    fetches: AtomicUsize,
    sends: AtomicUsize,
    stall_feedback: AtomicBool,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    sent: VecDeque<PushRequest>,
    rejected_tokens: HashSet<DeviceToken>,
    invalid_tokens: VecDeque<FeedbackRecord>,
    send_failure: Option<String>,
    fetch_failure: Option<String>,
}

impl MemoryPushClient {
    pub fn new(config: PushClientConfig, channels: ClientChannels) -> Self {
        info!(
            "APNSCLIENT|MEMORY|INIT|push={} feedback={} cert={}",
            config.push_addr,
            config.feedback_addr,
            config.cert.cert_path.display()
        );
        Self {
            inner: Arc::new(Inner {
                config,
                channels,
                cancel: CancellationToken::new(),
                shut_down: AtomicBool::new(false),
                shutdowns: AtomicUsize::new(0),
                fetches: AtomicUsize::new(0),
                sends: AtomicUsize::new(0),
                stall_feedback: AtomicBool::new(false),
                state: Mutex::new(State::default()),
            }),
        }
    }

    pub fn config(&self) -> &PushClientConfig {
        &self.inner.config
    }

    /// Queue `token` as invalid; it is returned by a later feedback fetch.
    pub fn report_invalid(&self, record: FeedbackRecord) {
        self.state().invalid_tokens.push_back(record);
    }

    /// Reject future pushes to `token` with an invalid-token status.
    pub fn reject_token(&self, token: DeviceToken) {
        self.state().rejected_tokens.insert(token);
    }

    /// Make every following `send` fail with `reason`, or succeed again on `None`.
    pub fn fail_sends(&self, reason: Option<String>) {
        self.state().send_failure = reason;
    }

    /// Make every following `fetch_feedback` fail with `reason`, or succeed again on `None`.
    pub fn fail_fetches(&self, reason: Option<String>) {
        self.state().fetch_failure = reason;
    }

    /// When set, fetches are accepted but nothing is ever written back.
    pub fn stall_feedback(&self, stall: bool) {
        self.inner.stall_feedback.store(stall, Ordering::SeqCst);
    }

    /// The most recent accepted pushes, oldest first, at most [`SENT_HISTORY_LIMIT`].
    pub fn sent(&self) -> Vec<PushRequest> {
        self.state().sent.iter().cloned().collect()
    }

    /// Number of pushes accepted since construction.
    pub fn send_count(&self) -> usize {
        self.inner.sends.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.inner.fetches.load(Ordering::SeqCst)
    }

    pub fn shutdown_count(&self) -> usize {
        self.inner.shutdowns.load(Ordering::SeqCst)
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_running(&self) -> Result<(), PushClientError> {
        if self.is_shut_down() {
            return Err(PushClientError::ShutDown);
        }
        Ok(())
    }
}

#[async_trait]
impl PushClient for MemoryPushClient {
    async fn send(&self, request: PushRequest) -> Result<(), PushClientError> {
        self.ensure_running()?;
        let outcome = {
            let mut state = self.state();
            if let Some(reason) = &state.send_failure {
                return Err(PushClientError::GatewayUnreachable(reason.clone()));
            }
            let outcome = if state.rejected_tokens.contains(&request.token) {
                state
                    .invalid_tokens
                    .push_back(FeedbackRecord::new(request.token, Utc::now()));
                DeliveryOutcome::rejected(&request, INVALID_TOKEN_STATUS)
            } else {
                DeliveryOutcome::delivered(&request)
            };
            if state.sent.len() == SENT_HISTORY_LIMIT {
                state.sent.pop_front();
            }
            state.sent.push_back(request);
            self.inner.sends.fetch_add(1, Ordering::SeqCst);
            outcome
        };

        let responses = self.inner.channels.responses.clone();
        let cancel = self.inner.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                res = responses.send(outcome) => {
                    if res.is_err() {
                        debug!("APNSCLIENT|MEMORY|RESPONSE|receiver dropped");
                    }
                }
            }
        });
        Ok(())
    }

    async fn fetch_feedback(&self, request: FetchRequest) -> Result<(), PushClientError> {
        self.ensure_running()?;
        let records: Vec<FeedbackRecord> = {
            let mut state = self.state();
            if let Some(reason) = &state.fetch_failure {
                return Err(PushClientError::FeedbackUnreachable(reason.clone()));
            }
            self.inner.fetches.fetch_add(1, Ordering::SeqCst);
            if self.inner.stall_feedback.load(Ordering::SeqCst) {
                return Ok(());
            }
            let take = request.limit.min(state.invalid_tokens.len());
            state.invalid_tokens.drain(..take).collect()
        };

        let session = request.session;
        let feedback = self.inner.channels.feedback.clone();
        let cancel = self.inner.cancel.clone();
        tokio::spawn(async move {
            let events = records
                .into_iter()
                .map(|record| FeedbackEvent::Record { session, record })
                .chain(std::iter::once(FeedbackEvent::EndOfBatch { session }));
            for event in events {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    res = feedback.send(event) => {
                        if res.is_err() {
                            debug!("APNSCLIENT|MEMORY|FEEDBACK|receiver dropped");
                            return;
                        }
                    }
                }
            }
        });
        Ok(())
    }

    async fn shutdown(&self) {
        self.inner.shutdowns.fetch_add(1, Ordering::SeqCst);
        if !self.inner.shut_down.swap(true, Ordering::SeqCst) {
            self.inner.cancel.cancel();
            info!("APNSCLIENT|MEMORY|SHUTDOWN|SUCC");
        }
    }
}
