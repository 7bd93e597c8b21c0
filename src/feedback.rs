//! Blocking collection of feedback records from the asynchronous feedback stream.
//!
//! Each request opens a [`FetchSession`] and holds the feedback receiver for
//! the whole drain, so concurrent requests are served one after another and
//! never see each other's records. Events left over from an earlier session
//! (one that timed out, or asked for fewer records than the client wrote
//! before its end-of-batch marker) are discarded by session id.

use std::{sync::Arc, time::Duration};

use apns::{FeedbackEvent, FeedbackRecord, FetchRequest, FetchSession, PushClient};
use log::{debug, info, warn};
use tokio::{
    sync::{mpsc, Mutex},
    time::{self, Instant},
};
use tokio_util::sync::CancellationToken;

use crate::error::FeedbackError;

/// Largest batch a single feedback request may ask for.
pub const MAX_FEEDBACK_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackBatch {
    /// Records in the order the push client produced them.
    pub records: Vec<FeedbackRecord>,
    /// `false` when the deadline or shutdown cut the drain short.
    pub complete: bool,
}

impl FeedbackBatch {
    fn complete(records: Vec<FeedbackRecord>) -> Self {
        Self {
            records,
            complete: true,
        }
    }

    fn incomplete(records: Vec<FeedbackRecord>) -> Self {
        Self {
            records,
            complete: false,
        }
    }
}

pub struct FeedbackCollector {
    client: Arc<dyn PushClient>,
    events: Mutex<mpsc::Receiver<FeedbackEvent>>,
    timeout: Duration,
    cancel: CancellationToken,
}

impl FeedbackCollector {
    pub fn new(
        client: Arc<dyn PushClient>,
        events: mpsc::Receiver<FeedbackEvent>,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            events: Mutex::new(events),
            timeout,
            cancel,
        }
    }

    /// Fetch and wait for up to `limit` records.
    ///
    /// Over-limit requests fail before the client or the channel are touched.
    /// A failed fetch returns without draining.
    pub async fn collect(&self, limit: usize) -> Result<FeedbackBatch, FeedbackError> {
        if limit > MAX_FEEDBACK_LIMIT {
            return Err(FeedbackError::OverLimit(limit));
        }
        let deadline = Instant::now() + self.timeout;

        let mut events = tokio::select! {
            events = self.events.lock() => events,
            _ = time::sleep_until(deadline) => {
                warn!("APNSHTTPSERVER|FEEDBACK|BUSY|channel still held by another fetch");
                return Ok(FeedbackBatch::incomplete(Vec::new()));
            }
            _ = self.cancel.cancelled() => return Ok(FeedbackBatch::incomplete(Vec::new())),
        };

        let session = FetchSession::new();
        self.client
            .fetch_feedback(FetchRequest { session, limit })
            .await?;
        debug!("APNSHTTPSERVER|FEEDBACK|FETCH|session={session} limit={limit}");

        let batch = self.drain(&mut events, session, limit, deadline).await;
        info!(
            "APNSHTTPSERVER|FEEDBACK|DRAINED|session={session} records={} complete={}",
            batch.records.len(),
            batch.complete
        );
        Ok(batch)
    }

    async fn drain(
        &self,
        events: &mut mpsc::Receiver<FeedbackEvent>,
        session: FetchSession,
        limit: usize,
        deadline: Instant,
    ) -> FeedbackBatch {
        let mut records = Vec::with_capacity(limit);
        while records.len() < limit {
            let event = tokio::select! {
                event = events.recv() => event,
                _ = time::sleep_until(deadline) => {
                    warn!("APNSHTTPSERVER|FEEDBACK|TIMEOUT|session={session} got {}/{limit}", records.len());
                    return FeedbackBatch::incomplete(records);
                }
                _ = self.cancel.cancelled() => return FeedbackBatch::incomplete(records),
            };
            match event {
                None => {
                    warn!("APNSHTTPSERVER|FEEDBACK|CLOSED|session={session}");
                    break;
                }
                Some(FeedbackEvent::Record { session: stale, record }) if stale != session => {
                    warn!(
                        "APNSHTTPSERVER|FEEDBACK|STALE|dropping record from session {stale} token={} time={}",
                        record.token, record.time
                    );
                }
                Some(FeedbackEvent::EndOfBatch { session: stale }) if stale != session => {
                    debug!("APNSHTTPSERVER|FEEDBACK|STALE|dropping end of batch from session {stale}");
                }
                Some(FeedbackEvent::Record { record, .. }) => records.push(record),
                Some(FeedbackEvent::EndOfBatch { .. }) => break,
            }
        }
        FeedbackBatch::complete(records)
    }
}
