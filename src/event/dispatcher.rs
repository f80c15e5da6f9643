use futures::future::{join_all, FutureExt};
use futures::stream::StreamExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument};

use super::events::Event;
use crate::connection::SendOutcome;
use crate::execution::SingleEventSource;
use crate::shared::{FanoutError, ServerContext};
use crate::subscription::Subscriber;
use crate::websockets::ServerMessage;

/// A failure contained inside one dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchFailure {
    pub event: String,
    /// Absent when the subscriber lookup itself failed
    pub connection_id: Option<String>,
    pub operation_id: Option<String>,
    pub error: FanoutError,
}

/// Sink for contained failures; the only place operators see them
pub type OnError = Arc<dyn Fn(&DispatchFailure) + Send + Sync>;

/// Settled outcome of one dispatch call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub event: String,
    pub delivered: usize,
    pub skipped: usize,
    pub failed: usize,
}

enum BranchOutcome {
    Delivered,
    Skipped,
    Failed,
}

/// Turns one inbound event into zero or more deliveries
///
/// - Looks up the event's subscribers
/// - Runs every subscriber's resolve/filter/send branch concurrently
/// - Routes each branch failure to `on_error` without touching its siblings
///
/// `dispatch` never fails: a retrying caller would otherwise re-send to the
/// subscribers that already succeeded. Failures are reported, not retried.
pub struct EventDispatcher {
    on_error: OnError,
    branch_timeout: Option<Duration>,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDispatcher {
    /// Create a dispatcher that logs failures
    pub fn new() -> Self {
        Self {
            on_error: Arc::new(log_failure),
            branch_timeout: None,
        }
    }

    pub fn with_on_error(mut self, on_error: OnError) -> Self {
        self.on_error = on_error;
        self
    }

    /// Settle any branch still running after `limit` as an execution failure
    pub fn with_branch_timeout(mut self, limit: Duration) -> Self {
        self.branch_timeout = Some(limit);
        self
    }

    #[instrument(skip(self, event, server), fields(event = %event.name))]
    pub async fn dispatch(&self, event: &Event, server: &ServerContext) -> DispatchReport {
        let mut report = DispatchReport {
            event: event.name.clone(),
            ..DispatchReport::default()
        };

        let mut pages = server.index.subscribers_by_event(event);
        while let Some(page) = pages.next().await {
            let subscribers = match page {
                Ok(subscribers) => subscribers,
                Err(error) => {
                    report.failed += 1;
                    self.report(DispatchFailure {
                        event: event.name.clone(),
                        connection_id: None,
                        operation_id: None,
                        error,
                    });
                    continue;
                }
            };

            debug!(subscribers = subscribers.len(), "Fanning out");

            let branches = subscribers
                .into_iter()
                .map(|subscriber| self.run_branch(event, subscriber, server));

            for outcome in join_all(branches).await {
                match outcome {
                    BranchOutcome::Delivered => report.delivered += 1,
                    BranchOutcome::Skipped => report.skipped += 1,
                    BranchOutcome::Failed => report.failed += 1,
                }
            }
        }

        info!(
            delivered = report.delivered,
            skipped = report.skipped,
            failed = report.failed,
            "Dispatch settled"
        );

        report
    }

    /// Run one subscriber's branch to a settled outcome
    async fn run_branch(
        &self,
        event: &Event,
        subscriber: Subscriber,
        server: &ServerContext,
    ) -> BranchOutcome {
        let attempt = AssertUnwindSafe(deliver(event, &subscriber, server)).catch_unwind();

        let settled = match self.branch_timeout {
            Some(limit) => match timeout(limit, attempt).await {
                Ok(settled) => settled,
                Err(_) => Ok(Err(FanoutError::execution(format!(
                    "branch timed out after {}ms",
                    limit.as_millis()
                )))),
            },
            None => attempt.await,
        };

        let result = settled
            .unwrap_or_else(|_| Err(FanoutError::execution("subscriber branch panicked")));

        match result {
            Ok(true) => BranchOutcome::Delivered,
            Ok(false) => BranchOutcome::Skipped,
            Err(error) => {
                self.report(DispatchFailure {
                    event: event.name.clone(),
                    connection_id: Some(subscriber.connection.id.clone()),
                    operation_id: Some(subscriber.operation_id.clone()),
                    error,
                });
                BranchOutcome::Failed
            }
        }
    }

    fn report(&self, failure: DispatchFailure) {
        (self.on_error)(&failure);
    }
}

/// Execute, filter and send for one subscriber; `Ok(false)` when nothing was produced
/// or the connection turned out stale
async fn deliver(
    event: &Event,
    subscriber: &Subscriber,
    server: &ServerContext,
) -> Result<bool, FanoutError> {
    let source = SingleEventSource::new(event.clone());
    let mut results = server
        .engine
        .execute(&subscriber.operation, &subscriber.connection, source)
        .await?;

    let Some(result) = results.next().await else {
        return Ok(false);
    };

    let message = ServerMessage::data(subscriber.operation_id.clone(), result?);
    match server.registry.send(&subscriber.connection, &message).await? {
        SendOutcome::Delivered => Ok(true),
        SendOutcome::Pruned => {
            server
                .index
                .unsubscribe_all_by_connection_id(&subscriber.connection.id)
                .await?;
            debug!(connection_id = %subscriber.connection.id, "Dropped subscriptions of stale connection");
            Ok(false)
        }
    }
}

fn log_failure(failure: &DispatchFailure) {
    error!(
        event = %failure.event,
        connection_id = ?failure.connection_id,
        operation_id = ?failure.operation_id,
        error = %failure.error,
        "Subscriber delivery failed"
    );
}
