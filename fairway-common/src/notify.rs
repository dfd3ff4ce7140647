//! Notification dispatch
//!
//! Roster operations describe the messages they want sent as
//! [`Notification`] values. Whether they are actually delivered is up to the
//! caller: the [`Dispatcher`] sends them through an [`SmsChannel`], which
//! may be a real provider or [`LogChannel`] in dry-run mode.
//!
//! Bulk sends never stop at the first failure. Each recipient succeeds or
//! fails on its own and the result is a [`DeliveryReport`].

use crate::{Error, Result};
use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// One outbound text message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Canonical recipient phone
    pub to: String,
    pub body: String,
}

impl Notification {
    pub fn new(to: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            body: body.into(),
        }
    }
}

/// A transport able to deliver one text message
#[async_trait]
pub trait SmsChannel: Send + Sync {
    /// Deliver `body` to `to`
    async fn send(&self, to: &str, body: &str) -> Result<()>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Dry-run channel: logs every message and reports success
#[derive(Debug, Default, Clone, Copy)]
pub struct LogChannel;

#[async_trait]
impl SmsChannel for LogChannel {
    async fn send(&self, to: &str, body: &str) -> Result<()> {
        info!("[dry-run] SMS to {}: {}", to, body.replace('\n', " | "));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "dry-run"
    }
}

/// In-memory channel that records deliveries
///
/// Numbers added with [`MemoryChannel::fail_for`] are rejected.
#[derive(Debug, Default)]
pub struct MemoryChannel {
    sent: Mutex<Vec<Notification>>,
    failing: Mutex<HashSet<String>>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make deliveries to `phone` fail
    pub fn fail_for(&self, phone: &str) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(phone.to_string());
    }

    /// Messages delivered so far
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Messages delivered to one phone
    pub fn sent_to(&self, phone: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|n| n.to == phone)
            .map(|n| n.body)
            .collect()
    }
}

#[async_trait]
impl SmsChannel for MemoryChannel {
    async fn send(&self, to: &str, body: &str) -> Result<()> {
        let failing = self
            .failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(to);
        if failing {
            return Err(Error::Delivery(format!("recipient {} rejected", to)));
        }

        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Notification::new(to, body));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// One recipient that could not be reached
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryFailure {
    pub to: String,
    pub error: String,
}

/// Outcome of a bulk send
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
    pub failures: Vec<DeliveryFailure>,
}

impl DeliveryReport {
    /// `sent to 12 (1 failed)`
    pub fn summary(&self) -> String {
        if self.failed == 0 {
            format!("sent to {}", self.sent)
        } else {
            format!("sent to {} ({} failed)", self.sent, self.failed)
        }
    }
}

/// Sends notifications through a channel with a per-message timeout
#[derive(Clone)]
pub struct Dispatcher {
    channel: Arc<dyn SmsChannel>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(channel: Arc<dyn SmsChannel>, timeout: Duration) -> Self {
        Self { channel, timeout }
    }

    /// Dispatcher that only logs
    pub fn dry_run() -> Self {
        Self::new(Arc::new(LogChannel), Duration::from_secs(1))
    }

    pub fn channel_name(&self) -> &'static str {
        self.channel.name()
    }

    /// Deliver one message
    pub async fn send_one(&self, notification: &Notification) -> Result<()> {
        debug!("Sending SMS to {} via {}", notification.to, self.channel.name());
        match tokio::time::timeout(
            self.timeout,
            self.channel.send(&notification.to, &notification.body),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::Delivery(format!(
                "timed out after {:?} sending to {}",
                self.timeout, notification.to
            ))),
        }
    }

    /// Deliver every message concurrently, collecting per-recipient results
    pub async fn send_bulk(&self, notifications: &[Notification]) -> DeliveryReport {
        let results = join_all(notifications.iter().map(|n| self.send_one(n))).await;

        let mut report = DeliveryReport::default();
        for (notification, result) in notifications.iter().zip(results) {
            match result {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    warn!("SMS to {} failed: {}", notification.to, e);
                    report.failed += 1;
                    report.failures.push(DeliveryFailure {
                        to: notification.to.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if !notifications.is_empty() {
            info!("Bulk send: {} sent, {} failed", report.sent, report.failed);
        }
        report
    }

    /// Send the same body to many recipients
    pub async fn broadcast(&self, recipients: &[String], body: &str) -> DeliveryReport {
        let notifications: Vec<Notification> = recipients
            .iter()
            .map(|to| Notification::new(to.as_str(), body))
            .collect();
        self.send_bulk(&notifications).await
    }
}
