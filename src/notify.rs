//! Change notifications
//!
//! Tier and global-precision changes are reported to an optional sink.
//! Delivery is fire-and-forget: a sink that drops events never affects the
//! caller.

use crate::system::PerformanceTier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;

/// What changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Performance tier changed
    TierChanged {
        /// New tier
        tier: PerformanceTier,
    },
    /// Global precision level changed
    PrecisionChanged {
        /// New level
        level: u8,
    },
}

/// A timestamped change event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningEvent {
    /// Event payload
    #[serde(flatten)]
    pub kind: EventKind,
    /// When the change was applied
    pub timestamp: DateTime<Utc>,
}

impl TuningEvent {
    /// Tier change stamped now
    pub fn tier_changed(tier: PerformanceTier) -> Self {
        Self {
            kind: EventKind::TierChanged { tier },
            timestamp: Utc::now(),
        }
    }

    /// Precision change stamped now
    pub fn precision_changed(level: u8) -> Self {
        Self {
            kind: EventKind::PrecisionChanged { level },
            timestamp: Utc::now(),
        }
    }
}

/// Receiver of change events
pub trait NotificationSink: Send + Sync {
    /// Deliver one event; must not block or fail the caller
    fn notify(&self, event: &TuningEvent);
}

/// Sink that logs every event through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, event: &TuningEvent) {
        match event.kind {
            EventKind::TierChanged { tier } => {
                info!(target: "perftier::events", at = %event.timestamp, "tier changed to {}", tier)
            }
            EventKind::PrecisionChanged { level } => {
                info!(target: "perftier::events", at = %event.timestamp, "precision changed to {}", level)
            }
        }
    }
}

/// Sink that forwards events into a tokio channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<TuningEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiving half
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TuningEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, event: &TuningEvent) {
        // Receiver gone: nobody is listening, drop it
        let _ = self.tx.send(event.clone());
    }
}
