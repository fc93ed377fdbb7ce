//! Event types for the MedFabric event system
//!
//! Events are emitted only after the write they describe has committed.
//! Observers (audit log, SSE clients) subscribe through [`EventBus`]; a slow
//! or absent observer never blocks or fails the write path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::db::models::Region;

/// MedFabric event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MedFabricEvent {
    /// A reviewer logged in
    SessionOpened {
        session_id: Uuid,
        doctor_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// A session was deactivated (logout)
    SessionClosed {
        session_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Per-slice evaluation committed
    ImageEvaluationRecorded {
        evaluation_id: i64,
        doctor_id: Uuid,
        session_id: Uuid,
        image_set_id: String,
        image_id: String,
        region: Region,
        timestamp: DateTime<Utc>,
    },

    /// Subject-level (low quality / irrelevant) verdict committed
    ImageSetEvaluationRecorded {
        evaluation_id: i64,
        doctor_id: Uuid,
        session_id: Uuid,
        image_set_id: String,
        is_low_quality: bool,
        is_irrelevant: bool,
        timestamp: DateTime<Utc>,
    },

    /// A reviewer withdrew one of their per-slice evaluations
    ImageEvaluationRetracted {
        evaluation_id: i64,
        doctor_id: Uuid,
        image_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Conflict scan committed
    ConflictScanCompleted {
        inserted: usize,
        reopened: usize,
        resolved: usize,
        flags_changed: usize,
        timestamp: DateTime<Utc>,
    },
}

impl MedFabricEvent {
    /// Event name used for SSE `event:` lines and log fields
    pub fn event_type(&self) -> &'static str {
        match self {
            MedFabricEvent::SessionOpened { .. } => "SessionOpened",
            MedFabricEvent::SessionClosed { .. } => "SessionClosed",
            MedFabricEvent::ImageEvaluationRecorded { .. } => "ImageEvaluationRecorded",
            MedFabricEvent::ImageSetEvaluationRecorded { .. } => "ImageSetEvaluationRecorded",
            MedFabricEvent::ImageEvaluationRetracted { .. } => "ImageEvaluationRetracted",
            MedFabricEvent::ConflictScanCompleted { .. } => "ConflictScanCompleted",
        }
    }
}

/// Broadcast channel for post-commit events
///
/// # Examples
///
/// ```
/// use medfabric_common::events::{EventBus, MedFabricEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(MedFabricEvent::SessionClosed {
///     session_id: uuid::Uuid::new_v4(),
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MedFabricEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered before lagging receivers
    /// start losing the oldest ones.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<MedFabricEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: MedFabricEvent,
    ) -> Result<usize, broadcast::error::SendError<MedFabricEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: MedFabricEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_fails_but_lossy_does_not_panic() {
        let bus = EventBus::new(10);
        let event = MedFabricEvent::SessionClosed {
            session_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        };
        assert!(bus.emit(event.clone()).is_err());
        bus.emit_lossy(event);
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit(MedFabricEvent::ConflictScanCompleted {
            inserted: 1,
            reopened: 0,
            resolved: 2,
            flags_changed: 1,
            timestamp: Utc::now(),
        })
        .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type(), "ConflictScanCompleted");
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = MedFabricEvent::ImageSetEvaluationRecorded {
            evaluation_id: 7,
            doctor_id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            image_set_id: "CT-001".to_string(),
            is_low_quality: true,
            is_irrelevant: false,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ImageSetEvaluationRecorded");
        assert_eq!(json["image_set_id"], "CT-001");
    }
}
