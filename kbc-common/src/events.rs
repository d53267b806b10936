//! Event types for the dashboard event system
//!
//! Provides the shared dashboard vocabulary (session phases, notification
//! statuses) and the EventBus that view layers subscribe to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Pipeline session phase
///
/// `Idle → Uploading → Extracting → Ready → Training → Evaluating → Displaying`,
/// with any in-flight stage able to fall into `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionPhase {
    /// Nothing selected yet
    Idle,
    /// Ontology file upload in flight
    Uploading,
    /// Structural statistics extraction in flight
    Extracting,
    /// Ontology known, no evaluation shown
    Ready,
    /// Embedding training in flight
    Training,
    /// Link-prediction evaluation in flight
    Evaluating,
    /// Evaluation result on screen
    Displaying,
    /// Last stage failed; user must re-trigger
    Failed,
}

impl SessionPhase {
    /// Only Ready and Displaying may fire the evaluation stats query on their own
    pub fn allows_autonomous_query(self) -> bool {
        matches!(self, SessionPhase::Ready | SessionPhase::Displaying)
    }

    /// A pipeline stage call is outstanding
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            SessionPhase::Uploading
                | SessionPhase::Extracting
                | SessionPhase::Training
                | SessionPhase::Evaluating
        )
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionPhase::Idle => "IDLE",
            SessionPhase::Uploading => "UPLOADING",
            SessionPhase::Extracting => "EXTRACTING",
            SessionPhase::Ready => "READY",
            SessionPhase::Training => "TRAINING",
            SessionPhase::Evaluating => "EVALUATING",
            SessionPhase::Displaying => "DISPLAYING",
            SessionPhase::Failed => "FAILED",
        };
        write!(f, "{}", name)
    }
}

/// Notification status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Waiting,
    Success,
    Error,
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationStatus::Waiting => write!(f, "waiting"),
            NotificationStatus::Success => write!(f, "success"),
            NotificationStatus::Error => write!(f, "error"),
        }
    }
}

/// Dashboard event types
///
/// Observational only: the notification feed held by the orchestrator is
/// the authoritative history, these events just tell subscribers to re-read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DashboardEvent {
    /// A notification was appended to the feed
    NotificationAppended {
        sequence: u64,
        message: String,
        status: NotificationStatus,
        timestamp: DateTime<Utc>,
    },

    /// Session phase transition
    PhaseChanged {
        old_phase: SessionPhase,
        new_phase: SessionPhase,
        timestamp: DateTime<Utc>,
    },

    /// Ontology/algorithm/classifier selection changed
    SelectionChanged {
        ontology: Option<String>,
        algorithm: Option<String>,
        classifier: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Display state moved to a new version
    DisplayUpdated {
        version: u64,
        timestamp: DateTime<Utc>,
    },

    /// Known ontology list refreshed from the backend
    OntologyListUpdated {
        ontologies: Vec<String>,
        timestamp: DateTime<Utc>,
    },
}

impl DashboardEvent {
    /// Variant name, used as the SSE event type
    pub fn event_type(&self) -> &'static str {
        match self {
            DashboardEvent::NotificationAppended { .. } => "NotificationAppended",
            DashboardEvent::PhaseChanged { .. } => "PhaseChanged",
            DashboardEvent::SelectionChanged { .. } => "SelectionChanged",
            DashboardEvent::DisplayUpdated { .. } => "DisplayUpdated",
            DashboardEvent::OntologyListUpdated { .. } => "OntologyListUpdated",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus for dashboard events
///
/// Uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block the orchestrator)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use kbc_common::events::{DashboardEvent, EventBus};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(DashboardEvent::DisplayUpdated {
///     version: 1,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DashboardEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: DashboardEvent,
    ) -> Result<usize, broadcast::error::SendError<DashboardEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: DashboardEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::trace!("No subscribers for dashboard event {}", e.0.event_type());
        }
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_autonomous_query_phases() {
        assert!(SessionPhase::Ready.allows_autonomous_query());
        assert!(SessionPhase::Displaying.allows_autonomous_query());

        for phase in [
            SessionPhase::Idle,
            SessionPhase::Uploading,
            SessionPhase::Extracting,
            SessionPhase::Training,
            SessionPhase::Evaluating,
            SessionPhase::Failed,
        ] {
            assert!(!phase.allows_autonomous_query(), "{} must not query", phase);
        }
    }

    #[test]
    fn test_busy_phases() {
        assert!(SessionPhase::Uploading.is_busy());
        assert!(SessionPhase::Evaluating.is_busy());
        assert!(!SessionPhase::Ready.is_busy());
        assert!(!SessionPhase::Failed.is_busy());
    }

    #[test]
    fn test_notification_status_serialization() {
        let json = serde_json::to_string(&NotificationStatus::Waiting).unwrap();
        assert_eq!(json, "\"waiting\"");
    }

    #[test]
    fn test_event_serialization_tagged() {
        let event = DashboardEvent::PhaseChanged {
            old_phase: SessionPhase::Ready,
            new_phase: SessionPhase::Training,
            timestamp: Utc::now(),
        };

        assert_eq!(event.event_type(), "PhaseChanged");

        let json = serde_json::to_string(&event).expect("Event serialization should succeed");
        assert!(json.contains("\"type\":\"PhaseChanged\""));
        assert!(json.contains("\"new_phase\":\"TRAINING\""));

        let back: DashboardEvent = serde_json::from_str(&json).unwrap();
        match back {
            DashboardEvent::PhaseChanged { old_phase, new_phase, .. } => {
                assert_eq!(old_phase, SessionPhase::Ready);
                assert_eq!(new_phase, SessionPhase::Training);
            }
            _ => panic!("Wrong event type deserialized"),
        }
    }

    #[tokio::test]
    async fn test_event_bus_delivers_to_subscribers() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let delivered = bus
            .emit(DashboardEvent::DisplayUpdated {
                version: 7,
                timestamp: Utc::now(),
            })
            .unwrap();
        assert_eq!(delivered, 1);

        match rx.recv().await.unwrap() {
            DashboardEvent::DisplayUpdated { version, .. } => assert_eq!(version, 7),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus
            .emit(DashboardEvent::DisplayUpdated {
                version: 1,
                timestamp: Utc::now(),
            })
            .is_err());

        // Lossy emit must not panic
        bus.emit_lossy(DashboardEvent::DisplayUpdated {
            version: 2,
            timestamp: Utc::now(),
        });
    }
}
