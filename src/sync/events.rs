//! Typed publish/subscribe channel for cross-component signals
//!
//! Components receive an [`EventBus`] explicitly instead of listening for
//! ambient global events, so every publisher and subscriber is visible at
//! construction time.

use serde::Serialize;
use tokio::sync::broadcast;

use super::store::StudentId;

const DEFAULT_CAPACITY: usize = 64;

/// Severity of a user-visible notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Non-blocking message shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Health of the link to the plan store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ConnectionStatus {
    Connected,
    Reconnecting { attempt: u32 },
    Lost,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "event", content = "data")]
pub enum PlannerEvent {
    SelectionChanged(Option<StudentId>),
    Connection(ConnectionStatus),
    Notice(Notice),
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PlannerEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlannerEvent> {
        self.sender.subscribe()
    }

    /// Publishing with no subscribers is not an error
    pub fn publish(&self, event: PlannerEvent) {
        let _ = self.sender.send(event);
    }

    pub fn notice(&self, level: NoticeLevel, message: impl Into<String>) {
        self.publish(PlannerEvent::Notice(Notice {
            level,
            message: message.into(),
        }));
    }

    pub fn connection(&self, status: ConnectionStatus) {
        self.publish(PlannerEvent::Connection(status));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.notice(NoticeLevel::Warning, "could not save");
        bus.connection(ConnectionStatus::Lost);

        assert_eq!(
            rx.recv().await.unwrap(),
            PlannerEvent::Notice(Notice {
                level: NoticeLevel::Warning,
                message: "could not save".to_string(),
            })
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            PlannerEvent::Connection(ConnectionStatus::Lost)
        );
    }

    #[test]
    fn publishing_without_subscribers_is_silent() {
        let bus = EventBus::new(0);
        bus.notice(NoticeLevel::Info, "nobody listening");
    }
}
