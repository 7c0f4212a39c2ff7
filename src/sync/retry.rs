use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use super::events::{ConnectionStatus, EventBus};

/// How often a connectivity failure is retried before it is surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    #[serde(with = "millis")]
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            delay: Duration::ZERO,
        }
    }
}

/// Runs `op`, reconnecting after connectivity failures
///
/// Other errors are returned immediately. Status changes are published on
/// `events`; `Lost` only once the retries are used up.
pub async fn with_reconnect<T, F, Fut>(
    policy: RetryPolicy,
    events: &EventBus,
    mut op: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(attempt, "store connection recovered");
                    events.connection(ConnectionStatus::Connected);
                }
                return Ok(value);
            }
            Err(err) if err.is_connectivity() && attempt < policy.max_retries => {
                attempt += 1;
                tracing::warn!(attempt, %err, "store unreachable, retrying");
                events.connection(ConnectionStatus::Reconnecting { attempt });
                tokio::time::sleep(policy.delay).await;
            }
            Err(err) => {
                if err.is_connectivity() {
                    events.connection(ConnectionStatus::Lost);
                }
                return Err(err);
            }
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::events::PlannerEvent;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_connectivity_errors() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result = with_reconnect(RetryPolicy::default(), &bus, move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(StoreError::Connectivity("offline".to_string()))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            rx.recv().await.unwrap(),
            PlannerEvent::Connection(ConnectionStatus::Reconnecting { attempt: 1 })
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            PlannerEvent::Connection(ConnectionStatus::Reconnecting { attempt: 2 })
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            PlannerEvent::Connection(ConnectionStatus::Connected)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_and_reports_lost() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: Result<(), _> = with_reconnect(RetryPolicy::default(), &bus, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Connectivity("offline".to_string()))
        })
        .await;

        assert!(matches!(result, Err(StoreError::Connectivity(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            last = Some(event);
        }
        assert_eq!(last, Some(PlannerEvent::Connection(ConnectionStatus::Lost)));
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let bus = EventBus::default();
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: Result<(), _> = with_reconnect(RetryPolicy::default(), &bus, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Permission("row level security".to_string()))
        })
        .await;

        assert!(matches!(result, Err(StoreError::Permission(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
