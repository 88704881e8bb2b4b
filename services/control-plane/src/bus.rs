//! Fleet-wide event topic.
//!
//! Rebuild status and script output go to every connected observer.

use fleetdeck_events::ServerEvent;
use tokio::sync::broadcast;
use tracing::trace;

/// Buffered events per observer before it starts lagging.
const BUS_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ServerEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self { sender }
    }

    /// Send to every current subscriber. Having none is not an error.
    pub fn publish(&self, event: ServerEvent) {
        trace!(event = event.name(), container_id = event.container_id(), "Publishing");
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use fleetdeck_events::LogErrorPayload;

    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers_in_order() {
        let bus = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        for i in 0..3 {
            bus.publish(ServerEvent::LogError(LogErrorPayload {
                container_id: format!("c{i}"),
                error: "x".to_string(),
            }));
        }

        for rx in [&mut a, &mut b] {
            for i in 0..3 {
                assert_eq!(rx.recv().await.unwrap().container_id(), format!("c{i}"));
            }
        }
    }

    #[test]
    fn test_publish_without_subscribers() {
        EventBus::new().publish(ServerEvent::LogError(LogErrorPayload {
            container_id: "c".to_string(),
            error: "x".to_string(),
        }));
    }
}
