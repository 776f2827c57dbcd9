use tokio::sync::broadcast;
use uuid::Uuid;

/// Domain events crossing component boundaries inside the core.
///
/// The decision engine announces matches, the safety desk announces blocks,
/// and any component that hits a 401 announces session expiry so every
/// synchronizer can stop.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    MatchCreated { partner_id: Uuid },
    QuotaExhausted,
    MessageSent { match_id: Uuid, message_id: Uuid },
    UserBlocked { user_id: Uuid },
    UserUnblocked { user_id: Uuid },
    SessionExpired,
}

/// In-process broadcast bus for [`CoreEvent`].
///
/// Publishing never blocks and never fails: with no live subscriber the
/// event is simply dropped.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: CoreEvent) {
        tracing::debug!(event = ?event, "core event");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_reach_subscribers() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        let partner = Uuid::new_v4();
        bus.publish(CoreEvent::MatchCreated { partner_id: partner });

        assert_eq!(
            rx.recv().await.unwrap(),
            CoreEvent::MatchCreated { partner_id: partner }
        );
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let bus = EventBus::default();
        bus.publish(CoreEvent::SessionExpired);
    }
}
