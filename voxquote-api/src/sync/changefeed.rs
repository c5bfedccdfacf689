use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    IntakeUpdated,
    JobUpdated,
}

/// A single push notification. Carries only the record id; receivers
/// re-read the row, so a lagged or dropped event costs a poll cycle,
/// never correctness.
#[derive(Debug, Clone, Copy)]
pub struct ChangeEvent {
    pub record_id: Uuid,
    pub kind: ChangeKind,
}

/// In-process broadcast channel for intake and job mutations. Writers
/// publish after every persisted change; observers subscribe for the
/// push half of their dual-channel loop.
#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// Publish a change. No receivers is not an error; the feed is a
    /// hint layered over polling.
    pub fn publish(&self, record_id: Uuid, kind: ChangeKind) {
        let _ = self.sender.send(ChangeEvent { record_id, kind });
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_without_receivers_does_not_panic() {
        let feed = ChangeFeed::default();
        feed.publish(Uuid::new_v4(), ChangeKind::IntakeUpdated);
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let feed = ChangeFeed::default();
        let mut rx = feed.subscribe();

        let id = Uuid::new_v4();
        feed.publish(id, ChangeKind::JobUpdated);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.record_id, id);
        assert_eq!(event.kind, ChangeKind::JobUpdated);
    }
}
