use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::Event;

const CHANNEL_CAPACITY: usize = 256;

/// Per-camera broadcast of committed events. A slow subscriber lags
/// (`RecvError::Lagged`) instead of blocking the engine.
#[derive(Default)]
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Event>>,
}

impl NotifyHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every event committed against `camera_id` from now on.
    /// Callers outside the crate go through `Engine::subscribe`, which checks the camera exists.
    pub(crate) fn subscribe(&self, camera_id: Ulid) -> broadcast::Receiver<Event> {
        self.channels
            .entry(camera_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// No-op when nobody subscribed to `camera_id`.
    pub fn send(&self, camera_id: Ulid, event: &Event) {
        if let Some(sender) = self.channels.get(&camera_id) {
            let _ = sender.send(event.clone());
        }
    }

    /// Drop the camera's channel. Subscribers see the stream close.
    pub fn remove(&self, camera_id: &Ulid) {
        self.channels.remove(camera_id);
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::{RecvError, TryRecvError};

    #[tokio::test]
    async fn subscriber_receives_only_its_camera() {
        let hub = NotifyHub::new();
        let watched = Ulid::new();
        let other = Ulid::new();
        let mut rx = hub.subscribe(watched);
        let _other_rx = hub.subscribe(other);

        hub.send(other, &Event::CameraDeleted { id: other });
        hub.send(watched, &Event::CameraDeleted { id: watched });

        assert_eq!(rx.recv().await.unwrap(), Event::CameraDeleted { id: watched });
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn send_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        let id = Ulid::new();
        hub.send(id, &Event::CameraDeleted { id });
        assert_eq!(hub.channel_count(), 0);
    }

    #[tokio::test]
    async fn remove_closes_stream() {
        let hub = NotifyHub::new();
        let id = Ulid::new();
        let mut rx = hub.subscribe(id);
        hub.remove(&id);
        assert!(matches!(rx.recv().await, Err(RecvError::Closed)));
    }
}
