use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::LifecycleEvent;

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for lifecycle events. Notification and payment consumers
/// subscribe per vehicle or to the firehose; delivery is at-least-once and
/// a lagging subscriber may miss events, so consumers de-duplicate by
/// `LifecycleEvent::dedup_key`. Publishing never fails the operation that
/// produced the event.
pub struct EventHub {
    per_vehicle: DashMap<Ulid, broadcast::Sender<LifecycleEvent>>,
    firehose: broadcast::Sender<LifecycleEvent>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub {
    pub fn new() -> Self {
        Self {
            per_vehicle: DashMap::new(),
            firehose: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    /// Subscribe to one vehicle's lifecycle events. Creates the channel if
    /// needed.
    pub fn subscribe(&self, vehicle_id: Ulid) -> broadcast::Receiver<LifecycleEvent> {
        let sender = self
            .per_vehicle
            .entry(vehicle_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Subscribe to every lifecycle event the engine emits.
    pub fn subscribe_all(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.firehose.subscribe()
    }

    /// Publish an event. No-op for channels nobody listens on.
    pub fn publish(&self, event: &LifecycleEvent) {
        if let Some(sender) = self.per_vehicle.get(&event.vehicle_id) {
            let _ = sender.send(event.clone());
        }
        let _ = self.firehose.send(event.clone());
    }
}
