use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;

/// Changement observé dans le cache de découverte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    DeviceAppeared { udn: String, location: String },
    /// Nouvelle LOCATION, redémarrage (BOOTID) ou description chargée
    DeviceUpdated { udn: String, location: String },
    DeviceGone { udn: String },
}

impl DiscoveryEvent {
    pub fn udn(&self) -> &str {
        match self {
            DiscoveryEvent::DeviceAppeared { udn, .. }
            | DiscoveryEvent::DeviceUpdated { udn, .. }
            | DiscoveryEvent::DeviceGone { udn } => udn,
        }
    }
}

#[derive(Clone, Default)]
pub struct DiscoveryEventBus {
    subscribers: Arc<Mutex<Vec<Sender<DiscoveryEvent>>>>,
}

impl DiscoveryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<DiscoveryEvent> {
        let (tx, rx) = unbounded::<DiscoveryEvent>();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Les abonnés dont le récepteur a été lâché sont retirés au passage.
    pub fn broadcast(&self, event: DiscoveryEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_drops_closed_receivers() {
        let bus = DiscoveryEventBus::new();
        let rx1 = bus.subscribe();
        let rx2 = bus.subscribe();
        drop(rx2);

        bus.broadcast(DiscoveryEvent::DeviceGone { udn: "a".into() });
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(rx1.try_recv().unwrap().udn(), "a");
    }
}
