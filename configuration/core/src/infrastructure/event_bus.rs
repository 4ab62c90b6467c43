// Copyright (c) 2026 CodeVald Contributors
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for configuration events
//
// In-memory event streaming over tokio broadcast channels. Events are lost
// on restart; subscribers that fall behind by more than the channel
// capacity observe `EventBusError::Lagged`.

use crate::domain::configuration::ConfigurationId;
use crate::domain::events::ConfigurationEvent;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Event bus for publishing and subscribing to configuration events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<ConfigurationEvent>>,
}

impl EventBus {
    /// Capacity bounds how many events are buffered before the oldest are dropped
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    /// Publish to all current subscribers, returning how many received it
    pub fn publish(&self, event: ConfigurationEvent) -> usize {
        debug!("Publishing event: {:?}", event);

        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
        receiver_count
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to events for a single configuration
    pub fn subscribe_configuration(&self, configuration_id: ConfigurationId) -> ConfigurationEventReceiver {
        ConfigurationEventReceiver {
            receiver: self.sender.subscribe(),
            configuration_id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Receiver for all configuration events
pub struct EventReceiver {
    receiver: broadcast::Receiver<ConfigurationEvent>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Result<ConfigurationEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    pub fn try_recv(&mut self) -> Result<ConfigurationEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

/// Receiver filtered to one configuration identity
pub struct ConfigurationEventReceiver {
    receiver: broadcast::Receiver<ConfigurationEvent>,
    configuration_id: ConfigurationId,
}

impl ConfigurationEventReceiver {
    pub async fn recv(&mut self) -> Result<ConfigurationEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if event.configuration_id() == &self.configuration_id {
                return Ok(event);
            }
        }
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn deleted(id: &ConfigurationId) -> ConfigurationEvent {
        ConfigurationEvent::ConfigurationDeleted {
            configuration_id: id.clone(),
            deleted_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();
        let id = ConfigurationId::new();

        assert_eq!(event_bus.publish(deleted(&id)), 1);

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.configuration_id(), &id);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let event_bus = EventBus::new(10);
        assert_eq!(event_bus.publish(deleted(&ConfigurationId::new())), 0);
        assert_eq!(event_bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_configuration_filter() {
        let event_bus = EventBus::new(10);
        let wanted = ConfigurationId::new();
        let mut receiver = event_bus.subscribe_configuration(wanted.clone());

        event_bus.publish(deleted(&ConfigurationId::new()));
        event_bus.publish(deleted(&wanted));

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.configuration_id(), &wanted);
    }

    #[tokio::test]
    async fn test_lagged_receiver() {
        let event_bus = EventBus::new(2);
        let mut receiver = event_bus.subscribe();
        for _ in 0..5 {
            event_bus.publish(deleted(&ConfigurationId::new()));
        }
        assert!(matches!(receiver.try_recv(), Err(EventBusError::Lagged(3))));
    }

    #[test]
    fn test_try_recv_empty() {
        let event_bus = EventBus::default();
        let mut receiver = event_bus.subscribe();
        assert!(matches!(receiver.try_recv(), Err(EventBusError::Empty)));
    }
}
