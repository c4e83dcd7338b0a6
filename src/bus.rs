//! Typed event bus.
//!
//! Producers (API handlers, notifier, file watcher) publish scoped events;
//! the push layer is one subscriber among possibly many. A single broadcast
//! channel carries everything, so per-room publish order is exactly delivery
//! order for every subscriber that keeps up. A lagging subscriber loses
//! events (at-most-once); clients recover via `history`.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::model::{Message, Notification, Task};

/// Size of the hub-wide broadcast channel.
const EVENT_BUFFER_SIZE: usize = 256;

/// Who an event is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventScope {
    /// Every session registered to the room.
    Room(String),
    /// Only sessions bound to the agent.
    Agent(String),
}

/// Task change discriminator carried inside `task` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskChange {
    Created,
    Updated,
}

/// Payload of a `task` event.
#[derive(Debug, Clone, Serialize)]
pub struct TaskEvent {
    #[serde(rename = "type")]
    pub change: TaskChange,
    pub task: Task,
}

/// Events fanned out to push sessions. Serialization doubles as the wire
/// frame: `{"event": "<name>", "data": {...}}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum HubEvent {
    Message(Message),
    Task(TaskEvent),
    Notification(Notification),
}

/// One published occurrence.
#[derive(Debug, Clone)]
pub struct BusEvent {
    pub scope: EventScope,
    pub event: HubEvent,
}

/// Hub-wide pub/sub.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BusEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        Self { tx }
    }

    /// Publish an event. Delivery is best-effort; having no subscribers is
    /// not an error.
    pub fn publish(&self, scope: EventScope, event: HubEvent) {
        let _ = self.tx.send(BusEvent { scope, event });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Message;

    #[tokio::test]
    async fn publish_reaches_subscriber_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        for i in 0..3 {
            let msg = Message::system("lab", format!("m{}", i));
            bus.publish(EventScope::Room("lab".into()), HubEvent::Message(msg));
        }

        for i in 0..3 {
            let got = rx.recv().await.unwrap();
            match got.event {
                HubEvent::Message(m) => assert_eq!(m.content, format!("m{}", i)),
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[test]
    fn publish_without_subscribers_is_a_noop() {
        let bus = EventBus::new();
        bus.publish(
            EventScope::Agent("a1".into()),
            HubEvent::Message(Message::system("lab", "x".into())),
        );
    }

    #[test]
    fn events_serialize_to_wire_frames() {
        let msg = Message::system("lab", "hello".into());
        let json = serde_json::to_value(HubEvent::Message(msg)).unwrap();
        assert_eq!(json["event"], "message");
        assert_eq!(json["data"]["room"], "lab");
    }
}
