//! Mention-driven notification fanout.

use std::collections::HashSet;

use crate::bus::{EventBus, EventScope, HubEvent};
use crate::hub::HubState;
use crate::model::{now_ts, Message, Notification};
use crate::store::NotificationRepository;

/// Notification text carries at most this much of the triggering content.
const PREVIEW_CHARS: usize = 100;

/// Creates, persists, and pushes notifications for mentions.
#[derive(Debug, Clone)]
pub struct Notifier {
    repo: NotificationRepository,
    bus: EventBus,
}

impl Notifier {
    pub fn new(repo: NotificationRepository, bus: EventBus) -> Self {
        Self { repo, bus }
    }

    /// Fan a just-persisted message's mentions out as notifications.
    ///
    /// Names that resolve to no known agent are dropped silently; a
    /// recipient mentioned several times in one message gets one
    /// notification. Each row is persisted before it is pushed. A failed
    /// persist is logged and that recipient skipped; the message itself
    /// already stands.
    pub async fn fan_out(&self, msg: &Message, state: &HubState) -> Vec<Notification> {
        let mut notified: HashSet<String> = HashSet::new();
        let mut created = Vec::new();

        for name in &msg.mentions {
            let Some(agent) = state.agent_by_name(name).await else {
                continue;
            };
            if !notified.insert(agent.id.clone()) {
                continue;
            }

            let notification = Notification {
                id: uuid::Uuid::new_v4().to_string(),
                agent_id: agent.id.clone(),
                room: msg.room.clone(),
                message: format!(
                    "{} mentioned you: {}",
                    msg.agent_name,
                    preview(&msg.content)
                ),
                notification_type: "mention".to_string(),
                is_read: false,
                created_at: now_ts(),
            };

            if let Err(e) = self.repo.insert(&notification).await {
                tracing::error!(
                    agent = %agent.id,
                    room = %msg.room,
                    "failed to persist notification: {:#}",
                    e
                );
                continue;
            }

            self.bus.publish(
                EventScope::Agent(agent.id.clone()),
                HubEvent::Notification(notification.clone()),
            );
            created.push(notification);
        }

        created
    }
}

fn preview(content: &str) -> String {
    content.chars().take(PREVIEW_CHARS).collect()
}
