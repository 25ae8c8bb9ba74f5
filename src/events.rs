use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderEventKind {
    Inserted,
    Updated,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderEvent {
    pub order_id: Uuid,
    pub user_id: Option<Uuid>,
    pub kind: OrderEventKind,
    pub status: String,
}

/// In-process realtime channel for order changes. Services publish on
/// insert/update; list views subscribe and refetch on any matching event.
/// Lagging subscribers lose old events rather than block publishers.
#[derive(Clone)]
pub struct OrderEvents {
    tx: broadcast::Sender<OrderEvent>,
}

impl Default for OrderEvents {
    fn default() -> Self {
        Self::new(256)
    }
}

impl OrderEvents {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishing with no subscribers is not an error.
    pub fn publish(&self, event: OrderEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribe to all order events, or only to those belonging to one
    /// user when `user_filter` is set.
    pub fn subscribe(&self, user_filter: Option<Uuid>) -> OrderEventSubscription {
        OrderEventSubscription {
            rx: self.tx.subscribe(),
            user_filter,
        }
    }
}

pub struct OrderEventSubscription {
    rx: broadcast::Receiver<OrderEvent>,
    user_filter: Option<Uuid>,
}

impl OrderEventSubscription {
    /// Next matching event; `None` once the channel is closed. Skips
    /// events dropped by lag and events outside the user scope.
    pub async fn recv(&mut self) -> Option<OrderEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    if let Some(user_id) = self.user_filter {
                        if event.user_id != Some(user_id) {
                            continue;
                        }
                    }
                    return Some(event);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "order event subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(user_id: Option<Uuid>) -> OrderEvent {
        OrderEvent {
            order_id: Uuid::new_v4(),
            user_id,
            kind: OrderEventKind::Updated,
            status: "paid".to_string(),
        }
    }

    #[tokio::test]
    async fn scoped_subscription_skips_other_users() {
        let events = OrderEvents::default();
        let me = Uuid::new_v4();
        let mut sub = events.subscribe(Some(me));

        events.publish(event(Some(Uuid::new_v4())));
        events.publish(event(None));
        let mine = event(Some(me));
        events.publish(mine.clone());

        let received = sub.recv().await.expect("event");
        assert_eq!(received.order_id, mine.order_id);
    }

    #[tokio::test]
    async fn unscoped_subscription_sees_everything() {
        let events = OrderEvents::default();
        let mut sub = events.subscribe(None);

        let guest = event(None);
        events.publish(guest.clone());

        let received = sub.recv().await.expect("event");
        assert_eq!(received.order_id, guest.order_id);
        assert_eq!(received.kind, OrderEventKind::Updated);
    }
}
