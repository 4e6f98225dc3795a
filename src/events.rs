use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// Name used for the event on the wire.
pub const ORDER_CANCELLED: &str = "orderCancelled";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum OrderEvent {
    #[serde(rename_all = "camelCase")]
    OrderCancelled { order_id: String },
}

impl OrderEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OrderEvent::OrderCancelled { .. } => ORDER_CANCELLED,
        }
    }
}

/// Fan-out of order events to every live subscriber.
#[derive(Clone)]
pub struct EventHub {
    sender: broadcast::Sender<OrderEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        EventHub { sender }
    }

    /// Returns how many subscribers received the event.
    pub fn publish(&self, event: OrderEvent) -> usize {
        let delivered = self.sender.send(event.clone()).unwrap_or(0);
        debug!(event = event.name(), delivered, "published order event");
        delivered
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        EventHub::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let event = OrderEvent::OrderCancelled {
            order_id: "abc".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({"event": "orderCancelled", "orderId": "abc"})
        );
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let hub = EventHub::default();
        assert_eq!(
            hub.publish(OrderEvent::OrderCancelled {
                order_id: "early".to_string()
            }),
            0
        );
        let mut rx = hub.subscribe();
        let event = OrderEvent::OrderCancelled {
            order_id: "abc".to_string(),
        };
        assert_eq!(hub.publish(event.clone()), 1);
        assert_eq!(rx.recv().await.unwrap(), event);
    }
}
