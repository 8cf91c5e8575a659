use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Default capacity of the in-process event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the consumer is gone.
    /// Used after a commit, where the state change already happened.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "Dropping event");
        }
    }
}

/// Domain events published after a successful commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: Uuid,
        order_number: String,
        user_id: Uuid,
        total_price: Decimal,
    },
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    OrderCancelled(Uuid),
    VoucherRedeemed {
        voucher_id: Uuid,
        user_id: Uuid,
        order_id: Uuid,
    },
    ProductRatingUpdated {
        product_id: Uuid,
        rating: Decimal,
        review_count: i32,
    },
}

/// Consumer hook, e.g. for notification delivery
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&self, event: &Event) -> Result<(), String>;
}

/// Drains the channel, logging each event and fanning it out to `handlers`
pub async fn process_events(mut rx: mpsc::Receiver<Event>, handlers: Vec<Arc<dyn EventHandler>>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderCreated {
                order_id,
                order_number,
                user_id,
                total_price,
            } => info!(%order_id, %order_number, %user_id, %total_price, "Order created"),
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => info!(%order_id, %old_status, %new_status, "Order status changed"),
            Event::OrderCancelled(order_id) => info!(%order_id, "Order cancelled"),
            Event::VoucherRedeemed {
                voucher_id,
                user_id,
                order_id,
            } => info!(%voucher_id, %user_id, %order_id, "Voucher redeemed"),
            Event::ProductRatingUpdated {
                product_id,
                rating,
                review_count,
            } => info!(%product_id, %rating, review_count, "Product rating updated"),
        }

        for handler in &handlers {
            if let Err(e) = handler.handle_event(&event).await {
                error!(error = %e, ?event, "Event handler failed");
            }
        }
    }

    warn!("Event processing loop has ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder(Mutex<Vec<Event>>);

    #[async_trait]
    impl EventHandler for Recorder {
        async fn handle_event(&self, event: &Event) -> Result<(), String> {
            self.0.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn events_reach_registered_handlers() {
        let (tx, rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));

        let order_id = Uuid::new_v4();
        sender.send_or_log(Event::OrderCancelled(order_id)).await;
        drop(sender);

        process_events(rx, vec![recorder.clone() as Arc<dyn EventHandler>]).await;

        assert_eq!(
            recorder.0.lock().unwrap().as_slice(),
            &[Event::OrderCancelled(order_id)]
        );
    }

    #[tokio::test]
    async fn send_or_log_tolerates_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        EventSender::new(tx)
            .send_or_log(Event::OrderCancelled(Uuid::new_v4()))
            .await;
    }
}
