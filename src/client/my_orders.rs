use super::service::{OrderService, ServiceError};
use super::session::Session;
use super::view::{can_rate, OrderView};
use crate::events::OrderEvent;
use crate::infra::mongo::Order;
use mongodb::bson::DateTime;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

pub const TICK: Duration = Duration::from_secs(1);

/// What the rendering layer receives on each tick.
#[derive(Debug)]
pub struct Frame<'a> {
    pub views: &'a [OrderView],
    pub notice: Option<&'a str>,
}

/// The "my orders" list for the logged-in user.
pub struct MyOrders<'s, S> {
    session: &'s Session,
    service: S,
    orders: Vec<Order>,
    notice: Option<String>,
}

impl<'s, S: OrderService> MyOrders<'s, S> {
    pub fn new(session: &'s Session, service: S) -> Self {
        MyOrders {
            session,
            service,
            orders: Vec::new(),
            notice: None,
        }
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn views(&self, now: DateTime) -> Vec<OrderView> {
        let viewer = self.session.user_id();
        self.orders
            .iter()
            .map(|order| OrderView::build(order, viewer.as_deref(), now, &self.session.currency))
            .collect()
    }

    /// Replaces the list with the service's copy. Without a token nothing is
    /// fetched; on failure the last good list stays.
    pub async fn reload(&mut self) -> Result<(), ServiceError> {
        let session = self.session;
        let Some(token) = session.token() else {
            return Ok(());
        };
        match self.service.list_orders_for_user(token).await {
            Ok(orders) => {
                self.orders = orders;
                Ok(())
            }
            Err(e) => Err(self.surface(e)),
        }
    }

    pub async fn request_cancel(&mut self, order_id: &str) -> Result<(), ServiceError> {
        let session = self.session;
        let token = session.token().ok_or(ServiceError::Unauthenticated)?;
        match self.service.cancel_order(token, order_id).await {
            Ok(()) => {
                info!(order_id, "order cancelled, reloading");
                self.reload().await
            }
            Err(e) => Err(self.surface(e)),
        }
    }

    /// Rates a delivered, unrated order and swaps in the returned record.
    pub async fn request_rating(
        &mut self,
        order_id: &str,
        rating: u8,
        feedback: Option<String>,
    ) -> Result<(), ServiceError> {
        let session = self.session;
        let token = session.token().ok_or(ServiceError::Unauthenticated)?;
        let rateable = self
            .orders
            .iter()
            .any(|order| order.id_hex() == order_id && can_rate(order));
        if !rateable {
            return Err(self.surface(ServiceError::Rejected(
                "only delivered orders can be rated, once".to_string(),
            )));
        }
        match self
            .service
            .rate_order(token, order_id, rating, feedback)
            .await
        {
            Ok(updated) => {
                if let Some(slot) = self.orders.iter_mut().find(|o| o.id == updated.id) {
                    *slot = updated;
                }
                Ok(())
            }
            Err(e) => Err(self.surface(e)),
        }
    }

    /// Ticks the progress display once a second and reloads on every
    /// cancellation event until `render` breaks. The subscription ends with
    /// this call.
    pub async fn run<F>(&mut self, mut events: broadcast::Receiver<OrderEvent>, mut render: F)
    where
        F: FnMut(Frame<'_>) -> ControlFlow<()>,
    {
        let _ = self.reload().await;
        let mut tick = tokio::time::interval(TICK);
        let mut listening = true;
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let views = self.views(DateTime::now());
                    let notice = self.notice.take();
                    let frame = Frame {
                        views: &views,
                        notice: notice.as_deref(),
                    };
                    if render(frame).is_break() {
                        break;
                    }
                }
                event = events.recv(), if listening => match event {
                    Ok(OrderEvent::OrderCancelled { order_id }) => {
                        info!(%order_id, "order cancelled elsewhere, reloading");
                        let _ = self.reload().await;
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "order events lagged, reloading");
                        let _ = self.reload().await;
                    }
                    Err(RecvError::Closed) => listening = false,
                },
            }
        }
    }

    fn surface(&mut self, err: ServiceError) -> ServiceError {
        warn!(error = %err, "order service call failed");
        self.notice = Some(match &err {
            ServiceError::Rejected(message) => message.clone(),
            ServiceError::Unauthenticated => "Please log in again".to_string(),
            ServiceError::Http(_) => "Error contacting the order service".to_string(),
        });
        err
    }
}
