use crate::infra::auth::TOKEN_HEADER;
use crate::infra::mongo::Order;
use crate::infra::routes::{ApiResponse, OrderIdBody, RateBody};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("not logged in")]
    Unauthenticated,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Rejected(String),
}

/// Remote side of the order list. Conflict handling and idempotency belong to
/// the implementation, not to callers.
#[async_trait]
pub trait OrderService: Send + Sync {
    async fn list_orders_for_user(&self, token: &str) -> Result<Vec<Order>, ServiceError>;

    async fn cancel_order(&self, token: &str, order_id: &str) -> Result<(), ServiceError>;

    async fn rate_order(
        &self,
        token: &str,
        order_id: &str,
        rating: u8,
        feedback: Option<String>,
    ) -> Result<Order, ServiceError>;
}

pub struct HttpOrderService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOrderService {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpOrderService {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn post<B, T>(&self, path: &str, token: &str, body: &B) -> Result<T, ServiceError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "order service request");
        let response = self
            .client
            .post(&url)
            .header(TOKEN_HEADER, token)
            .json(body)
            .send()
            .await?;
        let status = response.status();
        match response.json::<ApiResponse<T>>().await {
            Ok(reply) => unwrap_reply(reply),
            Err(_) if !status.is_success() => {
                Err(ServiceError::Rejected(format!("server returned {status}")))
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn unwrap_reply<T>(reply: ApiResponse<T>) -> Result<T, ServiceError> {
    match reply {
        ApiResponse {
            success: true,
            data: Some(data),
            ..
        } => Ok(data),
        ApiResponse { message, .. } => Err(ServiceError::Rejected(
            message.unwrap_or_else(|| "request failed".to_string()),
        )),
    }
}

#[async_trait]
impl OrderService for HttpOrderService {
    async fn list_orders_for_user(&self, token: &str) -> Result<Vec<Order>, ServiceError> {
        self.post("/api/order/userorders", token, &serde_json::json!({}))
            .await
    }

    async fn cancel_order(&self, token: &str, order_id: &str) -> Result<(), ServiceError> {
        let body = OrderIdBody {
            order_id: order_id.to_string(),
        };
        self.post::<_, Order>("/api/order/cancel_order", token, &body)
            .await
            .map(|_| ())
    }

    async fn rate_order(
        &self,
        token: &str,
        order_id: &str,
        rating: u8,
        feedback: Option<String>,
    ) -> Result<Order, ServiceError> {
        let body = RateBody {
            order_id: order_id.to_string(),
            rating: f64::from(rating),
            feedback,
        };
        self.post("/api/order/rate", token, &body).await
    }
}
