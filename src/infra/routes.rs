use super::auth::AuthUser;
use super::mongo::{Claim, MongoRep, MongoRepError, Order, OrderDraft, OrderStatus};
use crate::events::{EventHub, OrderEvent};
use rocket::response::stream::{Event, EventStream};
use rocket::tokio::select;
use rocket::tokio::sync::broadcast::error::RecvError;
use rocket::{get, post};
use rocket::serde::json::{self, Json};
use rocket::{http::Status, Shutdown, State};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

/// Envelope shared by every order endpoint.
#[derive(Debug, Deserialize, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(ApiResponse {
            success: true,
            data: Some(data),
            message: None,
        })
    }
}

pub type ApiFailure = (Status, Json<ApiResponse<()>>);
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiFailure>;

fn fail(status: Status, message: impl Into<String>) -> ApiFailure {
    (
        status,
        Json(ApiResponse {
            success: false,
            data: None,
            message: Some(message.into()),
        }),
    )
}

fn reject(err: MongoRepError) -> ApiFailure {
    let status = match &err {
        MongoRepError::QueryError(e) => {
            error!(error = %e, "order query failed");
            return fail(Status::InternalServerError, "error querying value");
        }
        MongoRepError::Validation(_) | MongoRepError::InvalidOrderId(_) => Status::BadRequest,
        MongoRepError::OrderNotFound(_) => Status::NotFound,
        MongoRepError::Lifecycle(_) => Status::UnprocessableEntity,
        MongoRepError::Conflict(_) => Status::Conflict,
    };
    warn!(%status, error = %err, "order request rejected");
    fail(status, err.to_string())
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderIdBody {
    pub order_id: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateBody {
    pub order_id: String,
    pub rating: f64,
    #[serde(default)]
    pub feedback: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimBody {
    pub order_id: String,
    pub name: String,
    pub amount: f64,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBody {
    pub order_id: String,
    pub status: String,
}

#[post("/api/order/userorders")]
pub fn user_orders(db: &State<MongoRep>, user: AuthUser) -> ApiResult<Vec<Order>> {
    db.get_user_orders(&user.id)
        .map(ApiResponse::ok)
        .map_err(reject)
}

#[post("/api/order/place", data = "<draft>")]
pub fn place_order(
    db: &State<MongoRep>,
    user: AuthUser,
    draft: Result<Json<OrderDraft>, json::Error<'_>>,
) -> ApiResult<String> {
    let mut draft = draft
        .map_err(|e| {
            warn!(error = %e, "unreadable order body");
            fail(Status::BadRequest, format!("malformed order: {e}"))
        })?
        .into_inner();
    draft.user_id = Some(user.id);
    if user.name.is_some() {
        draft.user_name = user.name;
    }
    db.insert_order(draft)
        .map(|id| ApiResponse::ok(id.to_hex()))
        .map_err(reject)
}

#[post("/api/order/cancel_order", data = "<body>")]
pub fn cancel_order(
    db: &State<MongoRep>,
    hub: &State<EventHub>,
    user: AuthUser,
    body: Json<OrderIdBody>,
) -> ApiResult<Order> {
    let order = db.cancel_order(&body.order_id, &user.id).map_err(reject)?;
    hub.publish(OrderEvent::OrderCancelled {
        order_id: body.order_id.clone(),
    });
    Ok(ApiResponse::ok(order))
}

#[post("/api/order/rate", data = "<body>")]
pub fn rate_order(db: &State<MongoRep>, user: AuthUser, body: Json<RateBody>) -> ApiResult<Order> {
    let body = body.into_inner();
    db.rate_order(&body.order_id, &user.id, body.rating, body.feedback)
        .map(ApiResponse::ok)
        .map_err(reject)
}

#[post("/api/order/claim", data = "<body>")]
pub fn claim_order(db: &State<MongoRep>, user: AuthUser, body: Json<ClaimBody>) -> ApiResult<Order> {
    let body = body.into_inner();
    let claim = Claim {
        user_id: user.id,
        user_name: body.name,
        price: body.amount,
    };
    db.claim_order(&body.order_id, claim)
        .map(ApiResponse::ok)
        .map_err(reject)
}

#[post("/api/order/status", data = "<body>")]
pub fn update_status(
    db: &State<MongoRep>,
    user: AuthUser,
    body: Json<StatusBody>,
) -> ApiResult<Order> {
    if !user.is_staff() {
        return Err(fail(Status::Forbidden, "staff only"));
    }
    let status = body
        .status
        .parse::<OrderStatus>()
        .map_err(|e| fail(Status::BadRequest, e.to_string()))?;
    db.set_status(&body.order_id, status)
        .map(ApiResponse::ok)
        .map_err(reject)
}

#[get("/api/order/events")]
pub fn order_events(hub: &State<EventHub>, mut end: Shutdown) -> EventStream![] {
    let mut rx = hub.subscribe();
    EventStream! {
        loop {
            let event = select! {
                msg = rx.recv() => match msg {
                    Ok(event) => event,
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(_)) => continue,
                },
                _ = &mut end => break,
            };
            yield Event::json(&event).event(event.name());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::auth::{sign, TokenVerifier, TOKEN_HEADER};
    use crate::infra::server::build;
    use rocket::http::{ContentType, Header};
    use rocket::local::blocking::Client;
    use serde_json::json;

    const SECRET: &str = "route-secret";

    fn client() -> Client {
        let db = MongoRep::init(String::from("mongodb://localhost:27017/"), "orders_test").unwrap();
        let rocket = build(db, TokenVerifier::new(SECRET), EventHub::default());
        Client::tracked(rocket).unwrap()
    }

    #[test]
    fn test_user_orders_requires_token() {
        let client = client();
        let response = client.post("/api/order/userorders").dispatch();
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[test]
    fn test_forged_token_is_rejected() {
        let client = client();
        let token = sign("someone-else", json!({"id": "U1"}));
        let response = client
            .post("/api/order/cancel_order")
            .header(Header::new(TOKEN_HEADER, token))
            .header(ContentType::JSON)
            .body(r#"{"orderId":"65f0c1d2e3a4b5c6d7e8f901"}"#)
            .dispatch();
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[test]
    fn test_status_change_is_staff_only() {
        let client = client();
        let token = sign(SECRET, json!({"id": "U1"}));
        let response = client
            .post("/api/order/status")
            .header(Header::new(TOKEN_HEADER, token))
            .header(ContentType::JSON)
            .body(r#"{"orderId":"65f0c1d2e3a4b5c6d7e8f901","status":"Delivered"}"#)
            .dispatch();
        assert_eq!(response.status(), Status::Forbidden);
        let body: ApiResponse<()> = response.into_json().unwrap();
        assert!(!body.success);
        assert_eq!(body.message.as_deref(), Some("staff only"));
    }

    #[test]
    fn test_unknown_status_is_bad_request() {
        let client = client();
        let token = sign(SECRET, json!({"id": "S1", "role": "admin"}));
        let response = client
            .post("/api/order/status")
            .header(Header::new(TOKEN_HEADER, token))
            .header(ContentType::JSON)
            .body(r#"{"orderId":"65f0c1d2e3a4b5c6d7e8f901","status":"Claimed"}"#)
            .dispatch();
        assert_eq!(response.status(), Status::BadRequest);
    }

    fn place(client: &Client, body: &str) -> (Status, ApiResponse<String>) {
        let response = client
            .post("/api/order/place")
            .header(Header::new(TOKEN_HEADER, sign(SECRET, json!({"id": "U1"}))))
            .header(ContentType::JSON)
            .body(body)
            .dispatch();
        (response.status(), response.into_json().unwrap())
    }

    #[test]
    fn test_place_names_wrongly_typed_fields() {
        let client = client();
        let (status, body) = place(
            &client,
            r#"{"items":[{"name":"Pizza","quantity":1,"price":12}],"amount":"forty",
                "address":{"street":"1 Main St","lat":1.0,"lng":2.0}}"#,
        );
        assert_eq!(status, Status::BadRequest);
        assert!(!body.success);
        assert_eq!(body.message.as_deref(), Some("invalid amount: not a number"));

        let (status, body) = place(
            &client,
            r#"{"items":[{"name":"Pizza","quantity":1,"price":12}],"amount":12,
                "address":{"street":"1 Main St","lng":2.0}}"#,
        );
        assert_eq!(status, Status::BadRequest);
        assert_eq!(
            body.message.as_deref(),
            Some("missing required field address.lat")
        );
    }

    #[test]
    fn test_place_unreadable_body_gets_envelope() {
        let client = client();
        let (status, body) = place(&client, r#"{"items":"pizza"}"#);
        assert_eq!(status, Status::BadRequest);
        assert!(!body.success);
        assert!(body.message.unwrap().starts_with("malformed order"));
    }

    #[rocket::async_test]
    async fn test_events_stream_cancellations() {
        use rocket::local::asynchronous::Client;
        use rocket::tokio::io::AsyncReadExt;

        let order_id = "65f0c1d2e3a4b5c6d7e8f901";
        let hub = EventHub::default();
        let rocket = rocket::build()
            .manage(hub.clone())
            .mount("/", rocket::routes![order_events]);
        let client = Client::tracked(rocket).await.unwrap();
        let mut response = client.get("/api/order/events").dispatch().await;
        assert_eq!(response.status(), Status::Ok);

        let delivered = hub.publish(OrderEvent::OrderCancelled {
            order_id: order_id.to_string(),
        });
        assert_eq!(delivered, 1);

        let mut text = String::new();
        let mut buf = [0u8; 256];
        while !(text.contains(order_id) && text.ends_with("\n\n")) {
            let n = response.read(&mut buf).await.unwrap();
            assert!(n > 0, "event stream ended");
            text.push_str(&String::from_utf8_lossy(&buf[..n]));
        }
        assert!(text
            .lines()
            .any(|line| line.starts_with("event:") && line.ends_with("orderCancelled")));
        assert!(text
            .lines()
            .any(|line| line.starts_with("data:") && line.contains(r#""orderId":"65f0c1d2e3a4b5c6d7e8f901""#)));
    }

    #[test]
    #[ignore = "requires a local MongoDB"]
    fn test_cancel_publishes_event() {
        let client = client();
        let db = client.rocket().state::<MongoRep>().unwrap();
        let id = db
            .insert_order(OrderDraft {
                user_id: Some("U1".to_string()),
                items: Some(vec![crate::infra::mongo::OrderItem {
                    name: "Pho".to_string(),
                    quantity: 1,
                    price: 14.0,
                }]),
                amount: Some(14.0),
                address: Some(crate::infra::mongo::DraftAddress {
                    street: "3 Birch Ln".to_string(),
                    lat: Some(1.0),
                    lng: Some(2.0),
                }),
                ..OrderDraft::default()
            })
            .unwrap()
            .to_hex();
        let mut events = client.rocket().state::<EventHub>().unwrap().subscribe();

        let response = client
            .post("/api/order/cancel_order")
            .header(Header::new(TOKEN_HEADER, sign(SECRET, json!({"id": "U1"}))))
            .header(ContentType::JSON)
            .body(json!({ "orderId": id }).to_string())
            .dispatch();
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(
            events.try_recv().unwrap(),
            OrderEvent::OrderCancelled { order_id: id }
        );
    }

    #[test]
    fn test_reject_maps_errors_to_statuses() {
        let (status, body) = reject(MongoRepError::OrderNotFound("x".to_string()));
        assert_eq!(status, Status::NotFound);
        assert_eq!(body.message.as_deref(), Some("order x not found"));
        let (status, _) = reject(MongoRepError::Conflict("x".to_string()));
        assert_eq!(status, Status::Conflict);
        let (status, _) = reject(MongoRepError::InvalidOrderId("x".to_string()));
        assert_eq!(status, Status::BadRequest);
    }
}
