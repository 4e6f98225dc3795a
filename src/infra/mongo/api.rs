use super::lifecycle::{Claim, LifecycleError};
use super::types::{Order, OrderDraft, OrderStatus};
use super::validation::{validate, ValidationError};
use mongodb::{
    bson::{doc, oid::ObjectId, DateTime, Document},
    error::Error as mongoError,
    options::FindOptions,
    sync::{Client, Collection},
};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum MongoRepError {
    #[error("error querying value")]
    QueryError(#[from] mongoError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("invalid order id {0}")]
    InvalidOrderId(String),
    #[error("order {0} not found")]
    OrderNotFound(String),
    #[error("order {0} was modified concurrently")]
    Conflict(String),
}

pub struct MongoRep {
    pub orders: Collection<Order>,
}

impl MongoRep {
    pub fn init(uri: String, database: &str) -> Result<Self, MongoRepError> {
        let client = Client::with_uri_str(uri)?;
        let database = client.database(database);
        let rep = MongoRep {
            orders: database.collection("orders"),
        };
        return Ok(rep);
    }

    /// Validates the candidate and stores it, returning the new document id.
    pub fn insert_order(&self, draft: OrderDraft) -> Result<ObjectId, MongoRepError> {
        let order = validate(draft, DateTime::now())?;
        let result = self.orders.insert_one(&order, None)?;
        let id = result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| MongoRepError::InvalidOrderId(result.inserted_id.to_string()))?;
        info!(order_id = %id, user_id = %order.user_id, "order placed");
        Ok(id)
    }

    pub fn get_order(&self, id: &str) -> Result<Order, MongoRepError> {
        let oid = parse_id(id)?;
        match self
            .orders
            .find_one(doc! {"_id": oid}, None)
            .map_err(MongoRepError::from)?
        {
            Some(order) => Ok(order),
            _ => Err(MongoRepError::OrderNotFound(String::from(id))),
        }
    }

    /// Orders the user currently owns, including ones they claimed, oldest first.
    pub fn get_user_orders(&self, user_id: &str) -> Result<Vec<Order>, MongoRepError> {
        let options = FindOptions::builder().sort(doc! {"date": 1}).build();
        let cursor = self
            .orders
            .find(
                doc! {"$or": [{"userId": user_id}, {"claimedBy": user_id}]},
                options,
            )
            .map_err(MongoRepError::from)?;
        let orders = cursor.collect::<Result<Vec<Order>, mongoError>>()?;
        debug!(user_id, count = orders.len(), "listed user orders");
        Ok(orders)
    }

    pub fn cancel_order(&self, id: &str, user_id: &str) -> Result<Order, MongoRepError> {
        let order = self.update(id, |order| {
            owned_by(order, id, user_id)?;
            order.cancel().map_err(MongoRepError::from)
        })?;
        info!(order_id = id, user_id, "order cancelled");
        Ok(order)
    }

    pub fn rate_order(
        &self,
        id: &str,
        user_id: &str,
        rating: f64,
        feedback: Option<String>,
    ) -> Result<Order, MongoRepError> {
        let order = self.update(id, |order| {
            owned_by(order, id, user_id)?;
            order
                .rate(rating, feedback, DateTime::now())
                .map_err(MongoRepError::from)
        })?;
        info!(order_id = id, user_id, rating, "order rated");
        Ok(order)
    }

    pub fn claim_order(&self, id: &str, claim: Claim) -> Result<Order, MongoRepError> {
        let claimant = claim.user_id.clone();
        let order = self.update(id, |order| {
            order
                .claim(claim, DateTime::now())
                .map_err(MongoRepError::from)
        })?;
        info!(order_id = id, claimed_by = %claimant, amount = order.amount, "order claimed");
        Ok(order)
    }

    pub fn set_status(&self, id: &str, status: OrderStatus) -> Result<Order, MongoRepError> {
        let order = self.update(id, |order| {
            order.transition(status).map_err(MongoRepError::from)
        })?;
        info!(order_id = id, %status, "order status changed");
        Ok(order)
    }

    // Load, mutate in memory, then write back only if the stored status and
    // rating are still what we read.
    fn update<F>(&self, id: &str, mutate: F) -> Result<Order, MongoRepError>
    where
        F: FnOnce(&mut Order) -> Result<(), MongoRepError>,
    {
        let mut order = self.get_order(id)?;
        let guard = guard_filter(&order);
        mutate(&mut order)?;
        let result = self.orders.replace_one(guard, &order, None)?;
        if result.matched_count == 0 {
            warn!(order_id = id, "order changed under update");
            return Err(MongoRepError::Conflict(String::from(id)));
        }
        Ok(order)
    }
}

fn parse_id(id: &str) -> Result<ObjectId, MongoRepError> {
    ObjectId::parse_str(id).map_err(|_| MongoRepError::InvalidOrderId(String::from(id)))
}

// Another user's order is reported as missing.
fn owned_by(order: &Order, id: &str, user_id: &str) -> Result<(), MongoRepError> {
    if order.is_owned_by(user_id) {
        Ok(())
    } else {
        Err(MongoRepError::OrderNotFound(String::from(id)))
    }
}

fn guard_filter(order: &Order) -> Document {
    let mut filter = doc! {"_id": order.id, "status": order.status.as_str()};
    if order.rating.is_none() {
        filter.insert("rating", doc! {"$exists": false});
    }
    filter
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::mongo::types::{fixtures, DraftAddress, OrderItem};

    fn init_repo(database: &str) -> MongoRep {
        MongoRep::init(String::from("mongodb://localhost:27017/"), database).unwrap()
    }

    fn draft(user_id: &str) -> OrderDraft {
        OrderDraft {
            user_id: Some(user_id.to_string()),
            items: Some(vec![OrderItem {
                name: "Ramen".to_string(),
                quantity: 2,
                price: 25.0,
            }]),
            amount: Some(50.0),
            address: Some(DraftAddress {
                street: "7 Pine Rd".to_string(),
                lat: Some(35.0),
                lng: Some(-78.0),
            }),
            ..OrderDraft::default()
        }
    }

    #[test]
    fn test_guard_filter_pins_status_and_missing_rating() {
        let mut order = fixtures::order(OrderStatus::Delivered);
        let oid = ObjectId::new();
        order.id = Some(oid);
        assert_eq!(
            guard_filter(&order),
            doc! {"_id": oid, "status": "Delivered", "rating": {"$exists": false}}
        );
        order.rating = Some(3);
        assert_eq!(guard_filter(&order), doc! {"_id": oid, "status": "Delivered"});
    }

    #[test]
    #[should_panic(expected = "InvalidOrderId")]
    fn test_parse_id_rejects_garbage() {
        parse_id("not-an-object-id").unwrap();
    }

    #[test]
    #[should_panic(expected = "OrderNotFound")]
    fn test_owned_by_hides_foreign_orders() {
        let order = fixtures::order(OrderStatus::FoodProcessing);
        owned_by(&order, "abc", "U9").unwrap();
    }

    #[test]
    fn test_init_mongo_repo_passes() {
        init_repo("test");
    }

    #[test]
    #[ignore = "requires a local MongoDB"]
    #[should_panic(expected = "Validation")]
    fn test_insert_order_invalid_status() {
        let mongo_rep = init_repo("orders_test");
        let mut candidate = draft("U1");
        candidate.status = Some("InvalidValue".to_string());
        mongo_rep.insert_order(candidate).unwrap();
    }

    #[test]
    #[ignore = "requires a local MongoDB"]
    fn test_insert_and_list_passes() {
        let mongo_rep = init_repo("orders_test");
        let user = ObjectId::new().to_hex();
        let id = mongo_rep.insert_order(draft(&user)).unwrap();
        let orders = mongo_rep.get_user_orders(&user).unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].id, Some(id));
        assert_eq!(orders[0].status, OrderStatus::FoodProcessing);
        assert!(!orders[0].payment);
    }

    #[test]
    #[ignore = "requires a local MongoDB"]
    fn test_cancel_then_claim_passes() {
        let mongo_rep = init_repo("orders_test");
        let owner = ObjectId::new().to_hex();
        let claimant = ObjectId::new().to_hex();
        let id = mongo_rep.insert_order(draft(&owner)).unwrap().to_hex();

        mongo_rep.cancel_order(&id, &owner).unwrap();
        mongo_rep.set_status(&id, OrderStatus::Redistribute).unwrap();
        let claimed = mongo_rep
            .claim_order(
                &id,
                Claim {
                    user_id: claimant.clone(),
                    user_name: "Sam".to_string(),
                    price: 40.0,
                },
            )
            .unwrap();
        assert!(claimed.is_claimed());
        assert_eq!(claimed.original_amount, Some(50.0));

        let listed = mongo_rep.get_user_orders(&claimant).unwrap();
        assert_eq!(listed[0].amount, 40.0);
        assert!(mongo_rep.get_user_orders(&owner).unwrap().is_empty());
    }

    #[test]
    #[ignore = "requires a local MongoDB"]
    #[should_panic(expected = "NotCancellable")]
    fn test_cancel_twice_fails() {
        let mongo_rep = init_repo("orders_test");
        let owner = ObjectId::new().to_hex();
        let id = mongo_rep.insert_order(draft(&owner)).unwrap().to_hex();
        mongo_rep.cancel_order(&id, &owner).unwrap();
        mongo_rep.cancel_order(&id, &owner).unwrap();
    }
}
