use super::types::{Order, OrderStatus};
use super::validation::{check_feedback, check_rating, ValidationError};
use mongodb::bson::DateTime;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LifecycleError {
    #[error("order is {0} and can no longer be cancelled")]
    NotCancellable(OrderStatus),
    #[error("only delivered orders can be rated, order is {0}")]
    NotDelivered(OrderStatus),
    #[error("order has already been rated")]
    AlreadyRated,
    #[error("order is {0} and not open for claims")]
    NotClaimable(OrderStatus),
    #[error("order cannot be claimed by its current owner")]
    SelfClaim,
    #[error("claim price {price} is above the current amount {amount}")]
    ClaimAboveAmount { price: f64, amount: f64 },
    #[error("order cannot move from {from} to {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl OrderStatus {
    /// Delivery-side moves made by staff. Cancel and claim have their own
    /// operations and are not listed here.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::FoodProcessing, OrderStatus::OutForDelivery)
                | (OrderStatus::OutForDelivery, OrderStatus::Delivered)
                | (OrderStatus::Cancelled, OrderStatus::Redistribute)
                | (OrderStatus::Redistribute, OrderStatus::Donated)
        )
    }

    pub fn is_cancellable(&self) -> bool {
        !matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Donated | OrderStatus::Cancelled
        )
    }
}

/// Who takes over a redistributed order and what they pay for it.
#[derive(Debug, Clone)]
pub struct Claim {
    pub user_id: String,
    pub user_name: String,
    pub price: f64,
}

impl Order {
    /// Claimed means the original placer is known and is not the current owner.
    pub fn is_claimed(&self) -> bool {
        self.original_user_id
            .as_deref()
            .is_some_and(|original| !original.is_empty() && original != self.user_id)
    }

    /// Whether `user_id` may act on this order as its owner.
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id || self.claimed_by.as_deref() == Some(user_id)
    }

    pub fn cancel(&mut self) -> Result<(), LifecycleError> {
        if !self.status.is_cancellable() {
            return Err(LifecycleError::NotCancellable(self.status));
        }
        self.status = OrderStatus::Cancelled;
        Ok(())
    }

    pub fn rate(
        &mut self,
        rating: f64,
        feedback: Option<String>,
        now: DateTime,
    ) -> Result<(), LifecycleError> {
        if self.status != OrderStatus::Delivered {
            return Err(LifecycleError::NotDelivered(self.status));
        }
        if self.rating.is_some() {
            return Err(LifecycleError::AlreadyRated);
        }
        let rating = check_rating(rating)?;
        let feedback = feedback
            .map(check_feedback)
            .transpose()?
            .filter(|text| !text.is_empty());
        self.rating = Some(rating);
        self.feedback = feedback;
        self.rated_at = Some(now);
        Ok(())
    }

    /// Hands a redistributed order to a new owner. The first placer and the
    /// first price are kept across repeated claims. Preparation restarts, so
    /// `date` moves to the claim time.
    pub fn claim(&mut self, claim: Claim, now: DateTime) -> Result<(), LifecycleError> {
        if self.status != OrderStatus::Redistribute {
            return Err(LifecycleError::NotClaimable(self.status));
        }
        if claim.user_id == self.user_id {
            return Err(LifecycleError::SelfClaim);
        }
        if !claim.price.is_finite() || claim.price < 0.0 {
            return Err(ValidationError::Invalid {
                field: "amount",
                reason: format!("{} is not a valid price", claim.price),
            }
            .into());
        }
        if claim.price > self.amount {
            return Err(LifecycleError::ClaimAboveAmount {
                price: claim.price,
                amount: self.amount,
            });
        }

        if self.original_user_id.is_none() {
            self.original_user_id = Some(self.user_id.clone());
            self.original_user_name = self.user_name.clone();
        }
        self.original_amount.get_or_insert(self.amount);
        self.user_id = claim.user_id.clone();
        self.user_name = Some(claim.user_name.clone());
        self.claimed_by = Some(claim.user_id);
        self.claimed_by_name = Some(claim.user_name);
        self.claimed_at = Some(now);
        self.date = now;
        self.amount = claim.price;
        self.status = OrderStatus::FoodProcessing;
        Ok(())
    }

    pub fn transition(&mut self, next: OrderStatus) -> Result<(), LifecycleError> {
        if !self.status.can_transition_to(next) {
            return Err(LifecycleError::IllegalTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}
