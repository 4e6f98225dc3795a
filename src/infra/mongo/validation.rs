use super::types::{Address, DraftAddress, Order, OrderDraft, OrderStatus};
use mongodb::bson::DateTime;
use thiserror::Error;

pub const FEEDBACK_MAX_CHARS: usize = 500;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("missing required field {0}")]
    Missing(&'static str),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ValidationError {
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::Missing(field) => *field,
            ValidationError::Invalid { field, .. } => *field,
        }
    }

    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ValidationError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Turns a candidate record into a storable order, filling `status`, `date`
/// and `payment` defaults. No other business rule is applied here.
pub fn validate(draft: OrderDraft, now: DateTime) -> Result<Order, ValidationError> {
    let user_id = draft
        .user_id
        .filter(|id| !id.trim().is_empty())
        .ok_or(ValidationError::Missing("userId"))?;
    let items = draft
        .items
        .filter(|items| !items.is_empty())
        .ok_or(ValidationError::Missing("items"))?;
    let amount = draft.amount.ok_or(ValidationError::Missing("amount"))?;
    if !amount.is_finite() {
        return Err(ValidationError::invalid("amount", "not a number"));
    }
    let address = draft
        .address
        .ok_or(ValidationError::Missing("address"))
        .and_then(check_address)?;

    let status = match draft.status {
        Some(raw) => raw
            .parse::<OrderStatus>()
            .map_err(|e| ValidationError::invalid("status", e.to_string()))?,
        None => OrderStatus::default(),
    };

    Ok(Order {
        id: None,
        user_id,
        user_name: draft.user_name.filter(|name| !name.trim().is_empty()),
        items,
        amount,
        original_amount: None,
        address,
        original_user_id: None,
        original_user_name: None,
        claimed_by: None,
        claimed_by_name: None,
        claimed_at: None,
        status,
        date: draft.date.unwrap_or(now),
        payment: draft.payment.unwrap_or(false),
        rating: draft.rating.map(check_rating).transpose()?,
        feedback: draft.feedback.map(check_feedback).transpose()?,
        rated_at: None,
    })
}

fn check_address(address: DraftAddress) -> Result<Address, ValidationError> {
    let coordinate = |value: Option<f64>, field: &'static str| match value {
        None => Err(ValidationError::Missing(field)),
        Some(n) if !n.is_finite() => Err(ValidationError::invalid(field, "not a number")),
        Some(n) => Ok(n),
    };
    Ok(Address {
        street: address.street,
        lat: coordinate(address.lat, "address.lat")?,
        lng: coordinate(address.lng, "address.lng")?,
    })
}

pub fn check_rating(rating: f64) -> Result<u8, ValidationError> {
    if rating.fract() != 0.0 || !(1.0..=5.0).contains(&rating) {
        return Err(ValidationError::invalid(
            "rating",
            format!("{rating} is not a whole number between 1 and 5"),
        ));
    }
    Ok(rating as u8)
}

/// Trims the text and enforces the length cap on what remains.
pub fn check_feedback(feedback: String) -> Result<String, ValidationError> {
    let trimmed = feedback.trim();
    let len = trimmed.chars().count();
    if len > FEEDBACK_MAX_CHARS {
        return Err(ValidationError::invalid(
            "feedback",
            format!("{len} characters, at most {FEEDBACK_MAX_CHARS} allowed"),
        ));
    }
    Ok(trimmed.to_string())
}
