mod api;
mod lifecycle;
pub mod types;
mod validation;

pub use api::{MongoRep, MongoRepError};
pub use lifecycle::{Claim, LifecycleError};
pub use types::{Address, DraftAddress, Order, OrderDraft, OrderItem, OrderStatus};
pub use validation::{validate, ValidationError, FEEDBACK_MAX_CHARS};
