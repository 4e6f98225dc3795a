//! Order list as seen by a signed-in customer.

pub mod my_orders;
pub mod service;
pub mod session;
pub mod view;

pub use my_orders::{Frame, MyOrders};
pub use service::{HttpOrderService, OrderService, ServiceError};
pub use session::Session;
pub use view::{
    can_cancel, can_rate, cancellation_eligibility, pricing, progress, progress_label,
    Eligibility, OrderView, Pricing, ProgressLabel,
};
