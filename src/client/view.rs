//! Display state derived from an order record and the viewing user.
//!
//! Everything here is a pure function of its inputs; the caller supplies the
//! current time so the one-second re-render stays outside.

use crate::infra::mongo::{Order, OrderStatus};
use mongodb::bson::DateTime;
use serde::Serialize;
use std::fmt;

/// Length of the cosmetic progress ramp.
pub const PROGRESS_WINDOW_MS: f64 = 120_000.0;
/// Progress at which the label switches to "Out for Delivery".
pub const OUT_FOR_DELIVERY_AT: f64 = 60.0;
/// Status the original owner is checked against after a claim. No stored
/// status has this value, see DESIGN.md.
pub const CLAIMED_STATUS: &str = "Claimed";

const STAR: char = '★';
const EMPTY_STAR: char = '☆';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Eligibility {
    pub is_cancelled: bool,
}

/// Whether the viewer should see this order as cancelled. Rules are checked
/// in order and the first match wins.
pub fn cancellation_eligibility(order: &Order, viewer: Option<&str>) -> Eligibility {
    let is_cancelled = if viewer.is_some() && order.claimed_by.as_deref() == viewer {
        false
    } else if viewer == Some(order.user_id.as_str()) && order.status.as_str() == CLAIMED_STATUS {
        true
    } else {
        order.status == OrderStatus::Redistribute
    };
    Eligibility { is_cancelled }
}

/// Percentage of the two-minute ramp elapsed since the order was placed.
pub fn progress(order: &Order, now: DateTime) -> f64 {
    if matches!(order.status, OrderStatus::Delivered | OrderStatus::Donated) {
        return 100.0;
    }
    let elapsed = (now.timestamp_millis() - order.date.timestamp_millis()) as f64;
    (elapsed / PROGRESS_WINDOW_MS * 100.0).clamp(0.0, 100.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProgressLabel {
    DonatedToShelter,
    Delivered,
    OutForDelivery,
    PreparingFood,
    Cancelled,
}

impl fmt::Display for ProgressLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProgressLabel::DonatedToShelter => "Donated to shelter",
            ProgressLabel::Delivered => "Delivered",
            ProgressLabel::OutForDelivery => "Out for Delivery",
            ProgressLabel::PreparingFood => "Preparing Food",
            ProgressLabel::Cancelled => "Order Cancelled",
        })
    }
}

/// Label for an order that is not shown as cancelled.
pub fn progress_label(order: &Order, progress: f64) -> ProgressLabel {
    match order.status {
        OrderStatus::Donated => ProgressLabel::DonatedToShelter,
        OrderStatus::Delivered => ProgressLabel::Delivered,
        _ if progress >= OUT_FOR_DELIVERY_AT => ProgressLabel::OutForDelivery,
        _ => ProgressLabel::PreparingFood,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Pricing {
    pub current_amount: f64,
    pub original_amount: f64,
    pub is_claimed: bool,
    pub has_discount: bool,
    pub savings: f64,
}

pub fn pricing(order: &Order) -> Pricing {
    let current_amount = if order.amount.is_finite() { order.amount } else { 0.0 };
    let original_amount = order
        .original_amount
        .filter(|amount| amount.is_finite())
        .unwrap_or(current_amount);
    let is_claimed = order.is_claimed();
    let has_discount = is_claimed && original_amount > current_amount;
    let savings = if has_discount {
        (original_amount - current_amount).max(0.0)
    } else {
        0.0
    };
    Pricing {
        current_amount,
        original_amount,
        is_claimed,
        has_discount,
        savings,
    }
}

/// Cancel stays available until the order is delivered, donated, or shown as
/// cancelled.
pub fn can_cancel(order: &Order, eligibility: Eligibility) -> bool {
    !matches!(order.status, OrderStatus::Delivered | OrderStatus::Donated)
        && !eligibility.is_cancelled
}

pub fn can_rate(order: &Order) -> bool {
    order.status == OrderStatus::Delivered && order.rating.is_none()
}

pub fn stars(rating: u8) -> String {
    let filled = usize::from(rating.min(5));
    std::iter::repeat(STAR)
        .take(filled)
        .chain(std::iter::repeat(EMPTY_STAR).take(5 - filled))
        .collect()
}

pub fn format_amount(currency: &str, amount: f64) -> String {
    format!("{currency}{amount:.2}")
}

/// "name x qty, name x qty".
pub fn items_summary(order: &Order) -> String {
    order
        .items
        .iter()
        .map(|item| format!("{} x {}", item.name, item.quantity))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PriceDisplay {
    Plain {
        amount: String,
    },
    Discounted {
        original: String,
        paid: String,
        saved: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BarStyle {
    Normal,
    Donated,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressBar {
    pub width: f64,
    pub style: BarStyle,
    pub label: ProgressLabel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RatingPanel {
    Hidden,
    Prompt,
    Rated {
        stars: String,
        feedback: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CancelControl {
    pub enabled: bool,
    pub label: &'static str,
}

/// Everything one row of the order list shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderView {
    pub order_id: String,
    pub items: String,
    pub item_count: usize,
    pub price: PriceDisplay,
    pub pricing: Pricing,
    pub eligibility: Eligibility,
    pub progress: ProgressBar,
    pub claimed_badge: bool,
    pub rating: RatingPanel,
    pub cancel: CancelControl,
}

impl OrderView {
    pub fn build(order: &Order, viewer: Option<&str>, now: DateTime, currency: &str) -> Self {
        let eligibility = cancellation_eligibility(order, viewer);
        let pricing = pricing(order);

        let price = if pricing.has_discount {
            PriceDisplay::Discounted {
                original: format_amount(currency, pricing.original_amount),
                paid: format_amount(currency, pricing.current_amount),
                saved: format_amount(currency, pricing.savings),
            }
        } else {
            PriceDisplay::Plain {
                amount: format_amount(currency, pricing.current_amount),
            }
        };

        let progress = if eligibility.is_cancelled {
            ProgressBar {
                width: 100.0,
                style: BarStyle::Cancelled,
                label: ProgressLabel::Cancelled,
            }
        } else {
            let width = progress(order, now);
            ProgressBar {
                width,
                style: if order.status == OrderStatus::Donated {
                    BarStyle::Donated
                } else {
                    BarStyle::Normal
                },
                label: progress_label(order, width),
            }
        };

        let rating = match (eligibility.is_cancelled, order.status, order.rating) {
            (false, OrderStatus::Delivered, None) => RatingPanel::Prompt,
            (false, OrderStatus::Delivered, Some(rating)) => RatingPanel::Rated {
                stars: stars(rating),
                feedback: order.feedback.clone().filter(|text| !text.is_empty()),
            },
            _ => RatingPanel::Hidden,
        };

        OrderView {
            order_id: order.id_hex(),
            items: items_summary(order),
            item_count: order.items.len(),
            price,
            pricing,
            eligibility,
            progress,
            claimed_badge: pricing.is_claimed && !eligibility.is_cancelled,
            rating,
            cancel: CancelControl {
                enabled: can_cancel(order, eligibility),
                label: if eligibility.is_cancelled {
                    "Cancelled"
                } else {
                    "Cancel Order"
                },
            },
        }
    }
}
