use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{de::IgnoredAny, Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    pub items: Vec<OrderItem>,
    #[serde(default, deserialize_with = "number_or_zero")]
    pub amount: f64,
    #[serde(
        default,
        deserialize_with = "number_or_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub original_amount: Option<f64>,
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_by_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime>,
    #[serde(default)]
    pub status: OrderStatus,
    pub date: DateTime,
    #[serde(default)]
    pub payment: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rated_at: Option<DateTime>,
}

impl Order {
    /// Hex form of the document id, empty for records not yet persisted.
    pub fn id_hex(&self) -> String {
        self.id.map(|id| id.to_hex()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct OrderItem {
    pub name: String,
    pub quantity: u32,
    #[serde(default, deserialize_with = "number_or_zero")]
    pub price: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Address {
    #[serde(default)]
    pub street: String,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash, Default)]
pub enum OrderStatus {
    #[default]
    #[serde(rename = "Food Processing")]
    FoodProcessing,
    #[serde(rename = "Out for delivery")]
    OutForDelivery,
    Delivered,
    Redistribute,
    Cancelled,
    Donated,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::FoodProcessing,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Redistribute,
        OrderStatus::Cancelled,
        OrderStatus::Donated,
    ];

    /// Stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::FoodProcessing => "Food Processing",
            OrderStatus::OutForDelivery => "Out for delivery",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Redistribute => "Redistribute",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Donated => "Donated",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown order status {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Candidate record submitted for persistence. Everything is optional so the
/// validator, not the deserializer, decides which field is at fault.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub items: Option<Vec<OrderItem>>,
    #[serde(default, deserialize_with = "number_or_nan")]
    pub amount: Option<f64>,
    pub address: Option<DraftAddress>,
    pub status: Option<String>,
    pub date: Option<DateTime>,
    pub payment: Option<bool>,
    #[serde(default, deserialize_with = "number_or_nan")]
    pub rating: Option<f64>,
    pub feedback: Option<String>,
}

/// Submitted address; coordinates are checked by the validator.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DraftAddress {
    #[serde(default)]
    pub street: String,
    #[serde(default, deserialize_with = "number_or_nan")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "number_or_nan")]
    pub lng: Option<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient {
    Number(f64),
    #[allow(dead_code)]
    Other(IgnoredAny),
}

fn number_or_none<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Lenient>::deserialize(deserializer)? {
        Some(Lenient::Number(n)) if n.is_finite() => Some(n),
        _ => None,
    })
}

// Present but not a number reads as NaN so validation can name the field.
fn number_or_nan<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Lenient>::deserialize(deserializer)? {
        Some(Lenient::Number(n)) => Some(n),
        Some(Lenient::Other(_)) => Some(f64::NAN),
        None => None,
    })
}

// Amounts that are not numbers read as 0 rather than failing the whole record.
fn number_or_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    number_or_none(deserializer).map(|n| n.unwrap_or(0.0))
}
