use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(ProductId);
id_newtype!(DocumentId);
id_newtype!(OrderId);

const ORDER_ID_PREFIX: &str = "WD";
const ORDER_ID_DIGITS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed order id: {0:?}")]
pub struct InvalidOrderId(pub String);

impl OrderId {
    /// `WD` followed by a random number in `10000..=99999`.
    pub fn generate() -> Self {
        let number = Uuid::new_v4().as_u128() % 90_000 + 10_000;
        Self(format!("{ORDER_ID_PREFIX}{number}"))
    }

    pub fn parse(raw: &str) -> Result<Self, InvalidOrderId> {
        let trimmed = raw.trim();
        let digits = trimmed
            .strip_prefix(ORDER_ID_PREFIX)
            .filter(|digits| digits.len() == ORDER_ID_DIGITS)
            .filter(|digits| digits.bytes().all(|b| b.is_ascii_digit()))
            .filter(|digits| !digits.starts_with('0'));
        match digits {
            Some(_) => Ok(Self(trimmed.to_string())),
            None => Err(InvalidOrderId(raw.to_string())),
        }
    }
}

impl FromStr for OrderId {
    type Err = InvalidOrderId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ShirtSize {
    Xs,
    S,
    M,
    L,
    Xl,
    Xxl,
}

impl ShirtSize {
    pub const ALL: [ShirtSize; 6] = [
        ShirtSize::Xs,
        ShirtSize::S,
        ShirtSize::M,
        ShirtSize::L,
        ShirtSize::Xl,
        ShirtSize::Xxl,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ShirtSize::Xs => "XS",
            ShirtSize::S => "S",
            ShirtSize::M => "M",
            ShirtSize::L => "L",
            ShirtSize::Xl => "XL",
            ShirtSize::Xxl => "XXL",
        }
    }
}

impl fmt::Display for ShirtSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown shirt size: {0:?}")]
pub struct UnknownShirtSize(pub String);

impl FromStr for ShirtSize {
    type Err = UnknownShirtSize;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ShirtSize::ALL
            .into_iter()
            .find(|size| size.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownShirtSize(s.to_string()))
    }
}

/// Review state of a single item record. Every record starts out `Pending`
/// and is moved to `Accepted` or `Rejected` once, from the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Rejected => "rejected",
        }
    }

    /// Backends store pending as an absent value.
    pub fn to_stored(self) -> Option<&'static str> {
        match self {
            OrderStatus::Pending => None,
            other => Some(other.as_str()),
        }
    }

    pub fn from_stored(raw: Option<&str>) -> Result<Self, UnknownOrderStatus> {
        match raw.map(str::trim) {
            None | Some("") => Ok(OrderStatus::Pending),
            Some(value) => value.parse(),
        }
    }

    pub fn from_review(accepted: bool) -> Self {
        if accepted {
            OrderStatus::Accepted
        } else {
            OrderStatus::Rejected
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown order status: {0:?}")]
pub struct UnknownOrderStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownOrderStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "accepted" => Ok(OrderStatus::Accepted),
            "rejected" => Ok(OrderStatus::Rejected),
            _ => Err(UnknownOrderStatus(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    /// Whole rupees.
    pub price: u32,
    pub image: String,
    pub size_chart: String,
}

/// One persisted row per physical item. Records of the same order share
/// `order_id`, buyer fields, `payment_proof_ref` and `is_member`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemRecord {
    pub order_id: OrderId,
    pub product_type: String,
    pub buyer_name: String,
    pub buyer_email: String,
    pub buyer_roll_number: String,
    pub printed_name: String,
    pub size: ShirtSize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    pub payment_proof_ref: String,
    pub is_member: bool,
    #[serde(default)]
    pub status: OrderStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredOrderItem {
    pub document_id: DocumentId,
    #[serde(flatten)]
    pub record: OrderItemRecord,
}
