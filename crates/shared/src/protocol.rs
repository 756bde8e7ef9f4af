use serde::{Deserialize, Serialize};

use crate::domain::{DocumentId, OrderId, OrderStatus, ProductId, ShirtSize};

/// Buyer identity as typed into the product page form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuyerForm {
    pub name: String,
    pub roll_number: String,
    pub degree: String,
    pub year: String,
    pub hostel: String,
    pub is_member: Option<bool>,
}

/// Customization for one physical item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemForm {
    pub printed_name: String,
    pub size: Option<ShirtSize>,
    pub position: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub product_id: ProductId,
    pub quantity: u32,
    pub promotion_applied: bool,
    pub list_total: u64,
    pub total: u64,
}

/// JSON part of a multipart `POST /orders`; the proof travels as a file part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrderRequest {
    pub product_id: ProductId,
    pub quantity: u32,
    pub buyer: BuyerForm,
    pub items: Vec<ItemForm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    Persisted { index: usize, document_id: DocumentId },
    Failed { index: usize, message: String },
}

impl ItemOutcome {
    pub fn index(&self) -> usize {
        match self {
            ItemOutcome::Persisted { index, .. } | ItemOutcome::Failed { index, .. } => *index,
        }
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self, ItemOutcome::Persisted { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Complete,
    Partial,
    NothingPersisted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReport {
    pub order_id: OrderId,
    pub payment_proof_ref: String,
    pub outcomes: Vec<ItemOutcome>,
}

impl SubmissionReport {
    pub fn persisted(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.is_persisted())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.is_persisted())
    }

    pub fn status(&self) -> SubmissionStatus {
        let persisted = self.persisted().count();
        if persisted == 0 {
            SubmissionStatus::NothingPersisted
        } else if persisted == self.outcomes.len() {
            SubmissionStatus::Complete
        } else {
            SubmissionStatus::Partial
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingStep {
    pub step: u8,
    pub title: String,
    pub description: String,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemView {
    pub printed_name: String,
    pub size: ShirtSize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    pub status: OrderStatus,
}

/// Read-side reconstruction of an order from its item records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalOrder {
    pub order_id: OrderId,
    pub product_type: String,
    pub buyer_name: String,
    pub buyer_email: String,
    pub buyer_roll_number: String,
    pub items: Vec<OrderItemView>,
    pub timeline: Vec<TrackingStep>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderListQuery {
    pub search: Option<String>,
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub accepted: bool,
}
