use shared::{
    domain::Product,
    pricing::{effective_price, list_price, PROMOTION_QUANTITY, PROMOTION_TRIGGER},
    protocol::Quote,
};

use crate::error::ValidationError;

pub const PROMOTION_NOTICE: &str =
    "Buy 5, get 1 free! Your order now has 6 T-shirts for the price of 5.";

/// Quantity picked on the product page. Asking for 5 yields 6 units with the
/// promotion flag set; the flag only clears when the buyer goes back to 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantitySelection {
    quantity: u32,
    promotion_applied: bool,
}

impl Default for QuantitySelection {
    fn default() -> Self {
        Self {
            quantity: 1,
            promotion_applied: false,
        }
    }
}

impl QuantitySelection {
    pub fn from_requested(requested: u32) -> Result<Self, ValidationError> {
        let mut selection = Self::default();
        selection.select(requested)?;
        Ok(selection)
    }

    /// Returns `true` when this call is the one that applied the promotion,
    /// i.e. when the notice should be shown.
    pub fn select(&mut self, requested: u32) -> Result<bool, ValidationError> {
        match requested {
            1 => {
                *self = Self::default();
                Ok(false)
            }
            PROMOTION_TRIGGER => {
                let newly_applied = !self.promotion_applied;
                self.quantity = PROMOTION_QUANTITY;
                self.promotion_applied = true;
                Ok(newly_applied)
            }
            PROMOTION_QUANTITY => {
                self.quantity = PROMOTION_QUANTITY;
                Ok(false)
            }
            other => Err(ValidationError::UnsupportedQuantity(other)),
        }
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn promotion_applied(&self) -> bool {
        self.promotion_applied
    }

    pub fn promotion_notice(&self) -> Option<&'static str> {
        self.promotion_applied.then_some(PROMOTION_NOTICE)
    }
}

pub fn quote(product: &Product, requested: u32) -> Result<Quote, ValidationError> {
    let selection = QuantitySelection::from_requested(requested)?;
    Ok(Quote {
        product_id: product.id.clone(),
        quantity: selection.quantity(),
        promotion_applied: selection.promotion_applied(),
        list_total: list_price(product.price, selection.quantity()),
        total: effective_price(product.price, selection.quantity()),
    })
}
