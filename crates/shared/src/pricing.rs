//! Pricing rule for the "buy 5, get 1 free" promotion.

/// Quantity a shopper picks to ask for the bundle.
pub const PROMOTION_TRIGGER: u32 = 5;
/// Quantity the bundle actually ships.
pub const PROMOTION_QUANTITY: u32 = 6;
/// Units charged for a bundle.
pub const PROMOTION_PAID_UNITS: u32 = 5;

/// Amount due for `quantity` units, applying the bundle discount.
pub fn effective_price(unit_price: u32, quantity: u32) -> u64 {
    u64::from(unit_price) * u64::from(paid_units(quantity))
}

/// Undiscounted amount, shown struck through next to a bundle price.
pub fn list_price(unit_price: u32, quantity: u32) -> u64 {
    u64::from(unit_price) * u64::from(quantity)
}

pub fn paid_units(quantity: u32) -> u32 {
    if quantity == PROMOTION_QUANTITY {
        PROMOTION_PAID_UNITS
    } else {
        quantity
    }
}

pub fn is_discounted(quantity: u32) -> bool {
    paid_units(quantity) != quantity
}
