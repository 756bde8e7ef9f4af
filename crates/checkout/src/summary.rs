use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use shared::{
    domain::{OrderId, Product},
    pricing::{effective_price, is_discounted, list_price},
    protocol::ItemForm,
};

use crate::buyer::VerifiedBuyer;

/// Everything the summary step, the confirmation email and the CLI show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_id: OrderId,
    pub product_name: String,
    pub unit_price: u32,
    pub quantity: u32,
    pub list_total: u64,
    pub total: u64,
    pub buyer: VerifiedBuyer,
    pub items: Vec<ItemForm>,
}

impl OrderSummary {
    pub fn new(
        order_id: OrderId,
        product: &Product,
        quantity: u32,
        buyer: VerifiedBuyer,
        items: Vec<ItemForm>,
    ) -> Self {
        Self {
            order_id,
            product_name: product.name.clone(),
            unit_price: product.price,
            quantity,
            list_total: list_price(product.price, quantity),
            total: effective_price(product.price, quantity),
            buyer,
            items,
        }
    }

    pub fn discounted(&self) -> bool {
        is_discounted(self.quantity)
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let buyer = &self.buyer;
        let _ = writeln!(out, "Order {}", self.order_id);
        let _ = writeln!(out);
        let _ = writeln!(out, "Customer Information");
        let _ = writeln!(out, "  Name:         {}", buyer.name);
        let _ = writeln!(out, "  Roll Number:  {}", buyer.roll_number);
        let _ = writeln!(out, "  Degree:       {}", buyer.degree);
        let _ = writeln!(out, "  Year:         {}", buyer.year);
        let _ = writeln!(out, "  Hostel:       {}", buyer.hostel);
        let _ = writeln!(
            out,
            "  WebnD Member: {}",
            if buyer.is_member { "Yes" } else { "No" }
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "Order Details");
        if self.discounted() {
            let _ = writeln!(
                out,
                "  {} x {}  (was Rs.{}) Rs.{}",
                self.product_name, self.quantity, self.list_total, self.total
            );
        } else {
            let _ = writeln!(
                out,
                "  {} x {}  Rs.{}",
                self.product_name, self.quantity, self.total
            );
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "T-shirt Details");
        for (index, item) in self.items.iter().enumerate() {
            let size = item.size.map(|s| s.as_str()).unwrap_or("-");
            let _ = writeln!(
                out,
                "  #{}  {}  ({size})",
                index + 1,
                item.printed_name
            );
            if let Some(position) = first_item_position(index, item) {
                let _ = writeln!(out, "      Position: {position}");
            }
        }
        out
    }
}

/// Positions are only ever shown for the first item.
pub(crate) fn first_item_position(index: usize, item: &ItemForm) -> Option<&str> {
    if index != 0 {
        return None;
    }
    item.position
        .as_deref()
        .map(str::trim)
        .filter(|position| !position.is_empty())
}
