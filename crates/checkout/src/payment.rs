use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::summary::OrderSummary;

/// UPI recipient shown on the payment step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payee {
    pub upi_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub payee_id: String,
    pub payee_name: String,
    pub amount: u64,
    pub memo: String,
}

impl PaymentRequest {
    pub fn for_order(payee: &Payee, summary: &OrderSummary) -> Self {
        let plural = if summary.quantity > 1 { "s" } else { "" };
        Self {
            payee_id: payee.upi_id.clone(),
            payee_name: payee.name.clone(),
            amount: summary.total,
            memo: format!(
                "Payment for {} {} t-shirt{plural} done by {} for order id {}",
                summary.quantity, summary.product_name, summary.buyer.name, summary.order_id
            ),
        }
    }

    /// Deep link encoded into the QR code.
    pub fn upi_uri(&self) -> String {
        format!(
            "upi://pay?pa={}&pn={}&am={}&cu=INR&tn={}",
            self.payee_id,
            encode_component(&self.payee_name),
            self.amount,
            encode_component(&self.memo)
        )
    }
}

/// Percent-encodes with `%20` for spaces; some UPI apps show a literal `+`.
fn encode_component(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{buyer::VerifiedBuyer, summary::OrderSummary};
    use shared::{
        catalog::default_catalog,
        domain::{OrderId, ShirtSize},
        protocol::ItemForm,
    };

    fn summary(quantity: u32) -> OrderSummary {
        let buyer = VerifiedBuyer {
            name: "Asha Rao".into(),
            roll_number: "21CS01001".into(),
            email: "21cs01001@iitbbs.ac.in".into(),
            degree: "B.Tech".into(),
            year: "3".into(),
            hostel: "MHR".into(),
            is_member: true,
        };
        let items = vec![
            ItemForm {
                printed_name: "ASHA".into(),
                size: Some(ShirtSize::M),
                position: None,
            };
            quantity as usize
        ];
        OrderSummary::new(
            OrderId("WD12345".into()),
            &default_catalog()[0],
            quantity,
            buyer,
            items,
        )
    }

    fn payee() -> Payee {
        Payee {
            upi_id: "society@okhdfcbank".into(),
            name: "Web and Design Society".into(),
        }
    }

    #[test]
    fn memo_embeds_quantity_product_buyer_and_order() {
        let request = PaymentRequest::for_order(&payee(), &summary(6));
        assert_eq!(
            request.memo,
            "Payment for 6 WebnD Merch t-shirts done by Asha Rao for order id WD12345"
        );
        assert_eq!(request.amount, 399 * 5);

        let single = PaymentRequest::for_order(&payee(), &summary(1));
        assert!(single.memo.starts_with("Payment for 1 WebnD Merch t-shirt done by"));
    }

    #[test]
    fn upi_uri_encodes_name_and_memo() {
        let uri = PaymentRequest::for_order(&payee(), &summary(1)).upi_uri();
        assert_eq!(
            uri,
            "upi://pay?pa=society@okhdfcbank&pn=Web%20and%20Design%20Society&am=399&cu=INR\
             &tn=Payment%20for%201%20WebnD%20Merch%20t-shirt%20done%20by%20Asha%20Rao%20for%20order%20id%20WD12345"
        );
    }

    #[test]
    fn literal_plus_survives_encoding() {
        assert_eq!(encode_component("C++ & Rust"), "C%2B%2B%20%26%20Rust");
    }
}
