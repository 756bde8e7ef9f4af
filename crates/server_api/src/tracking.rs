use shared::{
    domain::StoredOrderItem,
    protocol::{LogicalOrder, OrderItemView, TrackingStep},
};

const WEBND_PRINT_MEDIA: &str = "/videos/webnd-print.mp4";
const CODE_PRINT_MEDIA: &str = "/videos/code-print.mp4";

/// Fixed three-step timeline. Nothing past "Printing Started" is tracked, so
/// the last step never completes.
pub fn tracking_timeline(product_type: &str) -> Vec<TrackingStep> {
    let media = if product_type.contains("WebnD Merch") {
        WEBND_PRINT_MEDIA
    } else {
        CODE_PRINT_MEDIA
    };
    vec![
        TrackingStep {
            step: 1,
            title: "Order Placed".into(),
            description: "Your order has been received".into(),
            completed: true,
            media: None,
        },
        TrackingStep {
            step: 2,
            title: "Processing".into(),
            description: "Your order is being processed".into(),
            completed: true,
            media: None,
        },
        TrackingStep {
            step: 3,
            title: "Printing Started".into(),
            description: "Your order is now being printed".into(),
            completed: false,
            media: Some(media.into()),
        },
    ]
}

/// Groups the item records of one order into a single logical order.
/// Shared fields come from the first record; items keep storage order.
pub fn project_order(items: Vec<StoredOrderItem>) -> Option<LogicalOrder> {
    let first = items.first()?.record.clone();
    let views = items
        .into_iter()
        .map(|item| OrderItemView {
            printed_name: item.record.printed_name,
            size: item.record.size,
            position: item.record.position,
            status: item.record.status,
        })
        .collect();

    Some(LogicalOrder {
        timeline: tracking_timeline(&first.product_type),
        order_id: first.order_id,
        product_type: first.product_type,
        buyer_name: first.buyer_name,
        buyer_email: first.buyer_email,
        buyer_roll_number: first.buyer_roll_number,
        items: views,
    })
}
