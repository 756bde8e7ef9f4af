use chrono::NaiveDate;
use shared::{domain::StoredOrderItem, protocol::OrderListQuery};

const CSV_HEADERS: [&str; 9] = [
    "Order ID",
    "Merch Type",
    "Customer",
    "Roll Number",
    "Name to Print",
    "Size",
    "Position",
    "Payment Proof",
    "Status",
];

/// Case-insensitive substring search over buyer name, order id and roll
/// number, combined with an exact status match.
pub fn filter_items(items: Vec<StoredOrderItem>, query: &OrderListQuery) -> Vec<StoredOrderItem> {
    let needle = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(str::to_lowercase);

    items
        .into_iter()
        .filter(|item| {
            let record = &item.record;
            let matches_search = needle.as_deref().map_or(true, |needle| {
                [
                    record.buyer_name.as_str(),
                    record.order_id.as_str(),
                    record.buyer_roll_number.as_str(),
                ]
                .iter()
                .any(|field| field.to_lowercase().contains(needle))
            });
            let matches_status = query.status.map_or(true, |status| record.status == status);
            matches_search && matches_status
        })
        .collect()
}

pub fn export_csv(items: &[StoredOrderItem]) -> String {
    let mut lines = Vec::with_capacity(items.len() + 1);
    lines.push(CSV_HEADERS.join(","));
    for item in items {
        let record = &item.record;
        let fields = [
            record.order_id.as_str(),
            record.product_type.as_str(),
            record.buyer_name.as_str(),
            record.buyer_roll_number.as_str(),
            record.printed_name.as_str(),
            record.size.as_str(),
            record.position.as_deref().unwrap_or_default(),
            record.payment_proof_ref.as_str(),
            record.status.as_str(),
        ];
        lines.push(
            fields
                .iter()
                .map(|field| csv_field(field))
                .collect::<Vec<_>>()
                .join(","),
        );
    }
    let mut csv = lines.join("\n");
    csv.push('\n');
    csv
}

pub fn export_file_name(date: NaiveDate) -> String {
    format!("webnd-orders-{}.csv", date.format("%Y-%m-%d"))
}

fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}
