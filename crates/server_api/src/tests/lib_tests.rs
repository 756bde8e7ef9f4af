use async_trait::async_trait;
use checkout::{CallPolicy, LogNotifier};
use shared::{
    catalog::default_catalog,
    domain::{ProductId, ShirtSize},
    protocol::{BuyerForm, ItemForm, ItemOutcome, SubmissionStatus},
};
use storage::{ProofStorage, Storage};

use super::*;

struct UnreachableBucket;

#[async_trait]
impl ProofStorage for UnreachableBucket {
    async fn upload_proof(&self, _proof: &ProofUpload) -> anyhow::Result<String> {
        Err(anyhow::anyhow!("bucket unreachable"))
    }
}

async fn context() -> ApiContext {
    let storage = Arc::new(
        Storage::new("sqlite::memory:")
            .await
            .expect("db")
            .with_public_base_url("https://merch.example.org"),
    );
    ApiContext {
        checkout: CheckoutServices {
            documents: storage.clone(),
            proofs: storage,
            notifier: Arc::new(LogNotifier),
            policy: CallPolicy::default(),
            tracking_base_url: "https://merch.example.org".into(),
        },
        catalog: Arc::new(default_catalog()),
        email_domain: "iitbbs.ac.in".into(),
    }
}

fn buyer_form() -> BuyerForm {
    BuyerForm {
        name: "Asha Rao".into(),
        roll_number: "21CS01001".into(),
        degree: "B.Tech".into(),
        year: "3".into(),
        hostel: "MHR".into(),
        is_member: Some(true),
    }
}

fn request(quantity: u32, items: usize, order_id: Option<&str>) -> PlaceOrderRequest {
    PlaceOrderRequest {
        product_id: ProductId("code-merch".into()),
        quantity,
        buyer: buyer_form(),
        items: (0..items)
            .map(|index| ItemForm {
                printed_name: format!("NAME {index}"),
                size: Some(ShirtSize::M),
                position: (index == 0).then(|| "Lead".to_string()),
            })
            .collect(),
        order_id: order_id.map(|id| OrderId(id.into())),
    }
}

fn proof() -> Option<ProofUpload> {
    Some(ProofUpload {
        file_name: "upi.jpg".into(),
        content_type: "image/jpeg".into(),
        bytes: b"jpeg".to_vec(),
    })
}

#[tokio::test]
async fn quote_applies_promotion() {
    let ctx = context().await;
    let quote = quote_product(&ctx, "code-merch", &QuoteRequest { quantity: 5 }).expect("quote");
    assert_eq!(quote.quantity, 6);
    assert!(quote.promotion_applied);
    assert_eq!(quote.total, 349 * 5);

    let err = quote_product(&ctx, "code-merch", &QuoteRequest { quantity: 3 })
        .expect_err("unsupported");
    assert_eq!(err.code, ErrorCode::Validation);
}

#[tokio::test]
async fn unknown_product_falls_back_to_first() {
    let ctx = context().await;
    let product = get_product(&ctx, "no-such-shirt").expect("fallback");
    assert_eq!(product.id.as_str(), "webnd-merch");
}

#[tokio::test]
async fn placed_order_round_trips_through_lookup() {
    let ctx = context().await;
    let report = place_order(&ctx, request(5, 6, Some("WD77777")), proof())
        .await
        .expect("placed");
    assert_eq!(report.status(), SubmissionStatus::Complete);
    assert_eq!(report.outcomes.len(), 6);
    assert!(report
        .payment_proof_ref
        .starts_with("https://merch.example.org/proofs/"));

    let order = lookup_order(&ctx, " WD77777 ").await.expect("found");
    assert_eq!(order.product_type, "Code Merch");
    assert_eq!(order.buyer_email, "21cs01001@iitbbs.ac.in");
    assert_eq!(order.items.len(), 6);
    assert_eq!(order.items[0].position.as_deref(), Some("Lead"));
    assert!(order.items[1..].iter().all(|item| item.position.is_none()));
    assert_eq!(order.timeline.len(), 3);

    let proof_id = report
        .payment_proof_ref
        .rsplit('/')
        .next()
        .expect("proof id");
    let stored = load_proof(&ctx, proof_id).await.expect("proof");
    assert_eq!(stored.bytes, b"jpeg");
}

#[tokio::test]
async fn reused_order_id_is_a_conflict() {
    let ctx = context().await;
    place_order(&ctx, request(1, 1, Some("WD88888")), proof())
        .await
        .expect("first");
    let err = place_order(&ctx, request(1, 1, Some("WD88888")), proof())
        .await
        .expect_err("second");
    assert_eq!(err.code, ErrorCode::Conflict);
}

#[tokio::test]
async fn invalid_orders_never_reach_storage() {
    let ctx = context().await;

    let err = place_order(&ctx, request(1, 1, None), None)
        .await
        .expect_err("no proof");
    assert_eq!(err.code, ErrorCode::Validation);

    let mut missing_hostel = request(1, 1, None);
    missing_hostel.buyer.hostel.clear();
    let err = place_order(&ctx, missing_hostel, proof())
        .await
        .expect_err("missing hostel");
    assert_eq!(err.code, ErrorCode::Validation);

    let items = list_orders(&ctx, &OrderListQuery::default()).await.expect("list");
    assert!(items.is_empty());
}

#[tokio::test]
async fn upload_failure_maps_to_upload_error() {
    let mut ctx = context().await;
    ctx.checkout.proofs = Arc::new(UnreachableBucket);
    ctx.checkout.policy.upload_attempts = 1;

    let err = place_order(&ctx, request(1, 1, None), proof())
        .await
        .expect_err("upload fails");
    assert_eq!(err.code, ErrorCode::Upload);
    assert!(list_orders(&ctx, &OrderListQuery::default())
        .await
        .expect("list")
        .is_empty());
}

#[tokio::test]
async fn lookup_of_missing_or_malformed_id_is_not_found() {
    let ctx = context().await;
    for raw in ["WD12345", "nonsense", "WD1234", ""] {
        let err = lookup_order(&ctx, raw).await.expect_err("not found");
        assert_eq!(err.code, ErrorCode::NotFound, "{raw}");
    }
}

#[tokio::test]
async fn items_are_reviewed_exactly_once() {
    let ctx = context().await;
    let report = place_order(&ctx, request(1, 1, Some("WD99999")), proof())
        .await
        .expect("placed");
    let document_id = match &report.outcomes[0] {
        ItemOutcome::Persisted { document_id, .. } => document_id.clone(),
        other => panic!("item not persisted: {other:?}"),
    };

    let reviewed = review_item(&ctx, &document_id, true).await.expect("review");
    assert_eq!(reviewed.record.status, OrderStatus::Accepted);

    let err = review_item(&ctx, &document_id, false)
        .await
        .expect_err("second review");
    assert_eq!(err.code, ErrorCode::Conflict);

    let err = review_item(&ctx, &DocumentId("missing".into()), true)
        .await
        .expect_err("missing");
    assert_eq!(err.code, ErrorCode::NotFound);

    let accepted = list_orders(
        &ctx,
        &OrderListQuery {
            search: None,
            status: Some(OrderStatus::Accepted),
        },
    )
    .await
    .expect("list");
    assert_eq!(accepted.len(), 1);
}

#[tokio::test]
async fn concurrent_reviews_settle_on_one_decision() {
    let ctx = context().await;
    let report = place_order(&ctx, request(1, 1, Some("WD88888")), proof())
        .await
        .expect("placed");
    let document_id = match &report.outcomes[0] {
        ItemOutcome::Persisted { document_id, .. } => document_id.clone(),
        other => panic!("item not persisted: {other:?}"),
    };

    let (accept, reject) = tokio::join!(
        review_item(&ctx, &document_id, true),
        review_item(&ctx, &document_id, false)
    );

    let winner = match (accept, reject) {
        (Ok(item), Err(err)) | (Err(err), Ok(item)) => {
            assert_eq!(err.code, ErrorCode::Conflict);
            item.record.status
        }
        (accept, reject) => panic!("expected exactly one review to win: {accept:?} {reject:?}"),
    };
    let stored = ctx
        .documents()
        .get_item(&document_id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(stored.record.status, winner);
}

#[tokio::test]
async fn lookup_of_a_multi_item_order_shares_buyer_fields() {
    let ctx = context().await;
    place_order(&ctx, request(5, 6, Some("WD77777")), proof())
        .await
        .expect("placed");

    let order = lookup_order(&ctx, "WD77777").await.expect("found");
    let stored = ctx
        .documents()
        .list_items(&ItemQuery::ByOrder(OrderId("WD77777".into())))
        .await
        .expect("list");

    assert_eq!(order.items.len(), stored.len());
    for item in &stored {
        assert_eq!(order.order_id, item.record.order_id);
        assert_eq!(order.product_type, item.record.product_type);
        assert_eq!(order.buyer_name, item.record.buyer_name);
        assert_eq!(order.buyer_email, item.record.buyer_email);
        assert_eq!(order.buyer_roll_number, item.record.buyer_roll_number);
    }
}
