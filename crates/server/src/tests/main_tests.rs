use super::*;
use axum::{body, body::Body, http::Request};
use checkout::{CallPolicy, CheckoutServices, LogNotifier};
use server_api::ApiContext;
use shared::{catalog::default_catalog, domain::OrderStatus};
use storage::Storage;
use tower::ServiceExt;

const BOUNDARY: &str = "merch-test-boundary";

async fn test_app() -> Router {
    let storage = Arc::new(
        Storage::new("sqlite::memory:")
            .await
            .expect("db")
            .with_public_base_url("http://merch.test"),
    );
    let api = ApiContext {
        checkout: CheckoutServices {
            documents: storage.clone(),
            proofs: storage,
            notifier: Arc::new(LogNotifier),
            policy: CallPolicy::default(),
            tracking_base_url: "http://merch.test".into(),
        },
        catalog: Arc::new(default_catalog()),
        email_domain: "iitbbs.ac.in".into(),
    };
    build_router(Arc::new(AppState { api }))
}

fn order_json(order_id: &str, quantity: u32, items: usize) -> String {
    let items: Vec<_> = (0..items)
        .map(|index| {
            serde_json::json!({
                "printed_name": format!("NAME {index}"),
                "size": "L",
                "position": if index == 0 { "Secretary" } else { "" },
            })
        })
        .collect();
    serde_json::json!({
        "product_id": "webnd-merch",
        "quantity": quantity,
        "order_id": order_id,
        "buyer": {
            "name": "Asha Rao",
            "roll_number": "21CS01001",
            "degree": "B.Tech",
            "year": "3",
            "hostel": "MHR",
            "is_member": false
        },
        "items": items,
    })
    .to_string()
}

fn multipart_body(order: &str, proof: Option<(&str, &[u8])>) -> Body {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"order\"\r\n\r\n{order}\r\n"
        )
        .as_bytes(),
    );
    if let Some((content_type, bytes)) = proof {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"proof\"; filename=\"upi.png\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    Body::from(body)
}

fn place_order_request(order: &str, proof: Option<(&str, &[u8])>) -> Request<Body> {
    Request::post("/orders")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(multipart_body(order, proof))
        .expect("request")
}

async fn json_body<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let app = test_app().await;
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn quote_route_applies_promotion() {
    let app = test_app().await;
    let request = Request::post("/products/webnd-merch/quote")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"quantity":5}"#))
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let quote: Quote = json_body(response).await;
    assert_eq!(quote.quantity, 6);
    assert_eq!(quote.list_total, 2394);
    assert_eq!(quote.total, 1995);
}

#[tokio::test]
async fn placed_order_is_trackable() {
    let app = test_app().await;
    let response = app
        .clone()
        .oneshot(place_order_request(
            &order_json("WD31415", 5, 6),
            Some(("image/png", b"\x89PNG")),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    let report: SubmissionReport = json_body(response).await;
    assert_eq!(report.outcomes.len(), 6);

    let response = app
        .clone()
        .oneshot(
            Request::get("/orders/WD31415")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let order: LogicalOrder = json_body(response).await;
    assert_eq!(order.items.len(), 6);
    assert_eq!(order.items[0].position.as_deref(), Some("Secretary"));
    assert_eq!(order.items[5].position, None);
    assert_eq!(order.timeline[2].media.as_deref(), Some("/videos/webnd-print.mp4"));

    let proof_path = report
        .payment_proof_ref
        .strip_prefix("http://merch.test")
        .expect("local proof reference")
        .to_string();
    let response = app
        .oneshot(Request::get(proof_path).body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).expect("type"),
        "image/png"
    );
}

#[tokio::test]
async fn order_without_image_proof_is_rejected() {
    let app = test_app().await;

    let response = app
        .clone()
        .oneshot(place_order_request(&order_json("WD27182", 1, 1), None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(place_order_request(
            &order_json("WD27182", 1, 1),
            Some(("application/pdf", b"%PDF")),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let err: ApiError = json_body(response).await;
    assert_eq!(err.code, ErrorCode::Validation);

    let response = app
        .oneshot(
            Request::get("/orders/WD27182")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_or_malformed_order_is_not_found() {
    let app = test_app().await;
    for path in ["/orders/WD99999", "/orders/hello"] {
        let response = app
            .clone()
            .oneshot(Request::get(path).body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
    }
}

#[tokio::test]
async fn admin_reviews_each_item_once_and_exports_csv() {
    let app = test_app().await;
    let response = app
        .clone()
        .oneshot(place_order_request(
            &order_json("WD16180", 1, 1),
            Some(("image/jpeg", b"jpeg")),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(
            Request::get("/admin/orders?search=asha&status=pending")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let items: Vec<StoredOrderItem> = json_body(response).await;
    assert_eq!(items.len(), 1);
    let review_path = format!("/admin/orders/{}/review", items[0].document_id);

    let review = |accepted: bool| {
        Request::post(review_path.as_str())
            .header("content-type", "application/json")
            .body(Body::from(serde_json::json!({ "accepted": accepted }).to_string()))
            .expect("request")
    };
    let response = app.clone().oneshot(review(false)).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let reviewed: StoredOrderItem = json_body(response).await;
    assert_eq!(reviewed.record.status, OrderStatus::Rejected);

    let response = app.clone().oneshot(review(true)).await.expect("response");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .oneshot(
            Request::get("/admin/orders/export.csv?status=rejected")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(disposition.contains("webnd-orders-"), "{disposition}");
    let csv = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let csv = String::from_utf8(csv.to_vec()).expect("utf8");
    let lines: Vec<_> = csv.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with("WD16180,WebnD Merch,Asha Rao,21CS01001,NAME 0,L,Secretary,"));
    assert!(lines[1].ends_with(",rejected"));
}
