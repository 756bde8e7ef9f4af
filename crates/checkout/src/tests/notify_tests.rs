use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::Value;
use shared::{
    domain::{OrderId, ShirtSize},
    protocol::ItemForm,
};
use tokio::{net::TcpListener, sync::Mutex};

use super::*;
use crate::test_support::{buyer, product};

fn summary(quantity: u32) -> OrderSummary {
    let mut buyer = buyer();
    buyer.name = "Asha <Rao>".into();
    let items = (0..quantity)
        .map(|index| ItemForm {
            printed_name: format!("NAME {index}"),
            size: Some(ShirtSize::Xl),
            position: Some("Secretary".into()),
        })
        .collect();
    OrderSummary::new(OrderId("WD13579".into()), &product(), quantity, buyer, items)
}

#[test]
fn confirmation_addresses_the_buyer() {
    let email = ConfirmationEmail::render(&summary(1), "https://merch.example.org/track/WD13579");
    assert_eq!(email.to, "21cs01001@iitbbs.ac.in");
    assert_eq!(email.subject, CONFIRMATION_SUBJECT);
    assert_eq!(email.from_name, SENDER_NAME);
    assert!(email.text_body.contains("Order WD13579"));
    assert!(email
        .text_body
        .contains("Track your order: https://merch.example.org/track/WD13579"));
}

#[test]
fn html_escapes_buyer_input_and_shows_discount() {
    let email = ConfirmationEmail::render(&summary(6), "https://merch.example.org/track/WD13579");
    assert!(email.html_body.contains("Asha &lt;Rao&gt;"));
    assert!(!email.html_body.contains("<Rao>"));
    assert!(email.html_body.contains("<s>&#8377;2394</s> &#8377;1995"));
    assert_eq!(email.html_body.matches("Position: Secretary").count(), 1);
}

#[derive(Clone, Default)]
struct RelayState {
    received: Arc<Mutex<Vec<Value>>>,
}

async fn accept(State(state): State<RelayState>, Json(body): Json<Value>) -> StatusCode {
    state.received.lock().await.push(body);
    StatusCode::ACCEPTED
}

async fn reject() -> StatusCode {
    StatusCode::SERVICE_UNAVAILABLE
}

async fn spawn_relay(state: RelayState) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new()
        .route("/send", post(accept))
        .route("/down", post(reject))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn relay_receives_rendered_message() {
    let state = RelayState::default();
    let base = spawn_relay(state.clone()).await;
    let notifier =
        HttpRelayNotifier::new(format!("{base}/send"), Duration::from_secs(5)).expect("notifier");

    let email = ConfirmationEmail::render(&summary(1), "https://merch.example.org/track/WD13579");
    notifier.send_confirmation(&email).await.expect("sent");

    let received = state.received.lock().await;
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["to"], "21cs01001@iitbbs.ac.in");
    assert_eq!(received[0]["subject"], CONFIRMATION_SUBJECT);
    assert_eq!(received[0]["text"], email.text_body);
}

#[tokio::test]
async fn relay_errors_are_reported_but_swallowed_by_best_effort() {
    let base = spawn_relay(RelayState::default()).await;
    let notifier =
        HttpRelayNotifier::new(format!("{base}/down"), Duration::from_secs(5)).expect("notifier");
    let email = ConfirmationEmail::render(&summary(1), "https://merch.example.org/track/WD13579");

    assert!(notifier.send_confirmation(&email).await.is_err());
    send_best_effort(&notifier, &email, &CallPolicy::default()).await;
    send_best_effort(&LogNotifier, &email, &CallPolicy::default()).await;
}
