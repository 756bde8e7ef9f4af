use std::{fmt::Write as _, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    retry::CallPolicy,
    summary::{first_item_position, OrderSummary},
};

pub const CONFIRMATION_SUBJECT: &str = "Your WebnD Merch Order Summary";
pub const SENDER_NAME: &str = "WebnD Merch Store";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmationEmail {
    pub to: String,
    pub from_name: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

impl ConfirmationEmail {
    pub fn render(summary: &OrderSummary, tracking_url: &str) -> Self {
        let mut text_body = summary.render_text();
        let _ = writeln!(text_body);
        let _ = writeln!(text_body, "Track your order: {tracking_url}");

        Self {
            to: summary.buyer.email.clone(),
            from_name: SENDER_NAME.to_string(),
            subject: CONFIRMATION_SUBJECT.to_string(),
            text_body,
            html_body: render_html(summary, tracking_url),
        }
    }
}

fn render_html(summary: &OrderSummary, tracking_url: &str) -> String {
    let buyer = &summary.buyer;
    let mut html = String::new();
    let _ = write!(
        html,
        "<h2>Thank you for your order, {}!</h2><p>Order ID: <strong>{}</strong></p>",
        escape_html(&buyer.name),
        summary.order_id
    );
    let _ = write!(
        html,
        "<h3>Customer Information</h3><ul>\
         <li>Name: {}</li><li>Roll Number: {}</li><li>Degree: {}</li>\
         <li>Year: {}</li><li>Hostel: {}</li><li>WebnD Member: {}</li></ul>",
        escape_html(&buyer.name),
        escape_html(&buyer.roll_number),
        escape_html(&buyer.degree),
        escape_html(&buyer.year),
        escape_html(&buyer.hostel),
        if buyer.is_member { "Yes" } else { "No" }
    );

    let price = if summary.discounted() {
        format!("<s>&#8377;{}</s> &#8377;{}", summary.list_total, summary.total)
    } else {
        format!("&#8377;{}", summary.total)
    };
    let _ = write!(
        html,
        "<h3>Order Details</h3><p>{} &times; {}: {price}</p><h3>T-shirt Details</h3><ol>",
        escape_html(&summary.product_name),
        summary.quantity
    );
    for (index, item) in summary.items.iter().enumerate() {
        let size = item.size.map(|s| s.as_str()).unwrap_or("-");
        let _ = write!(html, "<li>{} ({size})", escape_html(&item.printed_name));
        if let Some(position) = first_item_position(index, item) {
            let _ = write!(html, " &middot; Position: {}", escape_html(position));
        }
        let _ = write!(html, "</li>");
    }
    let _ = write!(
        html,
        "</ol><p><a href=\"{0}\">Track your order</a></p>",
        escape_html(tracking_url)
    );
    html
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[async_trait]
pub trait OrderNotifier: Send + Sync {
    async fn send_confirmation(&self, email: &ConfirmationEmail) -> Result<()>;
}

/// Writes confirmations to the log instead of delivering them.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl OrderNotifier for LogNotifier {
    async fn send_confirmation(&self, email: &ConfirmationEmail) -> Result<()> {
        info!(to = %email.to, subject = %email.subject, "confirmation email (not delivered)");
        Ok(())
    }
}

/// Hands confirmations to an HTTP mail relay as JSON.
#[derive(Clone)]
pub struct HttpRelayNotifier {
    http: Client,
    relay_url: String,
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    to: &'a str,
    from_name: &'a str,
    subject: &'a str,
    text: &'a str,
    html: &'a str,
}

impl HttpRelayNotifier {
    pub fn new(relay_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build mail relay http client")?;
        Ok(Self {
            http,
            relay_url: relay_url.into(),
        })
    }
}

#[async_trait]
impl OrderNotifier for HttpRelayNotifier {
    async fn send_confirmation(&self, email: &ConfirmationEmail) -> Result<()> {
        self.http
            .post(&self.relay_url)
            .json(&RelayMessage {
                to: &email.to,
                from_name: &email.from_name,
                subject: &email.subject,
                text: &email.text_body,
                html: &email.html_body,
            })
            .send()
            .await
            .context("mail relay request failed")?
            .error_for_status()
            .context("mail relay rejected the message")?;
        Ok(())
    }
}

/// Confirmation mail never affects the outcome of an order.
pub async fn send_best_effort(
    notifier: &dyn OrderNotifier,
    email: &ConfirmationEmail,
    policy: &CallPolicy,
) {
    match policy
        .run("confirmation email", 1, || notifier.send_confirmation(email))
        .await
    {
        Ok(()) => info!(to = %email.to, "confirmation email sent"),
        Err(err) => warn!(to = %email.to, error = %err, "confirmation email failed"),
    }
}

#[cfg(test)]
#[path = "tests/notify_tests.rs"]
mod tests;
