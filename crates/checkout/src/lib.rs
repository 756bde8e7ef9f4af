//! Checkout flow for the merch storefront: buyer validation, quantity and
//! promotion handling, the step-by-step wizard, and the submission protocol
//! that turns a finished wizard into persisted item records.

mod buyer;
mod error;
mod notify;
mod payment;
mod quantity;
mod retry;
mod submission;
mod summary;
mod wizard;

pub use buyer::{institutional_email, VerifiedBuyer};
pub use error::{SubmitError, ValidationError};
pub use notify::{
    send_best_effort, ConfirmationEmail, HttpRelayNotifier, LogNotifier, OrderNotifier,
};
pub use payment::{Payee, PaymentRequest};
pub use quantity::{quote, QuantitySelection, PROMOTION_NOTICE};
pub use retry::CallPolicy;
pub use submission::{submit_order, CheckoutServices, ItemDetails, OrderDraft};
pub use summary::OrderSummary;
pub use wizard::{CheckoutWizard, ItemField, SubmissionPhase, WizardStep};

#[cfg(test)]
mod test_support;
