use shared::domain::OrderId;
use thiserror::Error;

/// Local, recoverable problems that block forward progress in the wizard.
/// None of these ever reach a storage call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing buyer field: {0}")]
    MissingBuyerField(&'static str),
    #[error("unsupported quantity {0}; choose 1 or 5")]
    UnsupportedQuantity(u32),
    #[error("item #{} needs a name to print", .index + 1)]
    MissingPrintedName { index: usize },
    #[error("item #{} needs a size", .index + 1)]
    MissingSize { index: usize },
    #[error("a position can only be printed on the first item, not item #{}", .index + 1)]
    PositionNotAllowed { index: usize },
    #[error("item index {index} is out of range for {quantity} items")]
    ItemOutOfRange { index: usize, quantity: u32 },
    #[error("expected details for {expected} items, got {actual}")]
    ItemCountMismatch { expected: u32, actual: usize },
    #[error("payment proof is required")]
    MissingPaymentProof,
    #[error("payment proof is empty")]
    EmptyPaymentProof,
    #[error("payment proof must be an image, got {0:?}")]
    ProofNotImage(String),
    #[error("the order can only be submitted from the payment step")]
    NotOnPaymentStep,
    #[error("the order has already been submitted")]
    SubmissionLocked,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Nothing was persisted; the buyer may retry.
    #[error("payment proof upload failed: {message}")]
    Upload { message: String },
    #[error("order {0} was already submitted")]
    AlreadySubmitted(OrderId),
    #[error("a submission for order {0} is already in flight")]
    InFlight(OrderId),
}
