use std::sync::Arc;

use shared::{
    domain::{OrderId, OrderItemRecord, OrderStatus, Product, ShirtSize},
    protocol::{ItemForm, ItemOutcome, SubmissionReport, SubmissionStatus},
};
use storage::{OrderDocuments, ProofStorage, ProofUpload};
use tracing::{error, info, warn};

use crate::{
    buyer::VerifiedBuyer,
    error::{SubmitError, ValidationError},
    notify::{send_best_effort, ConfirmationEmail, OrderNotifier},
    retry::CallPolicy,
    summary::{first_item_position, OrderSummary},
};

/// Customization of one item after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDetails {
    pub printed_name: String,
    pub size: ShirtSize,
    pub position: Option<String>,
}

impl ItemDetails {
    pub fn from_form(index: usize, form: &ItemForm) -> Result<Self, ValidationError> {
        let printed_name = form.printed_name.trim();
        if printed_name.is_empty() {
            return Err(ValidationError::MissingPrintedName { index });
        }
        let size = form.size.ok_or(ValidationError::MissingSize { index })?;
        let position = form
            .position
            .as_deref()
            .map(str::trim)
            .filter(|position| !position.is_empty());
        if index != 0 && position.is_some() {
            return Err(ValidationError::PositionNotAllowed { index });
        }

        Ok(Self {
            printed_name: printed_name.to_string(),
            size,
            position: position.map(str::to_string),
        })
    }
}

impl From<&ItemDetails> for ItemForm {
    fn from(details: &ItemDetails) -> Self {
        ItemForm {
            printed_name: details.printed_name.clone(),
            size: Some(details.size),
            position: details.position.clone(),
        }
    }
}

/// A fully validated order, ready to be handed to the submission protocol.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub order_id: OrderId,
    pub product: Product,
    pub buyer: VerifiedBuyer,
    pub items: Vec<ItemDetails>,
    pub proof: ProofUpload,
}

impl OrderDraft {
    pub fn new(
        order_id: OrderId,
        product: Product,
        quantity: u32,
        buyer: VerifiedBuyer,
        items: &[ItemForm],
        proof: Option<ProofUpload>,
    ) -> Result<Self, ValidationError> {
        if items.is_empty() || items.len() != quantity as usize {
            return Err(ValidationError::ItemCountMismatch {
                expected: quantity,
                actual: items.len(),
            });
        }
        let items = items
            .iter()
            .enumerate()
            .map(|(index, form)| ItemDetails::from_form(index, form))
            .collect::<Result<Vec<_>, _>>()?;
        let proof = proof.ok_or(ValidationError::MissingPaymentProof)?;
        validate_proof(&proof)?;

        Ok(Self {
            order_id,
            product,
            buyer,
            items,
            proof,
        })
    }

    pub fn quantity(&self) -> u32 {
        self.items.len() as u32
    }

    pub fn summary(&self) -> OrderSummary {
        OrderSummary::new(
            self.order_id.clone(),
            &self.product,
            self.quantity(),
            self.buyer.clone(),
            self.items.iter().map(ItemForm::from).collect(),
        )
    }

    fn record_for(&self, index: usize, item: &ItemDetails, payment_proof_ref: &str) -> OrderItemRecord {
        OrderItemRecord {
            order_id: self.order_id.clone(),
            product_type: self.product.name.clone(),
            buyer_name: self.buyer.name.clone(),
            buyer_email: self.buyer.email.clone(),
            buyer_roll_number: self.buyer.roll_number.clone(),
            printed_name: item.printed_name.clone(),
            size: item.size,
            position: first_item_position(index, &ItemForm::from(item)).map(str::to_string),
            payment_proof_ref: payment_proof_ref.to_string(),
            is_member: self.buyer.is_member,
            status: OrderStatus::Pending,
        }
    }
}

pub(crate) fn validate_proof(proof: &ProofUpload) -> Result<(), ValidationError> {
    if proof.bytes.is_empty() {
        return Err(ValidationError::EmptyPaymentProof);
    }
    if !proof.content_type.trim().starts_with("image/") {
        return Err(ValidationError::ProofNotImage(proof.content_type.clone()));
    }
    Ok(())
}

/// Uploads the proof exactly once, then creates one record per item in
/// order, all pointing at the same proof reference.
///
/// An upload failure aborts before anything is persisted. A failed create is
/// recorded in the report and the remaining items are still attempted;
/// earlier items are never rolled back.
pub async fn submit_order(
    draft: &OrderDraft,
    documents: &dyn OrderDocuments,
    proofs: &dyn ProofStorage,
    policy: &CallPolicy,
) -> Result<SubmissionReport, SubmitError> {
    let order_id = &draft.order_id;

    let payment_proof_ref = policy
        .run("proof upload", policy.upload_attempts, || {
            proofs.upload_proof(&draft.proof)
        })
        .await
        .map_err(|err| {
            error!(%order_id, error = %err, "payment proof upload failed, nothing persisted");
            SubmitError::Upload {
                message: format!("{err:#}"),
            }
        })?;
    info!(%order_id, proof = %payment_proof_ref, "payment proof uploaded");

    let mut outcomes = Vec::with_capacity(draft.items.len());
    for (index, item) in draft.items.iter().enumerate() {
        let record = draft.record_for(index, item, &payment_proof_ref);
        let outcome = match policy
            .run("item create", policy.create_attempts, || {
                documents.create_item(&record)
            })
            .await
        {
            Ok(document_id) => {
                info!(%order_id, index, %document_id, "order item persisted");
                ItemOutcome::Persisted { index, document_id }
            }
            Err(err) => {
                warn!(%order_id, index, error = %err, "order item could not be persisted");
                ItemOutcome::Failed {
                    index,
                    message: format!("{err:#}"),
                }
            }
        };
        outcomes.push(outcome);
    }

    let report = SubmissionReport {
        order_id: order_id.clone(),
        payment_proof_ref,
        outcomes,
    };
    if report.status() != SubmissionStatus::Complete {
        warn!(
            %order_id,
            persisted = report.persisted().count(),
            failed = report.failed().count(),
            "order only partially persisted"
        );
    }
    Ok(report)
}

/// Backends and policies a checkout needs to place an order.
#[derive(Clone)]
pub struct CheckoutServices {
    pub documents: Arc<dyn OrderDocuments>,
    pub proofs: Arc<dyn ProofStorage>,
    pub notifier: Arc<dyn OrderNotifier>,
    pub policy: CallPolicy,
    pub tracking_base_url: String,
}

impl CheckoutServices {
    pub fn tracking_url(&self, order_id: &OrderId) -> String {
        format!(
            "{}/track/{order_id}",
            self.tracking_base_url.trim_end_matches('/')
        )
    }

    /// Runs the submission protocol, then mails the buyer a confirmation if
    /// anything was persisted. Mail failures are logged and swallowed.
    pub async fn place_order(&self, draft: &OrderDraft) -> Result<SubmissionReport, SubmitError> {
        let report = submit_order(
            draft,
            self.documents.as_ref(),
            self.proofs.as_ref(),
            &self.policy,
        )
        .await?;

        if report.status() != SubmissionStatus::NothingPersisted {
            let email = ConfirmationEmail::render(
                &draft.summary(),
                &self.tracking_url(&draft.order_id),
            );
            send_best_effort(self.notifier.as_ref(), &email, &self.policy).await;
        }
        Ok(report)
    }
}

#[cfg(test)]
#[path = "tests/submission_tests.rs"]
mod tests;
