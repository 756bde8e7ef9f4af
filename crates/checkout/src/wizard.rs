use shared::{
    domain::{OrderId, Product, ShirtSize},
    protocol::{ItemForm, SubmissionReport},
};
use storage::ProofUpload;
use tracing::{debug, info};

use crate::{
    buyer::VerifiedBuyer,
    error::{SubmitError, ValidationError},
    payment::{Payee, PaymentRequest},
    quantity::QuantitySelection,
    submission::{validate_proof, CheckoutServices, ItemDetails, OrderDraft},
    summary::OrderSummary,
};

/// Screen shown for a step index. With `n` items the steps are
/// `Welcome, Item 0..n-1, Summary, Payment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    Welcome,
    Item { index: usize },
    Summary,
    Payment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionPhase {
    Editing,
    Submitting,
    Submitted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemField {
    PrintedName(String),
    Size(ShirtSize),
    /// Only accepted for the first item.
    Position(String),
}

/// In-memory checkout state for one order. Nothing is persisted until
/// [`CheckoutWizard::submit`] succeeds in uploading the payment proof, so
/// dropping the wizard earlier leaves no trace.
#[derive(Debug, Clone)]
pub struct CheckoutWizard {
    order_id: OrderId,
    product: Product,
    selection: QuantitySelection,
    buyer: VerifiedBuyer,
    step: usize,
    items: Vec<ItemForm>,
    proof: Option<ProofUpload>,
    phase: SubmissionPhase,
    report: Option<SubmissionReport>,
}

impl CheckoutWizard {
    pub fn new(product: Product, selection: QuantitySelection, buyer: VerifiedBuyer) -> Self {
        Self::with_order_id(OrderId::generate(), product, selection, buyer)
    }

    pub fn with_order_id(
        order_id: OrderId,
        product: Product,
        selection: QuantitySelection,
        buyer: VerifiedBuyer,
    ) -> Self {
        let quantity = selection.quantity() as usize;
        debug!(%order_id, quantity, "checkout wizard opened");
        Self {
            order_id,
            product,
            selection,
            buyer,
            step: 0,
            items: vec![ItemForm::default(); quantity],
            proof: None,
            phase: SubmissionPhase::Editing,
            report: None,
        }
    }

    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    pub fn product(&self) -> &Product {
        &self.product
    }

    pub fn buyer(&self) -> &VerifiedBuyer {
        &self.buyer
    }

    pub fn selection(&self) -> QuantitySelection {
        self.selection
    }

    pub fn quantity(&self) -> u32 {
        self.selection.quantity()
    }

    pub fn total_steps(&self) -> usize {
        self.items.len() + 3
    }

    pub fn step_index(&self) -> usize {
        self.step
    }

    pub fn current_step(&self) -> WizardStep {
        let quantity = self.items.len();
        match self.step {
            0 => WizardStep::Welcome,
            step if step <= quantity => WizardStep::Item { index: step - 1 },
            step if step == quantity + 1 => WizardStep::Summary,
            _ => WizardStep::Payment,
        }
    }

    pub fn is_last_step(&self) -> bool {
        self.step + 1 == self.total_steps()
    }

    /// Advances one step. Leaving an item step requires that item to be
    /// complete. Stays put on the last step and once a submission started.
    pub fn next(&mut self) -> Result<WizardStep, ValidationError> {
        if self.phase != SubmissionPhase::Editing {
            return Ok(self.current_step());
        }
        if let WizardStep::Item { index } = self.current_step() {
            ItemDetails::from_form(index, &self.items[index])?;
        }
        if !self.is_last_step() {
            self.step += 1;
        }
        Ok(self.current_step())
    }

    pub fn prev(&mut self) -> WizardStep {
        if self.phase == SubmissionPhase::Editing && self.step > 0 {
            self.step -= 1;
        }
        self.current_step()
    }

    pub fn items(&self) -> &[ItemForm] {
        &self.items
    }

    pub fn item(&self, index: usize) -> Option<&ItemForm> {
        self.items.get(index)
    }

    /// Replaces one field of one item; every other item is left as is.
    pub fn update_item(&mut self, index: usize, field: ItemField) -> Result<(), ValidationError> {
        self.ensure_editable()?;
        let quantity = self.quantity();
        let item = self
            .items
            .get_mut(index)
            .ok_or(ValidationError::ItemOutOfRange { index, quantity })?;
        match field {
            ItemField::PrintedName(name) => item.printed_name = name,
            ItemField::Size(size) => item.size = Some(size),
            ItemField::Position(position) => {
                if index != 0 {
                    return Err(ValidationError::PositionNotAllowed { index });
                }
                item.position = Some(position);
            }
        }
        Ok(())
    }

    pub fn attach_proof(&mut self, proof: ProofUpload) -> Result<(), ValidationError> {
        self.ensure_editable()?;
        validate_proof(&proof)?;
        self.proof = Some(proof);
        Ok(())
    }

    pub fn clear_proof(&mut self) -> Result<(), ValidationError> {
        self.ensure_editable()?;
        self.proof = None;
        Ok(())
    }

    pub fn has_proof(&self) -> bool {
        self.proof.is_some()
    }

    /// Whether the submit action should be enabled right now.
    pub fn can_submit(&self) -> bool {
        self.phase == SubmissionPhase::Editing
            && self.current_step() == WizardStep::Payment
            && self.proof.is_some()
    }

    pub fn summary(&self) -> OrderSummary {
        OrderSummary::new(
            self.order_id.clone(),
            &self.product,
            self.quantity(),
            self.buyer.clone(),
            self.items.clone(),
        )
    }

    pub fn payment_request(&self, payee: &Payee) -> PaymentRequest {
        PaymentRequest::for_order(payee, &self.summary())
    }

    pub fn phase(&self) -> SubmissionPhase {
        self.phase
    }

    pub fn report(&self) -> Option<&SubmissionReport> {
        self.report.as_ref()
    }

    /// Locks the wizard and hands out the validated order. Must be followed
    /// by either [`complete_submission`](Self::complete_submission) or
    /// [`abort_submission`](Self::abort_submission).
    pub fn begin_submission(&mut self) -> Result<OrderDraft, SubmitError> {
        match self.phase {
            SubmissionPhase::Submitting => {
                return Err(SubmitError::InFlight(self.order_id.clone()))
            }
            SubmissionPhase::Submitted => {
                return Err(SubmitError::AlreadySubmitted(self.order_id.clone()))
            }
            SubmissionPhase::Editing => {}
        }
        if self.current_step() != WizardStep::Payment {
            return Err(ValidationError::NotOnPaymentStep.into());
        }
        if self.proof.is_none() {
            return Err(ValidationError::MissingPaymentProof.into());
        }

        let draft = OrderDraft::new(
            self.order_id.clone(),
            self.product.clone(),
            self.quantity(),
            self.buyer.clone(),
            &self.items,
            self.proof.clone(),
        )?;
        self.phase = SubmissionPhase::Submitting;
        Ok(draft)
    }

    /// The wizard is terminal after this, whatever the per-item outcomes were.
    pub fn complete_submission(&mut self, report: SubmissionReport) {
        info!(
            order_id = %self.order_id,
            status = ?report.status(),
            "checkout submitted"
        );
        self.phase = SubmissionPhase::Submitted;
        self.report = Some(report);
    }

    /// Returns to editing after a failure that persisted nothing.
    pub fn abort_submission(&mut self) {
        if self.phase == SubmissionPhase::Submitting {
            self.phase = SubmissionPhase::Editing;
        }
    }

    pub async fn submit(
        &mut self,
        services: &CheckoutServices,
    ) -> Result<SubmissionReport, SubmitError> {
        let draft = self.begin_submission()?;
        match services.place_order(&draft).await {
            Ok(report) => {
                self.complete_submission(report.clone());
                Ok(report)
            }
            Err(err) => {
                self.abort_submission();
                Err(err)
            }
        }
    }

    fn ensure_editable(&self) -> Result<(), ValidationError> {
        if self.phase == SubmissionPhase::Editing {
            Ok(())
        } else {
            Err(ValidationError::SubmissionLocked)
        }
    }
}

#[cfg(test)]
#[path = "tests/wizard_tests.rs"]
mod tests;
