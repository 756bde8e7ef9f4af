//! In-memory backends shared by the checkout unit tests.

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{
    catalog::default_catalog,
    domain::{DocumentId, OrderItemRecord, OrderStatus, Product, StoredOrderItem},
};
use storage::{ItemQuery, OrderDocuments, ProofStorage, ProofUpload};

use crate::{
    buyer::VerifiedBuyer,
    notify::{ConfirmationEmail, OrderNotifier},
    retry::CallPolicy,
    submission::CheckoutServices,
};

pub const PROOF_REF: &str = "https://files.example.org/proofs/proof-1";

#[derive(Default)]
pub struct FakeDocuments {
    records: Mutex<Vec<(DocumentId, OrderItemRecord)>>,
    fail_at: HashSet<usize>,
    calls: AtomicUsize,
}

impl FakeDocuments {
    /// Create calls whose zero-based call number is in `fail_at` fail.
    pub fn failing_at(fail_at: impl IntoIterator<Item = usize>) -> Self {
        Self {
            fail_at: fail_at.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<OrderItemRecord> {
        self.records
            .lock()
            .expect("records lock")
            .iter()
            .map(|(_, record)| record.clone())
            .collect()
    }

    pub fn create_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderDocuments for FakeDocuments {
    async fn create_item(&self, record: &OrderItemRecord) -> Result<DocumentId> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_at.contains(&call) {
            return Err(anyhow!("database unavailable"));
        }
        let document_id = DocumentId(format!("doc-{call}"));
        self.records
            .lock()
            .expect("records lock")
            .push((document_id.clone(), record.clone()));
        Ok(document_id)
    }

    async fn list_items(&self, query: &ItemQuery) -> Result<Vec<StoredOrderItem>> {
        let records = self.records.lock().expect("records lock");
        Ok(records
            .iter()
            .filter(|(_, record)| match query {
                ItemQuery::All { .. } => true,
                ItemQuery::ByOrder(order_id) => &record.order_id == order_id,
            })
            .map(|(document_id, record)| StoredOrderItem {
                document_id: document_id.clone(),
                record: record.clone(),
            })
            .collect())
    }

    async fn get_item(&self, document_id: &DocumentId) -> Result<Option<StoredOrderItem>> {
        let records = self.records.lock().expect("records lock");
        Ok(records
            .iter()
            .find(|(id, _)| id == document_id)
            .map(|(document_id, record)| StoredOrderItem {
                document_id: document_id.clone(),
                record: record.clone(),
            }))
    }

    async fn review_pending(&self, document_id: &DocumentId, status: OrderStatus) -> Result<bool> {
        let mut records = self.records.lock().expect("records lock");
        match records
            .iter_mut()
            .find(|(id, record)| id == document_id && record.status == OrderStatus::Pending)
        {
            Some((_, record)) => {
                record.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct FakeProofs {
    uploads: AtomicUsize,
    fail: bool,
    first_call_delay: Option<Duration>,
}

impl FakeProofs {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// The first upload stalls for `delay` before succeeding.
    pub fn slow_first(delay: Duration) -> Self {
        Self {
            first_call_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProofStorage for FakeProofs {
    async fn upload_proof(&self, _proof: &ProofUpload) -> Result<String> {
        let call = self.uploads.fetch_add(1, Ordering::SeqCst);
        if let (0, Some(delay)) = (call, self.first_call_delay) {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(anyhow!("bucket unreachable"));
        }
        Ok(PROOF_REF.to_string())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<ConfirmationEmail>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<ConfirmationEmail> {
        self.sent.lock().expect("sent lock").clone()
    }
}

#[async_trait]
impl OrderNotifier for RecordingNotifier {
    async fn send_confirmation(&self, email: &ConfirmationEmail) -> Result<()> {
        self.sent.lock().expect("sent lock").push(email.clone());
        if self.fail {
            return Err(anyhow!("smtp refused"));
        }
        Ok(())
    }
}

pub fn product() -> Product {
    default_catalog().remove(0)
}

pub fn buyer() -> VerifiedBuyer {
    VerifiedBuyer {
        name: "Asha Rao".into(),
        roll_number: "21CS01001".into(),
        email: "21cs01001@iitbbs.ac.in".into(),
        degree: "B.Tech".into(),
        year: "3".into(),
        hostel: "MHR".into(),
        is_member: true,
    }
}

pub fn proof() -> ProofUpload {
    ProofUpload {
        file_name: "upi.png".into(),
        content_type: "image/png".into(),
        bytes: b"\x89PNG".to_vec(),
    }
}

pub fn services(
    documents: Arc<FakeDocuments>,
    proofs: Arc<FakeProofs>,
    notifier: Arc<RecordingNotifier>,
) -> CheckoutServices {
    CheckoutServices {
        documents,
        proofs,
        notifier,
        policy: CallPolicy::default(),
        tracking_base_url: "https://merch.example.org".into(),
    }
}
