//! Appwrite REST backend: merch requests live in one database collection,
//! payment proofs in one storage bucket.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{multipart, Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use shared::domain::{DocumentId, OrderId, OrderItemRecord, OrderStatus, ShirtSize, StoredOrderItem};

use crate::{ItemQuery, OrderDocuments, ProofStorage, ProofUpload};

const UNIQUE_ID: &str = "unique()";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppwriteConfig {
    /// API root, e.g. `https://cloud.appwrite.io/v1`.
    pub endpoint: String,
    pub project_id: String,
    pub api_key: String,
    pub database_id: String,
    pub collection_id: String,
    pub bucket_id: String,
}

#[derive(Clone)]
pub struct AppwriteClient {
    http: Client,
    config: AppwriteConfig,
}

/// Document body as stored in the merch collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MerchData {
    id: String,
    #[serde(rename = "type")]
    product_type: String,
    user_name: String,
    user_email: String,
    user_roll: String,
    name_to_print: String,
    size: String,
    #[serde(default)]
    position: Option<String>,
    payment: String,
    #[serde(default)]
    member: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MerchDocument {
    #[serde(rename = "$id")]
    document_id: String,
    #[serde(flatten)]
    data: MerchData,
}

#[derive(Debug, Deserialize)]
struct DocumentList {
    documents: Vec<MerchDocument>,
}

#[derive(Debug, Deserialize)]
struct CreatedResource {
    #[serde(rename = "$id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct AppwriteErrorBody {
    message: String,
}

impl MerchData {
    fn from_record(record: &OrderItemRecord) -> Self {
        Self {
            id: record.order_id.to_string(),
            product_type: record.product_type.clone(),
            user_name: record.buyer_name.clone(),
            user_email: record.buyer_email.clone(),
            user_roll: record.buyer_roll_number.clone(),
            name_to_print: record.printed_name.clone(),
            size: record.size.to_string(),
            position: Some(record.position.clone().unwrap_or_default()),
            payment: record.payment_proof_ref.clone(),
            member: record.is_member,
            status: record.status.to_stored().map(str::to_string),
        }
    }

    fn into_record(self) -> Result<OrderItemRecord> {
        Ok(OrderItemRecord {
            size: self
                .size
                .parse::<ShirtSize>()
                .with_context(|| format!("order {} has a corrupt size", self.id))?,
            status: OrderStatus::from_stored(self.status.as_deref())
                .with_context(|| format!("order {} has a corrupt status", self.id))?,
            order_id: OrderId(self.id),
            product_type: self.product_type,
            buyer_name: self.user_name,
            buyer_email: self.user_email,
            buyer_roll_number: self.user_roll,
            printed_name: self.name_to_print,
            position: self.position.filter(|p| !p.trim().is_empty()),
            payment_proof_ref: self.payment,
            is_member: self.member,
        })
    }
}

impl MerchDocument {
    fn into_stored(self) -> Result<StoredOrderItem> {
        Ok(StoredOrderItem {
            document_id: DocumentId(self.document_id),
            record: self.data.into_record()?,
        })
    }
}

impl AppwriteClient {
    pub fn new(config: AppwriteConfig, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build appwrite http client")?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &AppwriteConfig {
        &self.config
    }

    fn endpoint(&self) -> &str {
        self.config.endpoint.trim_end_matches('/')
    }

    fn documents_url(&self) -> String {
        format!(
            "{}/databases/{}/collections/{}/documents",
            self.endpoint(),
            self.config.database_id,
            self.config.collection_id
        )
    }

    fn files_url(&self) -> String {
        format!(
            "{}/storage/buckets/{}/files",
            self.endpoint(),
            self.config.bucket_id
        )
    }

    /// Public view link for an uploaded file.
    pub fn file_view_url(&self, file_id: &str) -> String {
        format!(
            "{}/{file_id}/view?project={}",
            self.files_url(),
            self.config.project_id
        )
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("X-Appwrite-Project", &self.config.project_id)
            .header("X-Appwrite-Key", &self.config.api_key)
    }
}

fn list_queries(query: &ItemQuery) -> Vec<(&'static str, String)> {
    let query = match query {
        ItemQuery::All { limit } => json!({ "method": "limit", "values": [limit] }),
        ItemQuery::ByOrder(order_id) => json!({
            "method": "equal",
            "attribute": "id",
            "values": [order_id.as_str()],
        }),
    };
    vec![("queries[]", query.to_string())]
}

async fn ensure_success(response: Response, action: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = match response.json::<AppwriteErrorBody>().await {
        Ok(body) => body.message,
        Err(_) => status.to_string(),
    };
    Err(anyhow!("appwrite {action} failed ({status}): {message}"))
}

#[async_trait]
impl OrderDocuments for AppwriteClient {
    async fn create_item(&self, record: &OrderItemRecord) -> Result<DocumentId> {
        let body = json!({
            "documentId": UNIQUE_ID,
            "data": MerchData::from_record(record),
        });
        let response = self
            .authed(self.http.post(self.documents_url()))
            .json(&body)
            .send()
            .await
            .context("appwrite create document request failed")?;
        let created: CreatedResource = ensure_success(response, "create document")
            .await?
            .json()
            .await?;
        debug!(order_id = %record.order_id, document_id = %created.id, "appwrite document created");
        Ok(DocumentId(created.id))
    }

    async fn list_items(&self, query: &ItemQuery) -> Result<Vec<StoredOrderItem>> {
        let response = self
            .authed(self.http.get(self.documents_url()))
            .query(&list_queries(query))
            .send()
            .await
            .context("appwrite list documents request failed")?;
        let list: DocumentList = ensure_success(response, "list documents")
            .await?
            .json()
            .await?;
        // documents written before sizes were validated can carry blank or
        // unknown values; they are left out instead of failing the listing
        let items = list
            .documents
            .into_iter()
            .filter_map(|document| {
                let document_id = document.document_id.clone();
                match document.into_stored() {
                    Ok(item) => Some(item),
                    Err(err) => {
                        warn!(%document_id, error = %format!("{err:#}"), "skipping undecodable appwrite document");
                        None
                    }
                }
            })
            .collect();
        Ok(items)
    }

    async fn get_item(&self, document_id: &DocumentId) -> Result<Option<StoredOrderItem>> {
        let response = self
            .authed(
                self.http
                    .get(format!("{}/{}", self.documents_url(), document_id)),
            )
            .send()
            .await
            .context("appwrite get document request failed")?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let document: MerchDocument = ensure_success(response, "get document")
            .await?
            .json()
            .await?;
        document.into_stored().map(Some)
    }

    /// Appwrite has no conditional update, so the pending check and the
    /// patch are two requests.
    async fn review_pending(&self, document_id: &DocumentId, status: OrderStatus) -> Result<bool> {
        match self.get_item(document_id).await? {
            Some(item) if item.record.status == OrderStatus::Pending => {}
            _ => return Ok(false),
        }
        let response = self
            .authed(
                self.http
                    .patch(format!("{}/{}", self.documents_url(), document_id)),
            )
            .json(&json!({ "data": { "status": status.to_stored() } }))
            .send()
            .await
            .context("appwrite update document request failed")?;
        ensure_success(response, "update document").await?;
        Ok(true)
    }
}

#[async_trait]
impl ProofStorage for AppwriteClient {
    async fn upload_proof(&self, proof: &ProofUpload) -> Result<String> {
        let part = multipart::Part::bytes(proof.bytes.clone())
            .file_name(proof.file_name.clone())
            .mime_str(&proof.content_type)
            .context("invalid proof content type")?;
        let form = multipart::Form::new()
            .text("fileId", UNIQUE_ID)
            .part("file", part);
        let response = self
            .authed(self.http.post(self.files_url()))
            .multipart(form)
            .send()
            .await
            .context("appwrite file upload request failed")?;
        let created: CreatedResource = ensure_success(response, "file upload")
            .await?
            .json()
            .await?;
        Ok(self.file_view_url(&created.id))
    }
}

#[cfg(test)]
#[path = "tests/appwrite_tests.rs"]
mod tests;
