use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use uuid::Uuid;

use shared::domain::{DocumentId, OrderId, OrderItemRecord, OrderStatus, ShirtSize, StoredOrderItem};

pub mod appwrite;

pub use appwrite::{AppwriteClient, AppwriteConfig};

/// Upper bound on records returned by an unfiltered listing.
pub const DEFAULT_LIST_LIMIT: u32 = 400;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemQuery {
    All { limit: u32 },
    ByOrder(OrderId),
}

impl ItemQuery {
    pub fn all() -> Self {
        ItemQuery::All {
            limit: DEFAULT_LIST_LIMIT,
        }
    }
}

/// Image evidencing a manual payment, as received from the buyer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct StoredProof {
    pub proof_id: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Document store holding one record per ordered item.
#[async_trait]
pub trait OrderDocuments: Send + Sync {
    async fn create_item(&self, record: &OrderItemRecord) -> Result<DocumentId>;
    /// Records in the order the backend returns them.
    async fn list_items(&self, query: &ItemQuery) -> Result<Vec<StoredOrderItem>>;
    async fn get_item(&self, document_id: &DocumentId) -> Result<Option<StoredOrderItem>>;
    /// Moves a pending item to `status`. Returns `false` when the item is
    /// missing or was already reviewed, in which case nothing changes.
    async fn review_pending(&self, document_id: &DocumentId, status: OrderStatus) -> Result<bool>;

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Object storage for payment proofs. `upload_proof` returns a stable
/// reference that is copied verbatim into every item record of the order.
#[async_trait]
pub trait ProofStorage: Send + Sync {
    async fn upload_proof(&self, proof: &ProofUpload) -> Result<String>;

    /// Only backends that serve proofs themselves return anything here.
    async fn load_proof(&self, _proof_id: &str) -> Result<Option<StoredProof>> {
        Ok(None)
    }
}

/// SQLite-backed document store and proof bucket.
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
    public_base_url: String,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // every pooled connection to `:memory:` would open its own database
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self {
            pool,
            public_base_url: String::new(),
        })
    }

    /// Prefix for proof references, e.g. `https://merch.example.org`.
    pub fn with_public_base_url(mut self, public_base_url: impl Into<String>) -> Self {
        self.public_base_url = public_base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub fn proof_url(&self, proof_id: &str) -> String {
        format!("{}/proofs/{proof_id}", self.public_base_url)
    }
}

#[async_trait]
impl OrderDocuments for Storage {
    async fn create_item(&self, record: &OrderItemRecord) -> Result<DocumentId> {
        let document_id = Uuid::new_v4().simple().to_string();
        sqlx::query(
            "INSERT INTO order_items (id, order_id, product_type, buyer_name, buyer_email, buyer_roll_number, printed_name, size, position, payment_proof_ref, is_member, status)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&document_id)
        .bind(record.order_id.as_str())
        .bind(&record.product_type)
        .bind(&record.buyer_name)
        .bind(&record.buyer_email)
        .bind(&record.buyer_roll_number)
        .bind(&record.printed_name)
        .bind(record.size.as_str())
        .bind(record.position.as_deref())
        .bind(&record.payment_proof_ref)
        .bind(record.is_member)
        .bind(record.status.to_stored())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to insert item for order {}", record.order_id))?;
        Ok(DocumentId(document_id))
    }

    async fn list_items(&self, query: &ItemQuery) -> Result<Vec<StoredOrderItem>> {
        let rows = match query {
            ItemQuery::All { limit } => {
                let sql = format!("{SELECT_ITEMS} ORDER BY rowid ASC LIMIT ?");
                sqlx::query(&sql)
                    .bind(i64::from(*limit))
                    .fetch_all(&self.pool)
                    .await?
            }
            ItemQuery::ByOrder(order_id) => {
                let sql = format!("{SELECT_ITEMS} WHERE order_id = ? ORDER BY rowid ASC");
                sqlx::query(&sql)
                    .bind(order_id.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.iter().map(item_from_row).collect()
    }

    async fn get_item(&self, document_id: &DocumentId) -> Result<Option<StoredOrderItem>> {
        let sql = format!("{SELECT_ITEMS} WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(document_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(item_from_row).transpose()
    }

    async fn review_pending(&self, document_id: &DocumentId, status: OrderStatus) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE order_items SET status = ? WHERE id = ? AND (status IS NULL OR status = '')",
        )
            .bind(status.to_stored())
            .bind(document_id.as_str())
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to review item {document_id}"))?;
        Ok(result.rows_affected() == 1)
    }

    async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }
}

#[async_trait]
impl ProofStorage for Storage {
    async fn upload_proof(&self, proof: &ProofUpload) -> Result<String> {
        let proof_id = Uuid::new_v4().simple().to_string();
        let size_bytes = i64::try_from(proof.bytes.len()).unwrap_or(i64::MAX);
        sqlx::query(
            "INSERT INTO payment_proofs (id, file_name, content_type, bytes, size_bytes) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&proof_id)
        .bind(&proof.file_name)
        .bind(&proof.content_type)
        .bind(&proof.bytes)
        .bind(size_bytes)
        .execute(&self.pool)
        .await
        .context("failed to store payment proof")?;
        Ok(self.proof_url(&proof_id))
    }

    async fn load_proof(&self, proof_id: &str) -> Result<Option<StoredProof>> {
        let row = sqlx::query(
            "SELECT id, file_name, content_type, bytes FROM payment_proofs WHERE id = ?",
        )
        .bind(proof_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| StoredProof {
            proof_id: r.get::<String, _>(0),
            file_name: r.get::<String, _>(1),
            content_type: r.get::<String, _>(2),
            bytes: r.get::<Vec<u8>, _>(3),
        }))
    }
}

const SELECT_ITEMS: &str = "SELECT id, order_id, product_type, buyer_name, buyer_email, buyer_roll_number, printed_name, size, position, payment_proof_ref, is_member, status FROM order_items";

fn item_from_row(row: &SqliteRow) -> Result<StoredOrderItem> {
    let document_id: String = row.try_get("id")?;
    let size: String = row.try_get("size")?;
    let status: Option<String> = row.try_get("status")?;
    let position: Option<String> = row.try_get("position")?;
    Ok(StoredOrderItem {
        record: OrderItemRecord {
            order_id: OrderId(row.try_get("order_id")?),
            product_type: row.try_get("product_type")?,
            buyer_name: row.try_get("buyer_name")?,
            buyer_email: row.try_get("buyer_email")?,
            buyer_roll_number: row.try_get("buyer_roll_number")?,
            printed_name: row.try_get("printed_name")?,
            size: ShirtSize::from_str(&size)
                .with_context(|| format!("item {document_id} has a corrupt size"))?,
            position: position.filter(|p| !p.is_empty()),
            payment_proof_ref: row.try_get("payment_proof_ref")?,
            is_member: row.try_get("is_member")?,
            status: OrderStatus::from_stored(status.as_deref())
                .with_context(|| format!("item {document_id} has a corrupt status"))?,
        },
        document_id: DocumentId(document_id),
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.contains(":memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
