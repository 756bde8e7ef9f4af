use std::sync::Arc;

use checkout::{
    quote, CheckoutServices, OrderDraft, QuantitySelection, SubmitError, ValidationError,
    VerifiedBuyer,
};
use shared::{
    catalog::find_product,
    domain::{DocumentId, OrderId, OrderStatus, Product, StoredOrderItem},
    error::{ApiError, ErrorCode},
    protocol::{LogicalOrder, OrderListQuery, PlaceOrderRequest, Quote, QuoteRequest, SubmissionReport},
};
use storage::{ItemQuery, OrderDocuments, ProofUpload, StoredProof};
use tracing::info;

pub mod config;
pub mod dashboard;
pub mod tracking;

pub use dashboard::{export_csv, export_file_name, filter_items};
pub use tracking::{project_order, tracking_timeline};

#[derive(Clone)]
pub struct ApiContext {
    pub checkout: CheckoutServices,
    pub catalog: Arc<Vec<Product>>,
    pub email_domain: String,
}

impl ApiContext {
    fn documents(&self) -> &dyn OrderDocuments {
        self.checkout.documents.as_ref()
    }
}

pub async fn health(ctx: &ApiContext) -> Result<(), ApiError> {
    ctx.documents().health_check().await.map_err(internal)
}

pub fn list_products(ctx: &ApiContext) -> Vec<Product> {
    ctx.catalog.as_ref().clone()
}

/// Unknown ids resolve to the first catalog entry.
pub fn get_product(ctx: &ApiContext, product_id: &str) -> Result<Product, ApiError> {
    find_product(&ctx.catalog, product_id)
        .cloned()
        .ok_or_else(|| ApiError::new(ErrorCode::NotFound, "catalog is empty"))
}

pub fn quote_product(
    ctx: &ApiContext,
    product_id: &str,
    request: &QuoteRequest,
) -> Result<Quote, ApiError> {
    let product = get_product(ctx, product_id)?;
    quote(&product, request.quantity).map_err(validation)
}

/// Validates a complete order and runs the submission protocol against the
/// configured backends.
pub async fn place_order(
    ctx: &ApiContext,
    request: PlaceOrderRequest,
    proof: Option<ProofUpload>,
) -> Result<SubmissionReport, ApiError> {
    let product = get_product(ctx, request.product_id.as_str())?;
    let selection = QuantitySelection::from_requested(request.quantity).map_err(validation)?;
    let buyer = VerifiedBuyer::from_form(&request.buyer, &ctx.email_domain).map_err(validation)?;

    let order_id = match request.order_id {
        Some(order_id) => {
            let order_id = OrderId::parse(order_id.as_str())
                .map_err(|err| ApiError::new(ErrorCode::Validation, err.to_string()))?;
            let existing = ctx
                .documents()
                .list_items(&ItemQuery::ByOrder(order_id.clone()))
                .await
                .map_err(internal)?;
            if !existing.is_empty() {
                return Err(ApiError::new(
                    ErrorCode::Conflict,
                    format!("order {order_id} was already submitted"),
                ));
            }
            order_id
        }
        None => OrderId::generate(),
    };

    let draft = OrderDraft::new(
        order_id,
        product,
        selection.quantity(),
        buyer,
        &request.items,
        proof,
    )
    .map_err(validation)?;

    let report = ctx
        .checkout
        .place_order(&draft)
        .await
        .map_err(submit_error)?;
    info!(
        order_id = %report.order_id,
        persisted = report.persisted().count(),
        failed = report.failed().count(),
        "order placed"
    );
    Ok(report)
}

/// Looks an order up by its public id. Malformed ids are reported as not
/// found without touching storage.
pub async fn lookup_order(ctx: &ApiContext, raw_order_id: &str) -> Result<LogicalOrder, ApiError> {
    let not_found = || ApiError::new(ErrorCode::NotFound, format!("order {raw_order_id} not found"));
    let order_id = OrderId::parse(raw_order_id).map_err(|_| not_found())?;
    let items = ctx
        .documents()
        .list_items(&ItemQuery::ByOrder(order_id))
        .await
        .map_err(internal)?;
    project_order(items).ok_or_else(not_found)
}

pub async fn list_orders(
    ctx: &ApiContext,
    query: &OrderListQuery,
) -> Result<Vec<StoredOrderItem>, ApiError> {
    let items = ctx
        .documents()
        .list_items(&ItemQuery::all())
        .await
        .map_err(internal)?;
    Ok(filter_items(items, query))
}

/// Moves a pending item to accepted or rejected. Items are reviewed once.
pub async fn review_item(
    ctx: &ApiContext,
    document_id: &DocumentId,
    accepted: bool,
) -> Result<StoredOrderItem, ApiError> {
    let mut item = ctx
        .documents()
        .get_item(document_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::new(ErrorCode::NotFound, format!("item {document_id} not found")))?;
    let already_reviewed = || {
        ApiError::new(
            ErrorCode::Conflict,
            format!("item {document_id} has already been reviewed"),
        )
    };
    if item.record.status != OrderStatus::Pending {
        return Err(already_reviewed());
    }

    let status = OrderStatus::from_review(accepted);
    // a concurrent review can win between the read and this update
    let updated = ctx
        .documents()
        .review_pending(document_id, status)
        .await
        .map_err(internal)?;
    if !updated {
        return Err(already_reviewed());
    }
    info!(%document_id, order_id = %item.record.order_id, %status, "item reviewed");
    item.record.status = status;
    Ok(item)
}

pub async fn load_proof(ctx: &ApiContext, proof_id: &str) -> Result<StoredProof, ApiError> {
    ctx.checkout
        .proofs
        .load_proof(proof_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::new(ErrorCode::NotFound, "payment proof not found"))
}

fn validation(err: ValidationError) -> ApiError {
    ApiError::new(ErrorCode::Validation, err.to_string())
}

fn submit_error(err: SubmitError) -> ApiError {
    let code = match &err {
        SubmitError::Validation(_) => ErrorCode::Validation,
        SubmitError::Upload { .. } => ErrorCode::Upload,
        SubmitError::AlreadySubmitted(_) | SubmitError::InFlight(_) => ErrorCode::Conflict,
    };
    ApiError::new(code, err.to_string())
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, format!("{err:#}"))
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
