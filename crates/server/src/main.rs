use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use server_api::{
    config::{build_context, load_settings},
    export_csv, export_file_name, list_orders, lookup_order, place_order, quote_product,
    review_item,
};
use shared::{
    domain::{DocumentId, Product, StoredOrderItem},
    error::{ApiError, ErrorCode},
    protocol::{
        LogicalOrder, OrderListQuery, PlaceOrderRequest, Quote, QuoteRequest, ReviewRequest,
        SubmissionReport, SubmissionStatus,
    },
};
use storage::ProofUpload;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;

use app_state::AppState;

const MAX_PROOF_BYTES: usize = 8 * 1024 * 1024;
/// Proof plus the JSON part and multipart framing.
const MAX_REQUEST_BYTES: usize = MAX_PROOF_BYTES + 256 * 1024;
const MAX_FILENAME_BYTES: usize = 180;

type HttpError = (StatusCode, Json<ApiError>);
type HttpResult<T> = Result<T, HttpError>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings()?;
    let api = build_context(&settings).await.map_err(|error| {
        error!(
            backend = ?settings.backend,
            error = %error,
            "failed to open storage backend; check the database url or appwrite settings"
        );
        error
    })?;

    let app = build_router(Arc::new(AppState { api }));

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(%addr, public_base_url = %settings.public_base_url, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/products", get(http_list_products))
        .route("/products/:product_id", get(http_get_product))
        .route("/products/:product_id/quote", post(http_quote))
        .route("/orders", post(http_place_order))
        .route("/orders/:order_id", get(http_lookup_order))
        .route("/proofs/:proof_id", get(http_download_proof))
        .route("/admin/orders", get(http_list_orders))
        .route("/admin/orders/export.csv", get(http_export_orders))
        .route("/admin/orders/:document_id/review", post(http_review_item))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BYTES))
        .with_state(state)
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::Upload => StatusCode::BAD_GATEWAY,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(err: ApiError) -> HttpError {
    let status = status_for(err.code);
    if status.is_server_error() {
        warn!(code = ?err.code, message = %err.message, "request failed");
    }
    (status, Json(err))
}

fn invalid(message: impl Into<String>) -> HttpError {
    reject(ApiError::new(ErrorCode::Validation, message))
}

async fn healthz(State(state): State<Arc<AppState>>) -> HttpResult<&'static str> {
    server_api::health(&state.api).await.map_err(|err| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError::new(ErrorCode::Internal, err.message)),
        )
    })?;
    Ok("ok")
}

async fn http_list_products(State(state): State<Arc<AppState>>) -> Json<Vec<Product>> {
    Json(server_api::list_products(&state.api))
}

async fn http_get_product(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<String>,
) -> HttpResult<Json<Product>> {
    server_api::get_product(&state.api, &product_id)
        .map(Json)
        .map_err(reject)
}

async fn http_quote(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<String>,
    Json(req): Json<QuoteRequest>,
) -> HttpResult<Json<Quote>> {
    quote_product(&state.api, &product_id, &req)
        .map(Json)
        .map_err(reject)
}

/// Multipart body: an `order` part holding [`PlaceOrderRequest`] JSON and a
/// `proof` file part with the payment screenshot.
async fn http_place_order(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> HttpResult<(StatusCode, Json<SubmissionReport>)> {
    let mut order: Option<PlaceOrderRequest> = None;
    let mut proof: Option<ProofUpload> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            e.status(),
            Json(ApiError::new(ErrorCode::Validation, e.body_text())),
        )
    })? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "order" => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| invalid(format!("unreadable order part: {}", e.body_text())))?;
                order = Some(
                    serde_json::from_str(&raw)
                        .map_err(|e| invalid(format!("invalid order json: {e}")))?,
                );
            }
            "proof" => {
                let file_name = field
                    .file_name()
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or("payment-proof")
                    .to_string();
                if file_name.len() > MAX_FILENAME_BYTES {
                    return Err(invalid(format!(
                        "proof file name exceeds {MAX_FILENAME_BYTES} bytes"
                    )));
                }
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    (
                        e.status(),
                        Json(ApiError::new(ErrorCode::Validation, e.body_text())),
                    )
                })?;
                if bytes.len() > MAX_PROOF_BYTES {
                    return Err((
                        StatusCode::PAYLOAD_TOO_LARGE,
                        Json(ApiError::new(
                            ErrorCode::Validation,
                            format!("payment proof exceeds {MAX_PROOF_BYTES} bytes"),
                        )),
                    ));
                }
                proof = Some(ProofUpload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            other => warn!(part = other, "ignoring unexpected multipart part"),
        }
    }

    let order = order.ok_or_else(|| invalid("missing order part"))?;
    let report = place_order(&state.api, order, proof)
        .await
        .map_err(reject)?;
    let status = match report.status() {
        SubmissionStatus::Complete => StatusCode::CREATED,
        SubmissionStatus::Partial | SubmissionStatus::NothingPersisted => StatusCode::MULTI_STATUS,
    };
    Ok((status, Json(report)))
}

async fn http_lookup_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> HttpResult<Json<LogicalOrder>> {
    lookup_order(&state.api, &order_id)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_download_proof(
    State(state): State<Arc<AppState>>,
    Path(proof_id): Path<String>,
) -> HttpResult<impl IntoResponse> {
    let proof = server_api::load_proof(&state.api, &proof_id)
        .await
        .map_err(reject)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&proof.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    let sanitized = proof.file_name.replace(['"', '\r', '\n'], "_");
    if let Ok(value) = HeaderValue::from_str(&format!("inline; filename=\"{sanitized}\"")) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok((StatusCode::OK, headers, proof.bytes))
}

async fn http_list_orders(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OrderListQuery>,
) -> HttpResult<Json<Vec<StoredOrderItem>>> {
    list_orders(&state.api, &query)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_export_orders(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OrderListQuery>,
) -> HttpResult<impl IntoResponse> {
    let items = list_orders(&state.api, &query).await.map_err(reject)?;
    let file_name = export_file_name(chrono::Utc::now().date_naive());

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/csv; charset=utf-8"),
    );
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\"")) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok((StatusCode::OK, headers, export_csv(&items)))
}

async fn http_review_item(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
    Json(req): Json<ReviewRequest>,
) -> HttpResult<Json<StoredOrderItem>> {
    review_item(&state.api, &DocumentId(document_id), req.accepted)
        .await
        .map(Json)
        .map_err(reject)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
