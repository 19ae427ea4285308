// 🌐 REST API with Axum
// Routes under /api/transaction. Handlers are thin: parse the request, call
// TransactionService, map TransactionError onto an HTTP status.

use crate::db::Transaction;
use crate::error::{Result, TransactionError};
use crate::filter::DateRange;
use crate::parser::parse_naive_datetime;
use crate::service::{RangeReport, TransactionService};
use axum::{
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

/// Zone used when the caller does not send `userTimeZone`
pub const DEFAULT_USER_TIME_ZONE: &str = "UTC";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    service: Arc<Mutex<TransactionService>>,
}

impl AppState {
    pub fn new(service: TransactionService) -> Self {
        AppState {
            service: Arc::new(Mutex::new(service)),
        }
    }

    fn service(&self) -> MutexGuard<'_, TransactionService> {
        // SQLite keeps the data consistent even if a handler panicked mid-request
        self.service.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// API Response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    data: T,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self { success: true, data }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    title: &'static str,
    status: u16,
    description: String,
}

#[derive(Serialize)]
struct ExportResponse {
    file: String,
}

#[derive(Serialize)]
struct DeleteResponse {
    deleted: usize,
    message: &'static str,
}

// ============================================================================
// Error mapping
// ============================================================================

pub struct ApiError(TransactionError);

impl From<TransactionError> for ApiError {
    fn from(err: TransactionError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, title) = match &self.0 {
            TransactionError::ZoneResolution { .. } => (StatusCode::BAD_REQUEST, "Invalid time zone"),
            TransactionError::Parsing { .. } | TransactionError::Csv(_) => {
                (StatusCode::BAD_REQUEST, "CSV processing error")
            }
            TransactionError::Validation(_) => (StatusCode::BAD_REQUEST, "Validation error"),
            TransactionError::NotFound(_) => (StatusCode::NOT_FOUND, "Not found"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        };

        let description = if self.0.is_client_error() {
            self.0.to_string()
        } else {
            error!(error = %self.0, "request failed");
            "An unexpected error occurred.".to_string()
        };

        let body = ErrorBody {
            success: false,
            title,
            status: status.as_u16(),
            description,
        };

        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

// ============================================================================
// Query parameters
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DateRangeQuery {
    start_date: Option<String>,
    end_date: Option<String>,
    user_time_zone: Option<String>,
    #[serde(default)]
    excel_export: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportQuery {
    #[serde(default)]
    excel_export: bool,
}

fn required_date(name: &str, value: Option<&str>) -> Result<NaiveDateTime> {
    let value = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| TransactionError::validation(format!("{} is required", name)))?;

    parse_naive_datetime(value)
        .ok_or_else(|| TransactionError::validation(format!("{} is not a valid date: {}", name, value)))
}

impl DateRangeQuery {
    fn range(&self) -> Result<DateRange> {
        let start = required_date("startDate", self.start_date.as_deref())?;
        let end = required_date("endDate", self.end_date.as_deref())?;
        DateRange::new(start, end)
    }

    fn user_time_zone(&self) -> &str {
        match self.user_time_zone.as_deref().map(str::trim) {
            Some(zone) if !zone.is_empty() => zone,
            _ => DEFAULT_USER_TIME_ZONE,
        }
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /api/transaction/import - multipart upload, field `file`
async fn import_csv(State(state): State<AppState>, mut multipart: Multipart) -> ApiResult<Vec<Transaction>> {
    let mut upload: Option<(String, Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| TransactionError::validation(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| TransactionError::validation(e.body_text()))?;
        upload = Some((file_name, data));
        break;
    }

    let (file_name, data) = match upload {
        Some((name, data)) if !data.is_empty() => (name, data),
        _ => return Err(TransactionError::validation("No file uploaded.").into()),
    };

    if !file_name.to_lowercase().ends_with(".csv") {
        return Err(TransactionError::validation("The uploaded file is not a CSV.").into());
    }

    let outcome = state.service().import_csv(data.as_ref())?;

    Ok(Json(ApiResponse::ok(outcome.transactions)))
}

/// GET /api/transaction/export - write every transaction to an Excel report
async fn export_all(State(state): State<AppState>) -> ApiResult<ExportResponse> {
    let path = state.service().export_all()?;

    Ok(Json(ApiResponse::ok(ExportResponse {
        file: path.display().to_string(),
    })))
}

/// GET /api/transaction/date-range-user-time-zone
async fn in_user_timezone(State(state): State<AppState>, Query(query): Query<DateRangeQuery>) -> ApiResult<RangeReport> {
    let range = query.range()?;
    let report = state
        .service()
        .transactions_in_user_timezone(&range, query.user_time_zone(), query.excel_export)?;

    Ok(Json(ApiResponse::ok(report)))
}

/// GET /api/transaction/date-range - by each transaction's own local time
async fn in_local_time(State(state): State<AppState>, Query(query): Query<DateRangeQuery>) -> ApiResult<RangeReport> {
    let range = query.range()?;
    let report = state.service().transactions_in_local_time(&range, query.excel_export)?;

    Ok(Json(ApiResponse::ok(report)))
}

/// GET /api/transaction/january-2024
async fn january_2024(State(state): State<AppState>, Query(query): Query<ExportQuery>) -> ApiResult<RangeReport> {
    let report = state.service().transactions_for_month(2024, 1, query.excel_export)?;

    Ok(Json(ApiResponse::ok(report)))
}

/// GET /api/transaction/month/:year/:month
async fn for_month(
    State(state): State<AppState>,
    Path((year, month)): Path<(i32, u32)>,
    Query(query): Query<ExportQuery>,
) -> ApiResult<RangeReport> {
    let report = state.service().transactions_for_month(year, month, query.excel_export)?;

    Ok(Json(ApiResponse::ok(report)))
}

/// DELETE /api/transaction/delete-all - test/ops utility
async fn delete_all(State(state): State<AppState>) -> ApiResult<DeleteResponse> {
    let deleted = state.service().delete_all()?;

    Ok(Json(ApiResponse::ok(DeleteResponse {
        deleted,
        message: "All transactions have been deleted.",
    })))
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState) -> Router {
    let transaction_routes = Router::new()
        .route("/import", post(import_csv))
        .route("/export", get(export_all))
        .route("/date-range-user-time-zone", get(in_user_timezone))
        .route("/date-range", get(in_local_time))
        .route("/january-2024", get(january_2024))
        .route("/month/:year/:month", get(for_month))
        .route("/delete-all", delete(delete_all));

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .nest("/transaction", transaction_routes);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::ExportConfig;
    use crate::parser::tests::StubLookup;
    use axum::body::Body;
    use axum::http::Request;
    use rusqlite::Connection;
    use serde_json::Value;
    use tower::ServiceExt;

    const BOUNDARY: &str = "----transactions-test-boundary";

    const CSV: &str = "transaction_id,name,email,amount,transaction_date,client_location,status\n\
        NY,Ada,ada@example.com,\"$1,200.00\",2024-01-01 02:00:00,\"40.7128, -74.0060\",Pending\n\
        KV,Ivan,ivan@example.com,$15,2024-01-01 08:00:00,\"50.4501, 30.5234\",\n";

    fn app(export_dir: &std::path::Path) -> Router {
        let conn = Connection::open_in_memory().unwrap();
        let service =
            TransactionService::new(conn, Box::new(StubLookup), ExportConfig::new(export_dir)).unwrap();
        router(AppState::new(service))
    }

    fn upload(file_name: &str, content: &str) -> Request<Body> {
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\n\
             Content-Type: text/csv\r\n\r\n{c}\r\n--{b}--\r\n",
            b = BOUNDARY,
            f = file_name,
            c = content
        );

        Request::builder()
            .method("POST")
            .uri("/api/transaction/import")
            .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(Body::from(body))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    fn ids(json: &Value) -> Vec<String> {
        json["data"]["transactions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|tx| tx["transactionId"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let (status, json) = send(&app(dir.path()), get_request("/api/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"], "OK");
    }

    #[tokio::test]
    async fn test_import_returns_transactions() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let (status, json) = send(&app, upload("transactions.CSV", CSV)).await;

        assert_eq!(status, StatusCode::OK);
        let data = json["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["timeZone"], "America/New_York");
        assert_eq!(data[1]["status"], "Pending");
    }

    #[tokio::test]
    async fn test_import_rejects_non_csv_and_empty_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let (status, json) = send(&app, upload("transactions.txt", CSV)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["description"], "The uploaded file is not a CSV.");

        let (status, json) = send(&app, upload("transactions.csv", "")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["description"], "No file uploaded.");
    }

    #[tokio::test]
    async fn test_import_malformed_row_is_csv_error() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let csv = "transaction_id,name,email,amount,transaction_date,client_location,status\n\
                   T1,A,a@x,free,2024-01-01 00:00:00,\"1,1\",\n";

        let (status, json) = send(&app, upload("bad.csv", csv)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["title"], "CSV processing error");
    }

    #[tokio::test]
    async fn test_user_timezone_range() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        send(&app, upload("t.csv", CSV)).await;

        // NY 02:00 -> Kiev 09:00 (in); Kiev 08:00 stays 08:00 (out)
        let (status, json) = send(
            &app,
            get_request(
                "/api/transaction/date-range-user-time-zone\
                 ?startDate=2024-01-01%2008:30:00&endDate=2024-01-01%2023:59:59&userTimeZone=Europe/Kiev",
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(ids(&json), vec!["NY"]);
        assert!(json["data"].get("exportPath").is_none());
    }

    #[tokio::test]
    async fn test_user_timezone_errors() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let (status, json) = send(
            &app,
            get_request(
                "/api/transaction/date-range-user-time-zone\
                 ?startDate=2024-01-01&endDate=2024-01-02&userTimeZone=Moon/Base",
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["title"], "Invalid time zone");

        let (status, json) = send(
            &app,
            get_request("/api/transaction/date-range-user-time-zone?startDate=2024-01-02&endDate=2024-01-01"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["title"], "Validation error");

        let (status, json) = send(&app, get_request("/api/transaction/date-range?endDate=2024-01-01")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["description"], "startDate is required");
    }

    #[tokio::test]
    async fn test_local_time_range_with_excel_export() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        send(&app, upload("t.csv", CSV)).await;

        let (status, json) = send(
            &app,
            get_request(
                "/api/transaction/date-range\
                 ?startDate=2024-01-01T00:00:00&endDate=2024-01-01T05:00:00&excelExport=true",
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(ids(&json), vec!["NY"]);
        let path = json["data"]["exportPath"].as_str().unwrap();
        assert!(std::path::Path::new(path).exists());
    }

    #[tokio::test]
    async fn test_month_routes() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        send(&app, upload("t.csv", CSV)).await;

        let (status, json) = send(&app, get_request("/api/transaction/january-2024")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ids(&json), vec!["NY", "KV"]);

        let (status, json) = send(&app, get_request("/api/transaction/month/2024/2")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(ids(&json).is_empty());

        let (status, _) = send(&app, get_request("/api/transaction/month/2024/13")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_export_and_delete_all() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let (status, json) = send(&app, get_request("/api/transaction/export")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["description"], "No transactions found.");

        send(&app, upload("t.csv", CSV)).await;

        let (status, json) = send(&app, get_request("/api/transaction/export")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(std::path::Path::new(json["data"]["file"].as_str().unwrap()).exists());

        let delete = Request::builder()
            .method("DELETE")
            .uri("/api/transaction/delete-all")
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(&app, delete).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["deleted"], 2);
    }
}
