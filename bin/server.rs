// Classroom Economy - API Server
// REST API with Axum over the shared economy engine

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use classroom_economy::{
    assets, classroom, ledger, loans, orders, payments, portfolio, seats, transaction_log,
    EconomyConfig, EconomyError, Session,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    config: Arc<EconomyConfig>,
}

impl AppState {
    fn new(conn: Connection, config: EconomyConfig) -> Self {
        AppState {
            db: Arc::new(Mutex::new(conn)),
            config: Arc::new(config),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.db
            .lock()
            .map_err(|_| AppError::Internal("database lock poisoned".to_string()))
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<&'static str>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
            error_kind: None,
        }
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Economy(#[from] EconomyError),

    /// No usable identity headers (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            AppError::Economy(e) => {
                let status = match e {
                    EconomyError::Validation(_) => StatusCode::BAD_REQUEST,
                    EconomyError::InsufficientFunds { .. }
                    | EconomyError::InsufficientHoldings { .. }
                    | EconomyError::BelowMinimumHolding { .. }
                    | EconomyError::NotEligible(_)
                    | EconomyError::LimitExceeded(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    EconomyError::Forbidden(_) => StatusCode::FORBIDDEN,
                    EconomyError::NotFound(_) => StatusCode::NOT_FOUND,
                    EconomyError::Conflict(_) => StatusCode::CONFLICT,
                    EconomyError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.kind())
            }
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = ApiResponse {
            success: false,
            data: (),
            error: Some(self.to_string()),
            error_kind: Some(kind),
        };
        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Identity
// ============================================================================

/// Identity issued upstream, carried in `x-teacher-id` / `x-student-id`
struct Identity(Session);

fn header_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let teacher_id = header_value(parts, "x-teacher-id")
            .ok_or_else(|| AppError::Unauthorized("missing x-teacher-id header".to_string()))?;

        let session = match header_value(parts, "x-student-id") {
            Some(student_id) => Session::student(teacher_id, student_id),
            None => Session::teacher(teacher_id),
        };
        Ok(Identity(session))
    }
}

/// Teachers see every student of their classroom; students only themselves
fn authorize_student(session: &Session, student_id: &str) -> Result<(), AppError> {
    match session.student_id.as_deref() {
        Some(own) if own != student_id => Err(EconomyError::Forbidden(
            "students may only view their own records".to_string(),
        )
        .into()),
        _ => Ok(()),
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

#[derive(Deserialize)]
struct CreateClassroomRequest {
    name: String,
}

/// POST /api/classroom - Create the teacher's classroom
async fn create_classroom(
    State(state): State<AppState>,
    Identity(session): Identity,
    Json(req): Json<CreateClassroomRequest>,
) -> ApiResult<classroom_economy::Classroom> {
    let mut conn = state.conn()?;
    let created = classroom::create_classroom(&mut conn, &state.config, &session, &req.name)?;
    Ok(Json(ApiResponse::ok(created)))
}

/// POST /api/students - Enroll a student
async fn enroll_student(
    State(state): State<AppState>,
    Identity(session): Identity,
    Json(req): Json<classroom::NewStudent>,
) -> ApiResult<classroom_economy::Student> {
    let mut conn = state.conn()?;
    let student = classroom::enroll_student(&mut conn, &state.config, &session, &req)?;
    Ok(Json(ApiResponse::ok(student)))
}

/// GET /api/students - Classroom roster (teacher)
async fn list_students(
    State(state): State<AppState>,
    Identity(session): Identity,
) -> ApiResult<Vec<classroom_economy::Student>> {
    let teacher_id = session.require_teacher()?;
    let conn = state.conn()?;
    let students = classroom::list_students(&conn, teacher_id)?;
    Ok(Json(ApiResponse::ok(students)))
}

#[derive(Deserialize)]
struct CreditScoreUpdate {
    credit_score: i64,
}

/// POST /api/students/:id/credit-score (teacher)
async fn set_credit_score(
    State(state): State<AppState>,
    Identity(session): Identity,
    Path(student_id): Path<String>,
    Json(req): Json<CreditScoreUpdate>,
) -> ApiResult<classroom_economy::Student> {
    let conn = state.conn()?;
    let student = classroom::set_credit_score(&conn, &session, &student_id, req.credit_score)?;
    Ok(Json(ApiResponse::ok(student)))
}

#[derive(Deserialize)]
struct ActiveUpdate {
    active: bool,
}

/// POST /api/students/:id/active (teacher)
async fn set_active(
    State(state): State<AppState>,
    Identity(session): Identity,
    Path(student_id): Path<String>,
    Json(req): Json<ActiveUpdate>,
) -> ApiResult<classroom_economy::Student> {
    let conn = state.conn()?;
    let student = classroom::set_active(&conn, &session, &student_id, req.active)?;
    Ok(Json(ApiResponse::ok(student)))
}

#[derive(Deserialize)]
struct JoinRequest {
    join_code: String,
    name: String,
}

/// POST /api/join - Student self-registration (no identity yet)
async fn join_classroom(
    State(state): State<AppState>,
    Json(req): Json<JoinRequest>,
) -> ApiResult<classroom_economy::Student> {
    let mut conn = state.conn()?;
    let student = classroom::join_classroom(&mut conn, &state.config, &req.join_code, &req.name)?;
    Ok(Json(ApiResponse::ok(student)))
}

/// POST /api/buy
async fn buy(
    State(state): State<AppState>,
    Identity(session): Identity,
    Json(req): Json<orders::OrderRequest>,
) -> ApiResult<orders::BuyReceipt> {
    let mut conn = state.conn()?;
    let receipt = orders::buy(&mut conn, &state.config, &session, &req)?;
    Ok(Json(ApiResponse::ok(receipt)))
}

/// POST /api/sell
async fn sell(
    State(state): State<AppState>,
    Identity(session): Identity,
    Json(req): Json<orders::OrderRequest>,
) -> ApiResult<orders::SellReceipt> {
    let mut conn = state.conn()?;
    let receipt = orders::sell(&mut conn, &state.config, &session, &req)?;
    Ok(Json(ApiResponse::ok(receipt)))
}

/// POST /api/loan/quote
async fn loan_quote(
    State(state): State<AppState>,
    Identity(session): Identity,
    Json(req): Json<loans::LoanApplication>,
) -> ApiResult<loans::LoanQuote> {
    let conn = state.conn()?;
    let quote = loans::quote_loan(&conn, &state.config, &session, &req)?;
    Ok(Json(ApiResponse::ok(quote)))
}

/// POST /api/loan/apply
async fn loan_apply(
    State(state): State<AppState>,
    Identity(session): Identity,
    Json(req): Json<loans::LoanApplication>,
) -> ApiResult<loans::LoanReceipt> {
    let mut conn = state.conn()?;
    let receipt = loans::apply_for_loan(&mut conn, &state.config, &session, &req)?;
    Ok(Json(ApiResponse::ok(receipt)))
}

/// POST /api/loan/repay
async fn loan_repay(
    State(state): State<AppState>,
    Identity(session): Identity,
    Json(req): Json<loans::RepaymentRequest>,
) -> ApiResult<loans::RepaymentReceipt> {
    let mut conn = state.conn()?;
    let receipt = loans::repay_loan(&mut conn, &session, &req)?;
    Ok(Json(ApiResponse::ok(receipt)))
}

#[derive(Deserialize)]
struct ScheduleQuery {
    principal: f64,
    annual_rate: f64,
    weeks: u32,
}

/// GET /api/loan/schedule?principal=&annual_rate=&weeks=
async fn loan_schedule(Query(q): Query<ScheduleQuery>) -> ApiResult<Vec<loans::ScheduleRow>> {
    let rows = loans::amortization_schedule(q.principal, q.annual_rate, q.weeks)?;
    Ok(Json(ApiResponse::ok(rows)))
}

/// POST /api/loans/mark-overdue
async fn mark_overdue(
    State(state): State<AppState>,
    Identity(session): Identity,
) -> ApiResult<usize> {
    let conn = state.conn()?;
    let marked = loans::mark_overdue_loans(&conn, &session, chrono::Utc::now())?;
    Ok(Json(ApiResponse::ok(marked)))
}

/// POST /api/seat/buy
async fn seat_buy(
    State(state): State<AppState>,
    Identity(session): Identity,
    Json(req): Json<seats::SeatTradeRequest>,
) -> ApiResult<seats::SeatPurchase> {
    let mut conn = state.conn()?;
    let purchase = seats::buy_seat(&mut conn, &session, &req)?;
    Ok(Json(ApiResponse::ok(purchase)))
}

/// POST /api/seat/sell
async fn seat_sell(
    State(state): State<AppState>,
    Identity(session): Identity,
    Json(req): Json<seats::SeatTradeRequest>,
) -> ApiResult<seats::SeatSale> {
    let mut conn = state.conn()?;
    let sale = seats::sell_seat(&mut conn, &session, &req)?;
    Ok(Json(ApiResponse::ok(sale)))
}

/// GET /api/seats
async fn list_seats(
    State(state): State<AppState>,
    Identity(session): Identity,
) -> ApiResult<Vec<classroom_economy::Seat>> {
    let conn = state.conn()?;
    let seats = seats::list_seats(&conn, &session.teacher_id)?;
    Ok(Json(ApiResponse::ok(seats)))
}

/// POST /api/seats/update-prices
async fn update_seat_prices(
    State(state): State<AppState>,
    Identity(session): Identity,
) -> ApiResult<seats::SeatRepricing> {
    let mut conn = state.conn()?;
    let repricing = seats::recompute_seat_prices(&mut conn, &state.config, &session)?;
    Ok(Json(ApiResponse::ok(repricing)))
}

/// POST /api/transfer
async fn transfer(
    State(state): State<AppState>,
    Identity(session): Identity,
    Json(req): Json<payments::TransferRequest>,
) -> ApiResult<payments::TransferReceipt> {
    let mut conn = state.conn()?;
    let receipt = payments::transfer(&mut conn, &session, &req)?;
    Ok(Json(ApiResponse::ok(receipt)))
}

/// POST /api/move-funds
async fn move_funds(
    State(state): State<AppState>,
    Identity(session): Identity,
    Json(req): Json<payments::MoveFundsRequest>,
) -> ApiResult<payments::MoveFundsReceipt> {
    let mut conn = state.conn()?;
    let receipt = payments::move_funds(&mut conn, &session, &req)?;
    Ok(Json(ApiResponse::ok(receipt)))
}

/// POST /api/allowance
async fn allowance(
    State(state): State<AppState>,
    Identity(session): Identity,
    Json(req): Json<payments::AllowanceRequest>,
) -> ApiResult<payments::BatchReport> {
    let mut conn = state.conn()?;
    let report = payments::pay_allowance(&mut conn, &session, &req)?;
    Ok(Json(ApiResponse::ok(report)))
}

/// POST /api/tax-collection
async fn tax_collection(
    State(state): State<AppState>,
    Identity(session): Identity,
    Json(req): Json<payments::TaxCollectionRequest>,
) -> ApiResult<payments::BatchReport> {
    let mut conn = state.conn()?;
    let report = payments::collect_tax(&mut conn, &session, &req)?;
    Ok(Json(ApiResponse::ok(report)))
}

/// GET /api/assets
async fn list_assets(State(state): State<AppState>) -> ApiResult<Vec<classroom_economy::Asset>> {
    let conn = state.conn()?;
    let assets = assets::list_assets(&conn)?;
    Ok(Json(ApiResponse::ok(assets)))
}

/// POST /api/assets - Register an asset (teacher)
async fn register_asset(
    State(state): State<AppState>,
    Identity(session): Identity,
    Json(req): Json<assets::NewAsset>,
) -> ApiResult<classroom_economy::Asset> {
    session.require_teacher()?;
    let conn = state.conn()?;
    let asset = assets::register_asset(&conn, &req)?;
    Ok(Json(ApiResponse::ok(asset)))
}

#[derive(Deserialize)]
struct PriceUpdate {
    price: f64,
}

/// POST /api/assets/:symbol/price - Price feed push (teacher)
async fn update_asset_price(
    State(state): State<AppState>,
    Identity(session): Identity,
    Path(symbol): Path<String>,
    Json(req): Json<PriceUpdate>,
) -> ApiResult<classroom_economy::Asset> {
    session.require_teacher()?;
    let conn = state.conn()?;
    let asset = assets::update_price(&conn, &symbol, req.price)?;
    Ok(Json(ApiResponse::ok(asset)))
}

/// GET /api/students/:id/accounts
async fn student_accounts(
    State(state): State<AppState>,
    Identity(session): Identity,
    Path(student_id): Path<String>,
) -> ApiResult<classroom_economy::AccountBalances> {
    authorize_student(&session, &student_id)?;
    let conn = state.conn()?;
    classroom::find_student(&conn, &session.teacher_id, &student_id)?;
    let balances = ledger::balances(&conn, &student_id)?;
    Ok(Json(ApiResponse::ok(balances)))
}

/// GET /api/students/:id/portfolio
async fn student_portfolio(
    State(state): State<AppState>,
    Identity(session): Identity,
    Path(student_id): Path<String>,
) -> ApiResult<portfolio::PortfolioSummary> {
    authorize_student(&session, &student_id)?;
    let conn = state.conn()?;
    classroom::find_student(&conn, &session.teacher_id, &student_id)?;
    let summary = portfolio::portfolio_summary(&conn, &student_id)?;
    Ok(Json(ApiResponse::ok(summary)))
}

#[derive(Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

/// GET /api/students/:id/transactions?limit=
async fn student_transactions(
    State(state): State<AppState>,
    Identity(session): Identity,
    Path(student_id): Path<String>,
    Query(q): Query<LimitQuery>,
) -> ApiResult<Vec<transaction_log::TransactionRecord>> {
    authorize_student(&session, &student_id)?;
    let conn = state.conn()?;
    classroom::find_student(&conn, &session.teacher_id, &student_id)?;
    let entries = transaction_log::entries_for_student(&conn, &student_id, q.limit.unwrap_or(50))?;
    Ok(Json(ApiResponse::ok(entries)))
}

/// GET /api/students/:id/loans
async fn student_loans(
    State(state): State<AppState>,
    Identity(session): Identity,
    Path(student_id): Path<String>,
) -> ApiResult<Vec<classroom_economy::Loan>> {
    authorize_student(&session, &student_id)?;
    let conn = state.conn()?;
    let loans = loans::loans_for_student(&conn, &session.teacher_id, &student_id)?;
    Ok(Json(ApiResponse::ok(loans)))
}

/// GET /api/stats - Totals per transaction type (teacher)
async fn get_stats(
    State(state): State<AppState>,
    Identity(session): Identity,
) -> ApiResult<Vec<transaction_log::TypeTotal>> {
    let teacher_id = session.require_teacher()?;
    let conn = state.conn()?;
    let stats = transaction_log::classroom_stats(&conn, teacher_id)?;
    Ok(Json(ApiResponse::ok(stats)))
}

/// GET /api/supply - Where the classroom's money sits (teacher)
async fn get_supply(
    State(state): State<AppState>,
    Identity(session): Identity,
) -> ApiResult<classroom_economy::MoneySupply> {
    let teacher_id = session.require_teacher()?;
    let conn = state.conn()?;
    let supply = ledger::money_supply(&conn, teacher_id)?;
    Ok(Json(ApiResponse::ok(supply)))
}

// ============================================================================
// Router & Main Server
// ============================================================================

fn app(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/classroom", post(create_classroom))
        .route("/students", get(list_students).post(enroll_student))
        .route("/students/:id/credit-score", post(set_credit_score))
        .route("/students/:id/active", post(set_active))
        .route("/join", post(join_classroom))
        .route("/buy", post(buy))
        .route("/sell", post(sell))
        .route("/loan/quote", post(loan_quote))
        .route("/loan/apply", post(loan_apply))
        .route("/loan/repay", post(loan_repay))
        .route("/loan/schedule", get(loan_schedule))
        .route("/loans/mark-overdue", post(mark_overdue))
        .route("/seat/buy", post(seat_buy))
        .route("/seat/sell", post(seat_sell))
        .route("/seats", get(list_seats))
        .route("/seats/update-prices", post(update_seat_prices))
        .route("/transfer", post(transfer))
        .route("/move-funds", post(move_funds))
        .route("/allowance", post(allowance))
        .route("/tax-collection", post(tax_collection))
        .route("/assets", get(list_assets).post(register_asset))
        .route("/assets/:symbol/price", post(update_asset_price))
        .route("/students/:id/accounts", get(student_accounts))
        .route("/students/:id/portfolio", get(student_portfolio))
        .route("/students/:id/transactions", get(student_transactions))
        .route("/students/:id/loans", get(student_loans))
        .route("/stats", get(get_stats))
        .route("/supply", get(get_supply))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("🌐 Classroom Economy - API Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = EconomyConfig::from_env()?;
    let db_path = std::env::var("ECONOMY_DB").unwrap_or_else(|_| "economy.db".to_string());
    let conn = classroom_economy::open_database(std::path::Path::new(&db_path))?;
    println!("✓ Database opened: {}", db_path);

    let state = AppState::new(conn, config);

    let addr = std::env::var("ECONOMY_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!("\n🚀 Server running on http://{}", addr);
    println!("   API: http://{}/api/health", addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use classroom_economy::{AssetCategory, NewAsset};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const TEACHER: &str = "teacher-1";

    /// Classroom with one student (100,000 in checking) and one listed stock
    fn seeded_state() -> (AppState, String, i64) {
        let mut conn = classroom_economy::open_in_memory().unwrap();
        let config = EconomyConfig::default();
        let teacher = Session::teacher(TEACHER);
        classroom::create_classroom(&mut conn, &config, &teacher, "API Class").unwrap();

        let new = classroom::NewStudent {
            name: "Ana".to_string(),
            credit_score: Some(850),
            opening: Some(classroom_economy::config::OpeningBalances {
                checking: 100_000.0,
                savings: 0.0,
                investment: 0.0,
            }),
        };
        let student = classroom::enroll_student(&mut conn, &config, &teacher, &new).unwrap();

        let asset = assets::register_asset(
            &conn,
            &NewAsset {
                symbol: "ACME".to_string(),
                name: "Acme".to_string(),
                category: AssetCategory::Stock,
                currency: "KRW".to_string(),
                min_quantity: 1.0,
                price: 50_000.0,
            },
        )
        .unwrap();

        (AppState::new(conn, config), student.id, asset.id)
    }

    fn request(
        method: &str,
        uri: &str,
        student: Option<&str>,
        body: Option<Value>,
    ) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-teacher-id", TEACHER);
        if let Some(student) = student {
            builder = builder.header("x-student-id", student);
        }
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(state: &AppState, req: Request<Body>) -> (StatusCode, Value) {
        let response = app(state.clone()).oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _, _) = seeded_state();
        let (status, body) = send(&state, request("GET", "/api/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], "OK");
    }

    #[tokio::test]
    async fn test_buy_through_api() {
        let (state, student, asset_id) = seeded_state();

        let order = json!({ "asset_id": asset_id, "quantity": 1, "account_type": "checking" });
        let req = request("POST", "/api/buy", Some(&student), Some(order));
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["fee"], 50.0);
        assert_eq!(body["data"]["remaining_balance"], 49_950.0);
        assert_eq!(body["data"]["transaction"]["tx_type"], "investment_buy");

        let uri = format!("/api/students/{}/portfolio", student);
        let (status, body) = send(&state, request("GET", &uri, Some(&student), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["positions"][0]["quantity"], 1.0);
    }

    #[tokio::test]
    async fn test_business_errors_map_to_status_codes() {
        let (state, student, asset_id) = seeded_state();

        // Investment account is empty
        let order = json!({ "asset_id": asset_id, "quantity": 1 });
        let req = request("POST", "/api/buy", Some(&student), Some(order));
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["success"], false);
        assert_eq!(body["error_kind"], "insufficient_funds");

        let order = json!({ "asset_id": asset_id, "quantity": 1.5, "account_type": "checking" });
        let req = request("POST", "/api/buy", Some(&student), Some(order));
        let (status, _) = send(&state, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let order = json!({ "asset_id": 999, "quantity": 1 });
        let req = request("POST", "/api/buy", Some(&student), Some(order));
        let (status, _) = send(&state, req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_identity_is_required() {
        let (state, _, asset_id) = seeded_state();

        let req = Request::builder()
            .method("POST")
            .uri("/api/buy")
            .header("content-type", "application/json")
            .body(Body::from(json!({ "asset_id": asset_id, "quantity": 1 }).to_string()))
            .unwrap();
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_kind"], "unauthorized");
    }

    #[tokio::test]
    async fn test_roles_are_enforced() {
        let (state, student, _) = seeded_state();

        let (status, _) = send(&state, request("GET", "/api/stats", Some(&student), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let uri = "/api/students/someone-else/accounts";
        let (status, _) = send(&state, request("GET", uri, Some(&student), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let uri = format!("/api/students/{}/accounts", student);
        let (status, body) = send(&state, request("GET", &uri, None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["checking"], 100_000.0);
    }

    #[tokio::test]
    async fn test_roster_management_is_for_teachers() {
        let (state, student, _) = seeded_state();

        let (status, body) = send(&state, request("GET", "/api/students", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["id"], student.as_str());
        assert_eq!(body["data"][0]["credit_score"], 850);

        let (status, _) = send(&state, request("GET", "/api/students", Some(&student), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let uri = format!("/api/students/{}/credit-score", student);
        let update = json!({ "credit_score": 1200 });
        let (status, _) = send(&state, request("POST", &uri, None, Some(update))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let update = json!({ "credit_score": 999 });
        let req = request("POST", &uri, Some(&student), Some(update));
        let (status, _) = send(&state, req).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let update = json!({ "credit_score": 640 });
        let (status, body) = send(&state, request("POST", &uri, None, Some(update))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["credit_score"], 640);

        let uri = format!("/api/students/{}/active", student);
        let update = json!({ "active": false });
        let (status, body) = send(&state, request("POST", &uri, None, Some(update))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["active"], false);

        // No active students left to price seats over
        let req = request("POST", "/api/seats/update-prices", None, None);
        let (status, _) = send(&state, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_loan_and_seat_flow() {
        let (state, student, _) = seeded_state();

        let application = json!({ "loan_amount": 500000, "duration_weeks": 4 });
        let req = request("POST", "/api/loan/apply", Some(&student), Some(application));
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        let loan_id = body["data"]["loan"]["id"].as_str().unwrap().to_string();

        let repayment = json!({ "loan_id": loan_id, "payment_amount": 1000 });
        let req = request("POST", "/api/loan/repay", Some(&student), Some(repayment));
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "active");
        assert_eq!(body["data"]["remaining_balance"], 499_000.0);

        let req = request("POST", "/api/seats/update-prices", None, None);
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        let price = body["data"]["price"].as_f64().unwrap();

        let seat = json!({ "seat_number": 1 });
        let req = request("POST", "/api/seat/buy", Some(&student), Some(seat.clone()));
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["price"].as_f64().unwrap(), price);

        let req = request("POST", "/api/seat/sell", Some(&student), Some(seat));
        let (status, body) = send(&state, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["sale_price"].as_f64().unwrap(), price);
    }
}
