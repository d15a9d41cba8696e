use chrono::{NaiveDate, Utc};
use rocket::State;
use rocket::http::{Cookie, SameSite, Status};
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, Serialize, json::Json};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{Permission, SESSION_COOKIE, User, UserSession};
use crate::catalog::Catalog;
use crate::db::{
    authenticate_user, create_client, create_event, create_order, create_user,
    create_user_session, delete_order, get_clients, invalidate_session, list_events, list_orders,
    settle_unpaid_orders,
};
use crate::env;
use crate::error::AppError;
use crate::models::{Client, Drink, Event, Order};
use crate::reports::{ClientReport, PayoutReport, client_report, payout_csv, payout_report};
use crate::validation::AppErrorExt;
use crate::validation::JsonValidateExt;
use crate::validation::ToValidationResponse;
use crate::validation::ValidationResponse;

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    password: String,
}

#[derive(Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: Option<UserData>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct UserData {
    pub id: i64,
    pub username: String,
    pub role: String,
}

impl From<User> for UserData {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Serialize, Deserialize)]
pub struct CreatedResponse {
    pub success: bool,
    pub id: i64,
}

#[derive(Serialize, Deserialize)]
pub struct ChangesResponse {
    pub success: bool,
    pub changes: u64,
}

#[post("/login", data = "<login>")]
pub async fn api_login(
    login: Json<LoginRequest>,
    cookies: &rocket::http::CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<LoginResponse>, Custom<Json<ValidationResponse>>> {
    let validated = login.validate_custom()?;

    match authenticate_user(db, &validated.username, &validated.password)
        .await
        .validate_custom()?
    {
        Some(user) => {
            let token = UserSession::generate_token();
            let hours = env::session_hours();
            let expires_at = Utc::now() + chrono::Duration::hours(hours);

            create_user_session(db, user.id, &token, expires_at.naive_utc())
                .await
                .validate_custom()?;

            let cookie = Cookie::build((SESSION_COOKIE, token))
                .same_site(SameSite::Lax)
                .http_only(true)
                .max_age(rocket::time::Duration::hours(hours));
            cookies.add_private(cookie);

            Ok(Json(LoginResponse {
                success: true,
                user: Some(UserData::from(user)),
            }))
        }
        None => Err(Custom(
            Status::Unauthorized,
            Json(ValidationResponse::with_error(
                "credentials",
                "Invalid username or password",
            )),
        )),
    }
}

#[post("/logout")]
pub async fn api_logout(
    cookies: &rocket::http::CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
) -> Json<SuccessResponse> {
    let token = cookies
        .get_private(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string());

    if let Some(token) = token {
        let _ = invalidate_session(db, &token).await;
    }

    cookies.remove_private(Cookie::build(SESSION_COOKIE));

    Json(SuccessResponse { success: true })
}

#[derive(Serialize, Deserialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    pub user: Option<UserData>,
}

#[get("/check-session")]
pub async fn api_check_session(user: User) -> Json<SessionResponse> {
    Json(SessionResponse {
        authenticated: true,
        user: Some(UserData::from(user)),
    })
}

#[get("/check-session", rank = 2)]
pub async fn api_check_session_unauthorized() -> Custom<Json<SessionResponse>> {
    Custom(
        Status::Unauthorized,
        Json(SessionResponse {
            authenticated: false,
            user: None,
        }),
    )
}

// ---------------------------------------------------------------------------
// Clients

#[get("/clients")]
pub async fn api_get_clients(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Client>>, Status> {
    user.require_permission(Permission::ViewLedger)?;

    let clients = get_clients(db).await?;
    Ok(Json(clients))
}

#[derive(Deserialize, Validate)]
pub struct ClientRequest {
    #[validate(length(min = 1, message = "Client name is required"))]
    name: String,
    #[serde(default)]
    phone: String,
}

#[post("/clients", data = "<client>")]
pub async fn api_create_client(
    client: Json<ClientRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<CreatedResponse>, Custom<Json<ValidationResponse>>> {
    user.require_permission(Permission::RegisterClients)
        .map_err(|_| {
            AppError::Authorization("Registering clients requires staff access".to_string())
                .to_validation_response()
        })?;

    let validated = client.validate_custom()?;

    let id = create_client(db, &validated.name, &validated.phone)
        .await
        .validate_custom()?;

    Ok(Json(CreatedResponse { success: true, id }))
}

// ---------------------------------------------------------------------------
// Order ledger

#[get("/orders?<paid>")]
pub async fn api_get_orders(
    paid: Option<bool>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Order>>, Status> {
    user.require_permission(Permission::ViewLedger)?;

    let orders = list_orders(db, paid).await?;
    Ok(Json(orders))
}

#[derive(Deserialize, Validate)]
pub struct OrderRequest {
    #[validate(length(min = 1, message = "Client name is required"))]
    name: String,
    #[validate(length(min = 1, message = "Drink is required"))]
    drink: String,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    quantity: i64,
    price_sum: f64,
}

#[derive(Serialize, Deserialize)]
pub struct OrderCreatedResponse {
    pub success: bool,
    pub id: i64,
    pub event: Option<String>,
}

#[post("/orders", data = "<order>")]
pub async fn api_create_order(
    order: Json<OrderRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<OrderCreatedResponse>, Custom<Json<ValidationResponse>>> {
    user.require_permission(Permission::PlaceOrders)
        .map_err(|_| {
            AppError::Authorization("Placing orders requires staff access".to_string())
                .to_validation_response()
        })?;

    let validated = order.validate_custom()?;

    let (id, event) = create_order(
        db,
        &validated.name,
        &validated.drink,
        validated.quantity,
        validated.price_sum,
    )
    .await
    .validate_custom()?;

    Ok(Json(OrderCreatedResponse {
        success: true,
        id,
        event,
    }))
}

#[put("/orders/mark-paid")]
pub async fn api_mark_paid(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ChangesResponse>, Status> {
    user.require_permission(Permission::SettleLedger)?;

    let changes = settle_unpaid_orders(db).await?;
    Ok(Json(ChangesResponse {
        success: true,
        changes,
    }))
}

#[delete("/orders/<id>")]
pub async fn api_delete_order(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ChangesResponse>, Status> {
    user.require_permission(Permission::DeleteOrders)?;

    let changes = delete_order(db, id).await?;
    Ok(Json(ChangesResponse {
        success: true,
        changes,
    }))
}

// ---------------------------------------------------------------------------
// Events

#[get("/events")]
pub async fn api_get_events(
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Event>>, Status> {
    let events = list_events(db).await?;
    Ok(Json(events))
}

#[derive(Deserialize, Validate)]
pub struct EventRequest {
    #[validate(length(min = 1, message = "Event name is required"))]
    event_name: String,
    event_date: NaiveDate,
}

#[post("/events", data = "<event>")]
pub async fn api_create_event(
    event: Json<EventRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<CreatedResponse>, Custom<Json<ValidationResponse>>> {
    user.require_permission(Permission::ManageEvents)
        .map_err(|_| {
            AppError::Authorization("Managing events requires manager access".to_string())
                .to_validation_response()
        })?;

    let validated = event.validate_custom()?;

    let id = create_event(db, &validated.event_name, validated.event_date)
        .await
        .validate_custom()?;

    Ok(Json(CreatedResponse { success: true, id }))
}

// ---------------------------------------------------------------------------
// Drink catalog

#[get("/drinks")]
pub async fn api_get_drinks(
    _user: User,
    catalog: &State<Catalog>,
) -> Result<Json<Vec<Drink>>, Status> {
    let drinks = catalog.list().await?;
    Ok(Json(drinks))
}

#[derive(Deserialize, Validate)]
pub struct DrinkRequest {
    #[validate(length(min = 1, message = "Drink name is required"))]
    name: String,
    #[validate(range(min = 0.01, message = "Price must be positive"))]
    price: f64,
}

#[post("/drinks", data = "<drink>")]
pub async fn api_add_drink(
    drink: Json<DrinkRequest>,
    user: User,
    catalog: &State<Catalog>,
) -> Result<Json<Vec<Drink>>, Custom<Json<ValidationResponse>>> {
    user.require_permission(Permission::ManageCatalog)
        .map_err(|_| {
            AppError::Authorization("Managing the catalog requires staff access".to_string())
                .to_validation_response()
        })?;

    let validated = drink.validate_custom()?;

    let drinks = catalog
        .add(&validated.name, validated.price)
        .await
        .validate_custom()?;

    Ok(Json(drinks))
}

#[put("/drinks/<index>", data = "<drink>")]
pub async fn api_edit_drink(
    index: usize,
    drink: Json<DrinkRequest>,
    user: User,
    catalog: &State<Catalog>,
) -> Result<Json<Vec<Drink>>, Custom<Json<ValidationResponse>>> {
    user.require_permission(Permission::ManageCatalog)
        .map_err(|_| {
            AppError::Authorization("Managing the catalog requires staff access".to_string())
                .to_validation_response()
        })?;

    let validated = drink.validate_custom()?;

    let drinks = catalog
        .edit(index, &validated.name, validated.price)
        .await
        .validate_custom()?;

    Ok(Json(drinks))
}

#[put("/drinks", data = "<drinks>")]
pub async fn api_replace_drinks(
    drinks: Json<Vec<Drink>>,
    user: User,
    catalog: &State<Catalog>,
) -> Result<Json<SuccessResponse>, Status> {
    user.require_permission(Permission::ManageCatalog)?;

    catalog.replace(drinks.into_inner()).await?;
    Ok(Json(SuccessResponse { success: true }))
}

// ---------------------------------------------------------------------------
// Reports

#[derive(Responder)]
pub enum PayoutReportResponse {
    Json(Json<PayoutReport>),
    #[response(content_type = "text/csv; charset=utf-8")]
    Csv(String),
}

/// Generating the payout report settles the ledger; there is no preview.
#[post("/reports/payout?<format>")]
pub async fn api_payout_report(
    format: Option<String>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<PayoutReportResponse, Status> {
    user.require_permission(Permission::SettleLedger)?;

    let report = payout_report(db).await?;

    match format.as_deref() {
        Some("csv") => Ok(PayoutReportResponse::Csv(payout_csv(&report))),
        _ => Ok(PayoutReportResponse::Json(Json(report))),
    }
}

#[get("/reports/client/<name>")]
pub async fn api_client_report(
    name: &str,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ClientReport>, Status> {
    user.require_permission(Permission::ViewLedger)?;

    let report = client_report(db, name).await?;
    Ok(Json(report))
}

// ---------------------------------------------------------------------------
// User administration

#[derive(Deserialize, Validate, Clone)]
pub struct UserRegistrationRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    username: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    password: String,
    role: String,
}

#[post("/register", data = "<registration>")]
pub async fn api_register_user(
    registration: Json<UserRegistrationRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Custom<Json<ValidationResponse>>> {
    user.require_permission(Permission::RegisterUsers)
        .map_err(|_| {
            AppError::Authorization("Registering users requires manager access".to_string())
                .to_validation_response()
        })?;

    let validated = registration.validate_custom()?;

    let role = crate::auth::Role::from_str(&validated.role).map_err(|_| {
        Custom(
            Status::BadRequest,
            Json(ValidationResponse::with_error(
                "role",
                "Role must be 'staff' or 'manager'",
            )),
        )
    })?;

    create_user(db, &validated.username, &validated.password, role.as_str())
        .await
        .validate_custom()?;

    Ok(Status::Created)
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}
