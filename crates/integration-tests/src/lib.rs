//! Integration tests for Crumb.
//!
//! The tests drive the real client against [`MockApi`], an in-process axum
//! server that imitates the bakery REST API under `/api/`. It binds to an
//! ephemeral port on `127.0.0.1`, so tests run in parallel without setup.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p crumb-integration-tests
//! ```
//!
//! # Fixtures
//!
//! | user | email | role |
//! |---|---|---|
//! | 1 | `ana@crumb.test` | customer |
//! | 2 | `bea@crumb.test` | customer |
//! | 7 | `rosa@crumb.test` | `branch_admin` (branch 1) |
//! | 9 | `admin@localhost` | `general_admin` |
//!
//! Every account uses [`PASSWORD`]. Refresh tokens are `refresh-<user id>`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use crumb_client::config::{ClientConfig, ConfigError};
use crumb_client::{Api, KeyValueStore};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

/// Password of every fixture account.
pub const PASSWORD: &str = "pan-casero";

struct Account {
    id: i64,
    email: &'static str,
    username: &'static str,
    role: &'static str,
    branch: Option<i64>,
}

const ACCOUNTS: [Account; 4] = [
    Account {
        id: 1,
        email: "ana@crumb.test",
        username: "ana",
        role: "customer",
        branch: None,
    },
    Account {
        id: 2,
        email: "bea@crumb.test",
        username: "bea",
        role: "customer",
        branch: None,
    },
    Account {
        id: 7,
        email: "rosa@crumb.test",
        username: "rosa",
        role: "branch_admin",
        branch: Some(1),
    },
    Account {
        id: 9,
        email: "admin@localhost",
        username: "admin",
        role: "general_admin",
        branch: None,
    },
];

fn account(id: i64) -> Option<&'static Account> {
    ACCOUNTS.iter().find(|account| account.id == id)
}

static TOKEN_SERIAL: AtomicU64 = AtomicU64::new(0);

/// Build an unsigned access token for fixture user `user`.
///
/// Every call yields a distinct token.
#[must_use]
pub fn mint_token(user: i64, expires_in_secs: i64) -> String {
    let (username, email, role, branch) = account(user).map_or(
        ("ghost", "ghost@crumb.test", "customer", None),
        |a| (a.username, a.email, a.role, a.branch),
    );
    let claims = json!({
        "sub": user.to_string(),
        "exp": chrono::Utc::now().timestamp() + expires_in_secs,
        "jti": TOKEN_SERIAL.fetch_add(1, Ordering::Relaxed),
        "username": username,
        "email": email,
        "role": role,
        "branch_id": branch,
    });
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.bW9jaw")
}

/// Shared state of the mock server, inspected and steered by tests.
#[derive(Default)]
pub struct MockState {
    /// Access tokens the server accepts, by user.
    sessions: Mutex<HashMap<String, i64>>,
    hits: Mutex<HashMap<String, usize>>,
    requests: Mutex<Vec<String>>,
    orders: Mutex<Vec<Value>>,
    refresh_calls: AtomicUsize,
    /// Make `/auth/refresh` refuse every token.
    pub refresh_fails: AtomicBool,
    /// Make every authenticated endpoint answer 401.
    pub always_unauthorized: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockState {
    /// Accept `token` as an access token of `user`.
    pub fn accept(&self, token: &str, user: i64) {
        lock(&self.sessions).insert(token.to_owned(), user);
    }

    /// Forget every access token, as if they had all expired server-side.
    pub fn revoke_access_tokens(&self) {
        lock(&self.sessions).clear();
    }

    /// Number of `/auth/refresh` calls so far.
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Number of requests to `route`, e.g. `"GET /api/orders/mine"`.
    pub fn hits(&self, route: &str) -> usize {
        lock(&self.hits).get(route).copied().unwrap_or(0)
    }

    /// Every request received, in order, with its query string.
    pub fn requests(&self) -> Vec<String> {
        lock(&self.requests).clone()
    }

    /// Bodies of every `POST /orders` received.
    pub fn received_orders(&self) -> Vec<Value> {
        lock(&self.orders).clone()
    }

    fn user_for(&self, headers: &HeaderMap) -> Result<i64, Response> {
        if self.always_unauthorized.load(Ordering::SeqCst) {
            return Err(unauthorized());
        }
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .and_then(|token| lock(&self.sessions).get(token).copied())
            .ok_or_else(unauthorized)
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"detail": "Given token not valid for any token type"})),
    )
        .into_response()
}

/// A running mock API.
pub struct MockApi {
    pub base: url::Url,
    pub state: Arc<MockState>,
    server: JoinHandle<()>,
}

impl MockApi {
    /// Start a server on an ephemeral port.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the listener cannot be bound.
    pub async fn start() -> std::io::Result<Self> {
        let state = Arc::new(MockState::default());
        let api = Router::new()
            .route("/auth/login", post(login))
            .route("/auth/refresh", post(refresh))
            .route("/auth/register", post(register))
            .route("/products", get(products))
            .route("/products/{id}", get(product))
            .route("/offers", get(offers))
            .route("/offers/{id}", get(offer))
            .route("/orders", get(all_orders).post(create_order))
            .route("/orders/mine", get(my_orders))
            .route("/orders/{id}", get(order).delete(delete_order))
            .route("/orders/{id}/status", patch(set_status))
            .route("/users/me", get(me))
            .with_state(Arc::clone(&state));
        let app = Router::new()
            .nest("/api", api)
            .layer(middleware::from_fn_with_state(Arc::clone(&state), count_hits));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        let base = url::Url::parse(&format!("http://{addr}/api/"))
            .map_err(|e| std::io::Error::other(e.to_string()))?;

        Ok(Self {
            base,
            state,
            server,
        })
    }

    /// Client configuration pointing at this server.
    ///
    /// # Errors
    ///
    /// Never fails for a started server; kept fallible to mirror
    /// `ClientConfig::new`.
    pub fn config(&self) -> Result<ClientConfig, ConfigError> {
        ClientConfig::new(self.base.as_str())
    }

    /// Connect a client, restoring whatever session `storage` holds.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the client cannot be built.
    pub async fn connect(&self, storage: Arc<dyn KeyValueStore>) -> crumb_client::Result<Api> {
        Api::connect(&self.config()?, storage).await
    }
}

impl Drop for MockApi {
    fn drop(&mut self) {
        self.server.abort();
    }
}

// =============================================================================
// Handlers
// =============================================================================

async fn count_hits(State(state): State<Arc<MockState>>, request: Request, next: Next) -> Response {
    let route = format!("{} {}", request.method(), request.uri().path());
    lock(&state.requests).push(format!("{} {}", request.method(), request.uri()));
    *lock(&state.hits).entry(route).or_insert(0) += 1;
    next.run(request).await
}

fn tokens_for(state: &MockState, user: i64) -> String {
    let access = mint_token(user, 3600);
    state.accept(&access, user);
    access
}

async fn login(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    let found = ACCOUNTS
        .iter()
        .find(|a| Some(a.email) == body["email"].as_str());
    match found {
        Some(account) if body["password"] == PASSWORD => {
            let access = tokens_for(&state, account.id);
            Json(json!({"access": access, "refresh": format!("refresh-{}", account.id)}))
                .into_response()
        }
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "No active account found with the given credentials"})),
        )
            .into_response(),
    }
}

async fn refresh(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let user = body["refresh"]
        .as_str()
        .and_then(|token| token.strip_prefix("refresh-"))
        .and_then(|id| id.parse::<i64>().ok());
    match user {
        Some(user) if !state.refresh_fails.load(Ordering::SeqCst) => {
            Json(json!({"access": tokens_for(&state, user)})).into_response()
        }
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Token is invalid or expired", "code": "token_not_valid"})),
        )
            .into_response(),
    }
}

async fn register(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    if ACCOUNTS.iter().any(|a| Some(a.email) == body["email"].as_str()) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"email": ["A user with that email already exists."]})),
        )
            .into_response();
    }
    let access = tokens_for(&state, 2);
    (
        StatusCode::CREATED,
        Json(json!({"access": access, "refresh": "refresh-2"})),
    )
        .into_response()
}

fn product_fixtures() -> Vec<Value> {
    vec![
        json!({"id": 1, "name": "Medialuna", "price": "0.80", "stock": 50, "branch": 1, "category": "facturas"}),
        json!({"id": 2, "name": "Cafe", "price": "1.50", "branch": 1}),
        json!({"id": 3, "name": "Torta de chocolate", "price": "18.00", "stock": 1, "branch": 1}),
    ]
}

fn offer_fixtures() -> Vec<Value> {
    vec![
        json!({
            "id": 9, "name": "Desayuno", "price": "5.00", "branch": 1,
            "products": [
                {"product": 1, "name": "Medialuna", "quantity": 3},
                {"product": 2, "name": "Cafe", "quantity": 1}
            ]
        }),
        json!({
            "id": 10, "name": "Promo verano", "price": "3.00", "branch": 1,
            "ends_at": "2020-03-01T00:00:00Z",
            "products": [{"product": 1, "name": "Medialuna", "quantity": 2}]
        }),
    ]
}

fn find(items: Vec<Value>, id: i64) -> Response {
    items
        .into_iter()
        .find(|item| item["id"] == id)
        .map_or_else(
            || (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response(),
            |item| Json(item).into_response(),
        )
}

async fn products() -> Json<Value> {
    let results = product_fixtures();
    Json(json!({"count": results.len(), "next": null, "previous": null, "results": results}))
}

async fn product(Path(id): Path<i64>) -> Response {
    find(product_fixtures(), id)
}

async fn offers() -> Json<Value> {
    Json(Value::Array(offer_fixtures()))
}

async fn offer(Path(id): Path<i64>) -> Response {
    find(offer_fixtures(), id)
}

fn order_fixture(id: i64, status: &str, customer: i64) -> Value {
    json!({
        "id": id,
        "status": status,
        "delivery": {"mode": "home_delivery", "address": "Calle 12 #345"},
        "items": [
            {"type": "product", "product": 1, "name": "Medialuna", "quantity": 6, "unit_price": "0.80"}
        ],
        "total": "4.80",
        "branch": 1,
        "customer": customer,
        "created_at": "2024-05-02T09:30:00Z",
        "deletable": status == "delivered",
        "deletable_at": "2024-05-03T09:30:00Z"
    })
}

async fn all_orders(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    match state.user_for(&headers) {
        Ok(_) => Json(json!([
            order_fixture(55, "delivered", 1),
            order_fixture(56, "received", 2),
        ]))
        .into_response(),
        Err(rejection) => rejection,
    }
}

async fn my_orders(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    match state.user_for(&headers) {
        Ok(user) => Json(json!({
            "count": 1,
            "results": [order_fixture(55, "delivered", user)]
        }))
        .into_response(),
        Err(rejection) => rejection,
    }
}

async fn order(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    match state.user_for(&headers) {
        Ok(user) => {
            let status = if id == 56 { "received" } else { "delivered" };
            Json(order_fixture(id, status, user)).into_response()
        }
        Err(rejection) => rejection,
    }
}

async fn create_order(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let user = match state.user_for(&headers) {
        Ok(user) => user,
        Err(rejection) => return rejection,
    };
    let id = {
        let mut orders = lock(&state.orders);
        orders.push(body.clone());
        100 + i64::try_from(orders.len()).unwrap_or_default()
    };
    (
        StatusCode::CREATED,
        Json(json!({
            "id": id,
            "status": "received",
            "delivery": body["delivery"],
            "items": [],
            "total": body["total"],
            "branch": body["branch"],
            "customer": user,
            "created_at": chrono::Utc::now().to_rfc3339(),
        })),
    )
        .into_response()
}

async fn set_status(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    match state.user_for(&headers) {
        Ok(_) => {
            let status = body["status"].as_str().unwrap_or("received");
            Json(order_fixture(id, status, 1)).into_response()
        }
        Err(rejection) => rejection,
    }
}

async fn delete_order(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    match state.user_for(&headers) {
        Ok(_) => (
            StatusCode::CONFLICT,
            Json(json!({
                "code": "too_early",
                "message": "Orders can be deleted 24 hours after delivery",
                "time_remaining": "3h 10m"
            })),
        )
            .into_response(),
        Err(rejection) => rejection,
    }
}

async fn me(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    let user = match state.user_for(&headers) {
        Ok(user) => user,
        Err(rejection) => return rejection,
    };
    let Some(account) = account(user) else {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response();
    };
    Json(json!({
        "id": account.id,
        "username": account.username,
        "email": account.email,
        "name": format!("{} Tester", account.username),
        "role": account.role,
        "branch": account.branch,
        "phone": "555-0101"
    }))
    .into_response()
}
