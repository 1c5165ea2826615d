//! Integration tests for the RocketShoes cart.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p rocketshoes-integration-tests
//! ```
//!
//! No external services are needed. [`FakeApi::spawn`] serves the catalog's
//! `products/{id}` and `stock/{id}` endpoints from memory on an ephemeral
//! local port, so the real `reqwest` client, file storage and cart store run
//! end to end.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// In-memory stand-in for the catalog API.
#[derive(Debug, Default)]
pub struct FakeApi {
    products: Mutex<HashMap<i32, Value>>,
    stock: Mutex<HashMap<i32, u32>>,
    stock_failure: Mutex<Option<StatusCode>>,
    requests: Mutex<Vec<String>>,
    last_authorization: Mutex<Option<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FakeApi {
    /// Serve `body` (any JSON) for `products/{id}`.
    pub fn product(&self, id: i32, body: Value) {
        lock(&self.products).insert(id, body);
    }

    pub fn stock(&self, id: i32, amount: u32) {
        lock(&self.stock).insert(id, amount);
    }

    /// Answer every stock request with `status` instead of data.
    pub fn fail_stock_with(&self, status: Option<StatusCode>) {
        *lock(&self.stock_failure) = status;
    }

    /// Paths requested so far, e.g. `["products/1", "stock/1"]`.
    pub fn requests(&self) -> Vec<String> {
        lock(&self.requests).clone()
    }

    pub fn requests_to(&self, prefix: &str) -> usize {
        lock(&self.requests)
            .iter()
            .filter(|path| path.starts_with(prefix))
            .count()
    }

    pub fn last_authorization(&self) -> Option<String> {
        lock(&self.last_authorization).clone()
    }

    fn record(&self, path: String, headers: &HeaderMap) {
        lock(&self.requests).push(path);
        *lock(&self.last_authorization) = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
    }

    /// Start serving on `127.0.0.1` at an ephemeral port.
    pub async fn spawn(self) -> TestServer {
        let api = Arc::new(self);

        let app = Router::new()
            .route("/products/{id}", get(product))
            .route("/stock/{id}", get(stock))
            .with_state(Arc::clone(&api));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestServer {
            base_url: format!("http://{addr}"),
            api,
            handle,
        }
    }
}

/// A running [`FakeApi`]; stops when dropped.
pub struct TestServer {
    pub base_url: String,
    pub api: Arc<FakeApi>,
    handle: JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn product(
    State(api): State<Arc<FakeApi>>,
    Path(id): Path<i32>,
    headers: HeaderMap,
) -> Response {
    api.record(format!("products/{id}"), &headers);

    let body = lock(&api.products).get(&id).cloned();
    body.map_or_else(
        || (StatusCode::NOT_FOUND, Json(json!({}))).into_response(),
        |body| Json(body).into_response(),
    )
}

async fn stock(
    State(api): State<Arc<FakeApi>>,
    Path(id): Path<i32>,
    headers: HeaderMap,
) -> Response {
    api.record(format!("stock/{id}"), &headers);

    let failure = *lock(&api.stock_failure);
    if let Some(status) = failure {
        let mut response = (status, "stock service failure").into_response();
        if status == StatusCode::TOO_MANY_REQUESTS {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, header::HeaderValue::from_static("30"));
        }
        return response;
    }

    let amount = lock(&api.stock).get(&id).copied();
    amount.map_or_else(
        || (StatusCode::NOT_FOUND, Json(json!({}))).into_response(),
        |amount| Json(json!({ "id": id, "amount": amount })).into_response(),
    )
}
