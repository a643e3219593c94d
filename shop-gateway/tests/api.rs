//! Whole-API flows driven through the router with `tower::ServiceExt`.

use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use serde_json::{json, Value};
use shop_gateway::{config::Config, routes::create_router, state::AppState};
use shop_store::{Store, TokenSettings};
use tower::ServiceExt;

struct Client {
    app: Router,
    token: Option<String>,
    cookie: Option<String>,
}

impl Client {
    fn new(app: &Router) -> Self {
        Self { app: app.clone(), token: None, cookie: None }
    }

    fn with_token(app: &Router, token: String) -> Self {
        Self { app: app.clone(), token: Some(token), cookie: None }
    }

    async fn call(&mut self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = &self.token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie.as_str());
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        };
        let request = match request {
            Ok(r) => r,
            Err(e) => panic!("failed to build request: {e}"),
        };
        let response = match self.app.clone().oneshot(request).await {
            Ok(r) => r,
            Err(e) => panic!("handler error: {e}"),
        };
        self.remember_cookie(&response);
        let status = response.status();
        let bytes = match axum::body::to_bytes(response.into_body(), 1 << 20).await {
            Ok(b) => b,
            Err(e) => panic!("failed to read body: {e}"),
        };
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            match serde_json::from_slice(&bytes) {
                Ok(v) => v,
                Err(e) => panic!("invalid JSON from {uri}: {e}"),
            }
        };
        (status, value)
    }

    fn remember_cookie(&mut self, response: &Response<Body>) {
        let set = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next());
        if let Some(pair) = set {
            self.cookie = Some(pair.to_owned());
        }
    }
}

async fn setup() -> (Router, Store) {
    let store = match Store::in_memory().await {
        Ok(s) => s,
        Err(e) => panic!("failed to open store: {e}"),
    };
    let app = create_router(AppState::new(store.clone(), &Config::default()));
    (app, store)
}

async fn staff(app: &Router, store: &Store) -> Client {
    let user = match store.ensure_admin("admin@shop.test", "admin-password").await {
        Ok(u) => u,
        Err(e) => panic!("bootstrap failed: {e}"),
    };
    let token = match store.issue_tokens(user.id, &TokenSettings::default()).await {
        Ok(pair) => pair.access,
        Err(e) => panic!("issue failed: {e}"),
    };
    Client::with_token(app, token)
}

async fn seed_product(admin: &mut Client, title: &str, price: &str) -> i64 {
    let (status, product) = admin
        .call(
            "POST",
            "/api/v1/products",
            Some(json!({"title": title, "description": "seeded", "price": price, "color": ["Ivory"]})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{product}");
    product["id"].as_i64().unwrap_or_default()
}

#[tokio::test]
async fn anonymous_shopper_checks_out() {
    let (app, store) = setup().await;
    let mut admin = staff(&app, &store).await;
    let (status, _) = admin.call("POST", "/api/v1/color", Some(json!({"name": "Ivory"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let robe = seed_product(&mut admin, "Ivory robe", "64.00").await;
    let slip = seed_product(&mut admin, "Ivory slip", "30.50").await;

    let mut shopper = Client::new(&app);
    let (status, body) = shopper
        .call("POST", "/api/v1/cart/add", Some(json!({"product_id": robe, "quantity": 1})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["detail"], "Product added to cart");
    assert!(shopper.cookie.is_some(), "session cookie must be issued");

    let (status, _) = shopper
        .call("POST", "/api/v1/cart/add", Some(json!({"product_id": slip, "quantity": 2})))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, cart) = shopper.call("GET", "/api/v1/cart", None).await;
    assert_eq!(cart["total"], "125.00");
    assert_eq!(cart["items"].as_array().map(Vec::len), Some(2));

    let (status, order) = shopper
        .call(
            "POST",
            "/api/v1/order",
            Some(json!({"delivery_cost": "5.00", "email": "guest@shop.test", "payment_method": "card"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    assert_eq!(order["total_price"], "130.00");
    assert_eq!(order["email"], "guest@shop.test");
    assert_eq!(order["payment_method"], "card");

    let (_, cart) = shopper.call("GET", "/api/v1/cart", None).await;
    assert_eq!(cart["items"], json!([]));

    let order_id = order["id"].as_i64().unwrap_or_default();
    let (status, body) = shopper
        .call(
            "POST",
            &format!("/api/v1/order/{order_id}/set-delivery"),
            Some(json!({"method": "post", "city": "Lviv", "address": "Rynok 1", "delivery_cost": "12.00"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["detail"], "Delivery information updated successfully");

    let (_, order) = shopper.call("GET", &format!("/api/v1/order/{order_id}"), None).await;
    assert_eq!(order["total_price"], "137.00");
    assert_eq!(order["delivery"]["city"], "Lviv");

    let mut stranger = Client::new(&app);
    let (status, _) = stranger.call("GET", &format!("/api/v1/order/{order_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, orders) = stranger.call("GET", "/api/v1/order", None).await;
    assert_eq!(orders, json!([]));
}

#[tokio::test]
async fn signed_in_checkout_copies_profile_contact() {
    let (app, store) = setup().await;
    let mut admin = staff(&app, &store).await;
    let (status, _) = admin.call("POST", "/api/v1/color", Some(json!({"name": "Ivory"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let bra = seed_product(&mut admin, "Ivory bra", "40.00").await;

    let mut anon = Client::new(&app);
    let (status, _) = anon
        .call(
            "POST",
            "/api/v1/user/register",
            Some(json!({
                "email": "olha@shop.test",
                "password": "secret-pass",
                "confirm_password": "secret-pass",
                "first_name": "Olha",
                "last_name": "Koval",
                "phone": "+380671234567",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, tokens) = anon
        .call("POST", "/api/v1/user/login", Some(json!({"email": "olha@shop.test", "password": "secret-pass"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    let mut olha = Client::with_token(&app, tokens["access"].as_str().unwrap_or_default().to_owned());

    let (status, _) = olha.call("POST", "/api/v1/cart/add", Some(json!({"product_id": bra}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(olha.cookie.is_none(), "signed-in users are not given a session cookie");

    let (status, order) = olha
        .call("POST", "/api/v1/order/create", Some(json!({"first_name": "Ignored"})))
        .await;
    assert_eq!(status, StatusCode::OK, "{order}");
    assert_eq!(order["first_name"], "Olha");
    assert_eq!(order["phone"], "+380671234567");
    assert_eq!(order["total_price"], "40.00");

    let (status, _) = olha.call("POST", "/api/v1/order", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn non_staff_cannot_write_catalog() {
    let (app, _) = setup().await;
    let mut anon = Client::new(&app);
    let (status, _) = anon
        .call(
            "POST",
            "/api/v1/user/register",
            Some(json!({"email": "max@shop.test", "password": "password-1", "confirm_password": "password-1"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, tokens) = anon
        .call("POST", "/api/v1/user/login", Some(json!({"email": "max@shop.test", "password": "password-1"})))
        .await;
    let mut max = Client::with_token(&app, tokens["access"].as_str().unwrap_or_default().to_owned());

    let (status, body) = max.call("POST", "/api/v1/categories", Some(json!({"name": "Sleepwear"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "You do not have permission to perform this action.");

    let (status, _) = max.call("GET", "/api/v1/categories", None).await;
    assert_eq!(status, StatusCode::OK);
}
