//! HTTP surface tests: webhook acknowledgment policy, payment fallback
//! routing, and request validation.

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use common::{
    seed_customer, seed_product, test_app_config, test_db, test_event_sender, RecordingMailer,
    StubGateway,
};
use rust_decimal_macros::dec;
use sea_orm::DatabaseConnection;
use serde_json::json;
use std::sync::Arc;
use storefront_api::{
    app_router,
    cart::store::InMemoryCartStore,
    entities::OrderModel,
    handlers::AppServices,
    services::{
        orders::ShippingInfo,
        pricing::{compute_pricing, DiscountPolicy, PricedLine},
    },
    AppState,
};
use tower::ServiceExt;
use uuid::Uuid;

struct TestApp {
    router: Router,
    db: Arc<DatabaseConnection>,
    gateway: Arc<StubGateway>,
    state: Arc<AppState>,
}

async fn test_app() -> TestApp {
    let db = Arc::new(test_db().await);
    let events = test_event_sender();
    let gateway = Arc::new(StubGateway::new());
    let mailer = Arc::new(RecordingMailer::new());
    let config = test_app_config();

    let services = AppServices::new(
        db.clone(),
        events.clone(),
        Arc::new(InMemoryCartStore::new()),
        gateway.clone(),
        mailer,
        &config,
    );
    let state = Arc::new(AppState {
        db: db.clone(),
        config,
        event_sender: events,
        services,
    });

    TestApp {
        router: app_router(state.clone()),
        db,
        gateway,
        state,
    }
}

impl TestApp {
    async fn post_json(&self, uri: &str, body: serde_json::Value) -> axum::response::Response {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request");
        self.router.clone().oneshot(request).await.expect("response")
    }

    async fn post_empty(&self, uri: &str) -> axum::response::Response {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .expect("request");
        self.router.clone().oneshot(request).await.expect("response")
    }

    async fn pending_order(&self) -> OrderModel {
        let customer = seed_customer(&self.db).await;
        let product = seed_product(&self.db, "Headphones", dec!(1000), false).await;
        let pricing = compute_pricing(
            vec![PricedLine {
                product_id: product.id,
                variant_id: None,
                product_name: product.name.clone(),
                variant_label: None,
                unit_price: product.price,
                quantity: 1,
                line_subtotal: dec!(1000),
                promo_eligible: false,
            }],
            DiscountPolicy::PromoPairs,
            vec![],
        );
        self.state
            .services
            .orders
            .build_order(
                customer.id,
                &pricing,
                &ShippingInfo {
                    address: "Rua das Flores, 100".to_string(),
                },
            )
            .await
            .expect("order created")
    }
}

#[tokio::test]
async fn webhook_acknowledges_even_when_the_gateway_lookup_fails() {
    let app = test_app().await;
    // No payment is programmed: the lookup inside reconciliation errors.
    let response = app
        .post_empty("/webhooks/payments?topic=payment&id=broken")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn webhook_acknowledges_unrelated_topics() {
    let app = test_app().await;
    let response = app
        .post_empty("/webhooks/payments?type=merchant_order&data.id=42")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn failed_pix_creation_redirects_to_the_order_detail() {
    let app = test_app().await;
    let order = app.pending_order().await;
    app.gateway.fail_creations();

    let response = app
        .post_empty(&format!("/orders/{}/payments/pix", order.id))
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert_eq!(location, format!("/orders/{}", order.id));
}

#[tokio::test]
async fn hosted_checkout_returns_the_redirect_url() {
    let app = test_app().await;
    let order = app.pending_order().await;

    let response = app
        .post_empty(&format!("/orders/{}/payments/hosted-checkout", order.id))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn checkout_with_a_blank_street_is_a_validation_error() {
    let app = test_app().await;
    let response = app
        .post_json(
            "/checkout",
            json!({
                "session_id": "sess",
                "customer_id": Uuid::new_v4(),
                "address": {
                    "street": "",
                    "number": "100",
                    "neighborhood": "Centro",
                    "city": "Curitiba",
                    "state": "PR",
                    "zip_code": "80000-000",
                }
            }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn adding_an_unknown_product_is_a_404() {
    let app = test_app().await;
    let response = app
        .post_json(
            "/carts/sess/items",
            json!({ "product_id": Uuid::new_v4() }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_line_keys_are_rejected_as_bad_requests() {
    let app = test_app().await;
    let request = Request::builder()
        .method("PUT")
        .uri("/carts/sess/items/legacy-12-34")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "action": "increase" }).to_string()))
        .expect("request");
    let response = app.router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
