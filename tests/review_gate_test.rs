mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;

use storefront_api::entities::OrderStatus;
use storefront_api::errors::ServiceError;

use common::TestApp;

struct Fixture {
    owner_id: uuid::Uuid,
    store_id: uuid::Uuid,
    customer_id: uuid::Uuid,
    product_id: uuid::Uuid,
}

async fn fixture(app: &TestApp) -> Fixture {
    let owner = app.seed_owner("owner@example.com").await;
    let store = app.seed_store(owner.id, "gadgets").await;
    let customer = app.seed_customer("buyer@example.com", store.id).await;
    let product = app
        .seed_product(owner.id, store.id, "widget", dec!(9.99), 20)
        .await;
    Fixture {
        owner_id: owner.id,
        store_id: store.id,
        customer_id: customer.id,
        product_id: product.id,
    }
}

/// Buys the product and moves the resulting order to the given status.
async fn purchase(app: &TestApp, fx: &Fixture, status: OrderStatus) -> uuid::Uuid {
    app.state
        .services
        .carts
        .add_item(fx.customer_id, fx.store_id, fx.product_id, 1)
        .await
        .unwrap();
    let order = app
        .state
        .services
        .orders
        .create_order(fx.customer_id, fx.store_id, "1 Main St")
        .await
        .unwrap();
    if status != OrderStatus::Pending {
        app.state
            .services
            .orders
            .update_order_status(fx.owner_id, order.id, fx.store_id, status)
            .await
            .unwrap();
    }
    order.id
}

#[tokio::test]
async fn review_requires_a_fulfilled_purchase() {
    let app = TestApp::new().await;
    let fx = fixture(&app).await;
    let reviews = &app.state.services.reviews;

    // Never purchased.
    let err = reviews
        .create_review(fx.customer_id, fx.product_id, 5, "great")
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));

    // Purchased but still pending: not eligible yet.
    purchase(&app, &fx, OrderStatus::Pending).await;
    let err = reviews
        .create_review(fx.customer_id, fx.product_id, 5, "great")
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));
}

#[tokio::test]
async fn shipped_purchase_unlocks_exactly_one_review() {
    let app = TestApp::new().await;
    let fx = fixture(&app).await;
    let reviews = &app.state.services.reviews;

    let order_id = purchase(&app, &fx, OrderStatus::Shipped).await;

    let review = reviews
        .create_review(fx.customer_id, fx.product_id, 4, "solid widget")
        .await
        .unwrap();
    assert_eq!(review.order_id, order_id);
    assert_eq!(review.rating, 4);

    // The same purchase cannot be reviewed twice.
    let err = reviews
        .create_review(fx.customer_id, fx.product_id, 5, "changed my mind")
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));
}

#[tokio::test]
async fn repeat_purchase_earns_a_fresh_review_slot() {
    let app = TestApp::new().await;
    let fx = fixture(&app).await;
    let reviews = &app.state.services.reviews;

    let first_order = purchase(&app, &fx, OrderStatus::Completed).await;
    reviews
        .create_review(fx.customer_id, fx.product_id, 3, "ok")
        .await
        .unwrap();

    let second_order = purchase(&app, &fx, OrderStatus::Completed).await;
    let second_review = reviews
        .create_review(fx.customer_id, fx.product_id, 5, "better this time")
        .await
        .unwrap();
    assert_eq!(second_review.order_id, second_order);
    assert_ne!(second_review.order_id, first_order);
}

#[tokio::test]
async fn rating_bounds_are_enforced() {
    let app = TestApp::new().await;
    let fx = fixture(&app).await;
    purchase(&app, &fx, OrderStatus::Shipped).await;

    let reviews = &app.state.services.reviews;
    for rating in [0, 6, -1] {
        let err = reviews
            .create_review(fx.customer_id, fx.product_id, rating, "x")
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }
}

#[tokio::test]
async fn aggregates_follow_the_review_rows() {
    let app = TestApp::new().await;
    let fx = fixture(&app).await;
    let reviews = &app.state.services.reviews;

    let empty = reviews.get_product_reviews(fx.product_id).await.unwrap();
    assert_eq!(empty.review_count, 0);
    assert_eq!(empty.average_rating, 0.0);

    purchase(&app, &fx, OrderStatus::Completed).await;
    reviews
        .create_review(fx.customer_id, fx.product_id, 2, "meh")
        .await
        .unwrap();
    purchase(&app, &fx, OrderStatus::Completed).await;
    reviews
        .create_review(fx.customer_id, fx.product_id, 5, "grew on me")
        .await
        .unwrap();

    let summary = reviews.get_product_reviews(fx.product_id).await.unwrap();
    assert_eq!(summary.review_count, 2);
    assert!((summary.average_rating - 3.5).abs() < f64::EPSILON);
    assert_eq!(summary.reviews.len(), 2);
    assert_eq!(summary.reviews[0].reviewer_name, "Customer Test");
}

/// The review prompt lists fulfilled orders only, flagging products the
/// customer has already reviewed.
#[tokio::test]
async fn reviewable_orders_track_fulfilment_and_review_state() {
    let app = TestApp::new().await;
    let fx = fixture(&app).await;
    let reviews = &app.state.services.reviews;

    assert!(reviews
        .reviewable_orders(fx.customer_id)
        .await
        .unwrap()
        .is_empty());

    // A pending purchase does not show up.
    purchase(&app, &fx, OrderStatus::Pending).await;
    assert!(reviews
        .reviewable_orders(fx.customer_id)
        .await
        .unwrap()
        .is_empty());

    let shipped_order = purchase(&app, &fx, OrderStatus::Shipped).await;
    let listed = reviews.reviewable_orders(fx.customer_id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].order_id, shipped_order);
    assert_eq!(listed[0].products.len(), 1);
    assert_eq!(listed[0].products[0].product_id, fx.product_id);
    assert!(!listed[0].products[0].has_reviewed);

    reviews
        .create_review(fx.customer_id, fx.product_id, 4, "good")
        .await
        .unwrap();
    let listed = reviews.reviewable_orders(fx.customer_id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].products[0].has_reviewed);
}
