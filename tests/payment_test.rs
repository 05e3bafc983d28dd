mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

use storefront_api::entities::{self, payment_transaction::TransactionStatus, OrderStatus};
use storefront_api::errors::ServiceError;
use storefront_api::services::payments::CardDetails;

use common::TestApp;

fn test_card() -> CardDetails {
    CardDetails {
        card_number: "4111 1111 1111 1111".to_string(),
        cvv: "123".to_string(),
        expiry: "09/27".to_string(),
    }
}

async fn pending_order(app: &TestApp) -> (uuid::Uuid, uuid::Uuid) {
    let owner = app.seed_owner("owner@example.com").await;
    let store = app.seed_store(owner.id, "gadgets").await;
    let customer = app.seed_customer("buyer@example.com", store.id).await;
    let widget = app
        .seed_product(owner.id, store.id, "widget", dec!(19.99), 5)
        .await;

    app.state
        .services
        .carts
        .add_item(customer.id, store.id, widget.id, 2)
        .await
        .unwrap();
    let order = app
        .state
        .services
        .orders
        .create_order(customer.id, store.id, "1 Main St")
        .await
        .unwrap();
    (customer.id, order.id)
}

#[tokio::test]
async fn capture_moves_order_to_paid_with_masked_info() {
    let app = TestApp::new().await;
    let (customer_id, order_id) = pending_order(&app).await;

    let order = app
        .state
        .services
        .payments
        .process_payment(customer_id, order_id, test_card())
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(order.payment_info.as_deref(), Some("****1111"));
    assert_eq!(app.cart_line_count(customer_id).await, 0);

    let transaction = entities::PaymentTransaction::find()
        .filter(entities::payment_transaction::Column::OrderId.eq(order_id))
        .one(&*app.state.db)
        .await
        .unwrap()
        .expect("transaction row missing");
    assert_eq!(transaction.status, TransactionStatus::Completed);
    assert_eq!(transaction.amount, dec!(39.98));

    let method = entities::PaymentMethod::find_by_id(transaction.payment_method_id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .expect("payment method missing");
    // Only the masked form is ever stored.
    assert_eq!(method.account_details, "****1111");
}

#[tokio::test]
async fn paying_a_non_pending_order_conflicts_without_writes() {
    let app = TestApp::new().await;
    let (customer_id, order_id) = pending_order(&app).await;

    let payments = &app.state.services.payments;
    payments
        .process_payment(customer_id, order_id, test_card())
        .await
        .unwrap();

    let err = payments
        .process_payment(customer_id, order_id, test_card())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));

    // Still exactly one transaction and one method row.
    let transactions = entities::PaymentTransaction::find()
        .filter(entities::payment_transaction::Column::OrderId.eq(order_id))
        .count(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(transactions, 1);
    let methods = entities::PaymentMethod::find()
        .count(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(methods, 1);
}

#[tokio::test]
async fn invalid_card_fields_fail_before_any_write() {
    let app = TestApp::new().await;
    let (customer_id, order_id) = pending_order(&app).await;

    let bad = CardDetails {
        card_number: "4111".to_string(),
        ..test_card()
    };
    let err = app
        .state
        .services
        .payments
        .process_payment(customer_id, order_id, bad)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let order = app
        .state
        .services
        .orders
        .get_customer_order(customer_id, order_id)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert!(order.payment_info.is_none());
    let transactions = entities::PaymentTransaction::find()
        .count(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(transactions, 0);
}

#[tokio::test]
async fn customers_cannot_pay_each_others_orders() {
    let app = TestApp::new().await;
    let (_, order_id) = pending_order(&app).await;
    let stranger = uuid::Uuid::new_v4();

    let err = app
        .state
        .services
        .payments
        .process_payment(stranger, order_id, test_card())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}
