//! Integration tests for checkout session creation and free orders

mod common;

use ticketdesk_payments::{CheckoutOutcome, PaymentError, PaymentsConfig};
use ticketdesk_types::{FreeOrderItem, FreeOrderRequest};

use common::{checkout, harness, harness_with, item};

#[tokio::test]
async fn test_fee_split_on_paid_checkout() {
    let h = harness();

    let outcome = h
        .service
        .create_checkout_session(&checkout(vec![item("tt_a", 500, 2), item("tt_b", 1000, 1)]))
        .await
        .unwrap();

    let CheckoutOutcome::Paid(paid) = outcome else {
        panic!("expected a paid checkout");
    };
    assert_eq!(paid.total, 2000);
    assert_eq!(paid.platform_fee, 200);
    assert_eq!(paid.merchant_receives, 1800);
    assert_eq!(paid.currency, "usd");

    let request = h.payments.requests.get(&paid.session_id).unwrap();
    assert_eq!(request.application_fee_amount, 200);
    assert_eq!(request.destination, "acct_merchant");
    assert_eq!(request.lines.len(), 2);
    assert_eq!(request.metadata["buyer_email"], "jane@x.com");
    assert_eq!(
        request.metadata["items"],
        r#"[{"ticket_type_id":"tt_a","quantity":2},{"ticket_type_id":"tt_b","quantity":1}]"#
    );
    assert!(request
        .success_url
        .ends_with("/payment/success?session_id={CHECKOUT_SESSION_ID}"));
}

#[tokio::test]
async fn test_fee_rounds_up() {
    let h = harness_with(common::config().with_platform_fee(7.5));

    let outcome = h
        .service
        .create_checkout_session(&checkout(vec![item("tt_a", 999, 1)]))
        .await
        .unwrap();

    let CheckoutOutcome::Paid(paid) = outcome else {
        panic!("expected a paid checkout");
    };
    // 999 * 7.5% = 74.925
    assert_eq!(paid.platform_fee, 75);
    assert_eq!(paid.merchant_receives, 924);
}

#[tokio::test]
async fn test_zero_total_skips_stripe_even_unconfigured() {
    let h = harness_with(PaymentsConfig::new("http://localhost:5173"));

    let outcome = h
        .service
        .create_checkout_session(&checkout(vec![item("tt_free", 0, 2)]))
        .await
        .unwrap();

    let CheckoutOutcome::Free(free) = outcome else {
        panic!("expected the free path");
    };
    assert!(free.free);
    assert!(free.url.ends_with("/payment/success?free=true"));
    assert_eq!(free.metadata.items[0].quantity, 2);
    assert!(h.payments.requests.is_empty());
}

#[tokio::test]
async fn test_paid_checkout_requires_stripe_configuration() {
    let no_key = harness_with(PaymentsConfig::new("http://localhost:5173"));
    let err = no_key
        .service
        .create_checkout_session(&checkout(vec![item("tt_a", 500, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::Configuration(_)));

    let no_account = harness_with(PaymentsConfig::new("http://localhost:5173").with_secret_key("sk_test"));
    let err = no_account
        .service
        .create_checkout_session(&checkout(vec![item("tt_a", 500, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::Configuration(_)));
    assert!(no_account.payments.requests.is_empty());
}

#[tokio::test]
async fn test_checkout_rejects_empty_and_ambiguous_orders() {
    let h = harness();

    let err = h
        .service
        .create_checkout_session(&checkout(vec![item("tt_a", 500, 0)]))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::Rejected(ref m) if m == "No valid ticket items selected."));

    let mut request = checkout(vec![item("tt_a", 500, 1)]);
    request.buyer_name = "Jane|Doe".to_string();
    let err = h.service.create_checkout_session(&request).await.unwrap_err();
    assert!(matches!(err, PaymentError::Rejected(_)));
    assert!(h.payments.requests.is_empty());
}

#[tokio::test]
async fn test_negative_line_is_refused_before_any_issuance() {
    let h = harness();
    let request = checkout(vec![item("tt_vip", 10_000, 1), item("tt_dummy", -10_000, 1)]);

    let err = h.service.create_checkout_session(&request).await.unwrap_err();
    assert!(matches!(err, PaymentError::Rejected(ref m) if m.contains("tt_dummy")));

    // The same lines submitted straight to the free path
    let err = h
        .service
        .create_free_order(&FreeOrderRequest::from(&request))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::Rejected(_)));

    assert!(h.payments.requests.is_empty());
    assert_eq!(h.provider.call_count("POST", "/issued_tickets"), 0);
}

#[tokio::test]
async fn test_overflowing_total_is_rejected() {
    let h = harness();

    let err = h
        .service
        .create_checkout_session(&checkout(vec![item("tt_a", i64::MAX, 2)]))
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::Rejected(ref m) if m == "order total is too large"));
    assert!(h.payments.requests.is_empty());
}

// =============================================================================
// Free orders
// =============================================================================

fn free_order(items: Vec<(&str, u32)>) -> FreeOrderRequest {
    FreeOrderRequest {
        event_id: "ev_1".to_string(),
        buyer_name: "Jane Doe".to_string(),
        buyer_email: "jane@x.com".to_string(),
        phone: Some("555-0100".to_string()),
        items: items
            .into_iter()
            .map(|(id, quantity)| FreeOrderItem {
                ticket_type_id: id.to_string(),
                quantity,
                price: 0,
            })
            .collect(),
    }
}

#[tokio::test]
async fn test_free_order_issues_each_unit_with_reference() {
    let h = harness();

    let result = h
        .service
        .create_free_order(&free_order(vec![("tt_a", 2), ("tt_b", 0)]))
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.issued_tickets.len(), 2);

    let forms = h.provider.posted_forms("/issued_tickets");
    assert_eq!(forms.len(), 2);
    for form in &forms {
        assert!(form.contains(&("reference".to_string(), "Jane Doe|jane@x.com".to_string())));
        assert!(form.contains(&("send_email".to_string(), "true".to_string())));
        assert!(form.contains(&("phone".to_string(), "555-0100".to_string())));
    }

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].tickets.len(), 2);
    assert_eq!(sent[0].tickets[0].ticket_type_name, "Free Ticket");
    assert_eq!(sent[0].amount_total, 0);
    assert_eq!(sent[0].event_venue, "Blue Room");
}

#[tokio::test]
async fn test_free_order_refuses_priced_items() {
    let h = harness();
    let mut request = free_order(vec![("tt_a", 1)]);
    request.items[0].price = 1500;

    let err = h.service.create_free_order(&request).await.unwrap_err();

    assert!(matches!(err, PaymentError::Rejected(_)));
    assert_eq!(h.provider.call_count("POST", "/issued_tickets"), 0);
}

#[tokio::test]
async fn test_free_order_partial_issuance_is_queued() {
    let h = harness();
    h.provider.limit_issuance("tt_a", 1);

    let err = h
        .service
        .create_free_order(&free_order(vec![("tt_a", 3)]))
        .await
        .unwrap_err();

    let PaymentError::PartialFulfillment {
        pending_id,
        issued,
        requested,
        ..
    } = err
    else {
        panic!("expected PartialFulfillment, got {err:?}");
    };
    assert_eq!((issued, requested), (1, 3));

    let pending = h.service.list_pending().await.unwrap();
    assert_eq!(pending.count, 1);
    let order = &pending.data[0];
    assert_eq!(order.id, pending_id);
    assert_eq!(order.stripe_session_id, None);
    assert_eq!(order.items[0].issued, 1);
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_free_order_with_nothing_issued_returns_upstream_error() {
    let h = harness();
    h.provider.limit_issuance("tt_a", 0);

    let err = h
        .service
        .create_free_order(&free_order(vec![("tt_a", 1)]))
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::Provider(ref e) if e.is_rejected()));
    assert_eq!(h.service.list_pending().await.unwrap().count, 0);
}
