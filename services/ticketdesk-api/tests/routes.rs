//! Route tests for the catalog, orders, discounts and check-ins

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::json;
use ticketdesk_types::IssuedTicket;

use common::app;

fn ticket(id: &str, email: &str, price: i64, created_at: i64) -> IssuedTicket {
    IssuedTicket {
        id: id.to_string(),
        barcode: Some(format!("BC-{id}")),
        event_id: "ev_1".to_string(),
        ticket_type_id: Some("tt_ga".to_string()),
        full_name: Some("Holder".to_string()),
        email: Some(email.to_string()),
        listed_price: price,
        created_at,
        status: Some("valid".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_health() {
    let (status, body) = app().get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let app = app();
    let response = tower::ServiceExt::oneshot(
        app.router.clone(),
        Request::get("/events/ev_1")
            .header("x-request-id", "req-42")
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();

    assert_eq!(response.headers()["x-request-id"], "req-42");
}

#[tokio::test]
async fn test_provider_not_found_is_404_with_error_body() {
    let (status, body) = app().get("/events/ev_missing").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert!(body["error"]["message"].is_string());
}

#[tokio::test]
async fn test_provider_rejection_keeps_its_message() {
    let app = app();
    app.provider
        .fail("POST", "/event_series", 422, "Name is too long");

    let (status, body) = app
        .post("/event_series", json!({ "name": "x".repeat(300) }))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "UPSTREAM_VALIDATION_ERROR");
    assert_eq!(body["error"]["message"], "Name is too long");
}

#[tokio::test]
async fn test_provider_outage_is_bad_gateway() {
    let app = app();
    app.provider.fail_transport("GET", "/events");

    let (status, body) = app.get("/events").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "UPSTREAM_UNAVAILABLE");
}

#[tokio::test]
async fn test_ticket_type_delete_requires_event() {
    let app = app();

    let (status, body) = app
        .send(
            Request::delete("/ticket_types/tt_1")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert_eq!(app.provider.call_count("GET", "/events/ev_1"), 0);

    let (status, _) = app
        .send(
            Request::delete("/ticket_types/tt_1?event_id=ev_1")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        app.provider
            .call_count("DELETE", "/event_series/es_1/ticket_types/tt_1"),
        1
    );
}

#[tokio::test]
async fn test_manual_order_issues_one_ticket_per_unit() {
    let app = app();

    let (status, body) = app
        .post(
            "/orders",
            json!({
                "event_id": "ev_1",
                "ticket_type_id": "tt_ga",
                "buyer_name": "Jane Doe",
                "buyer_email": "jane@x.com",
                "quantity": 3
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);
    let forms = app.provider.posted_forms("/issued_tickets");
    assert_eq!(forms.len(), 3);
    assert!(forms.iter().all(|f| f.contains(&(
        "reference".to_string(),
        "Jane Doe|jane@x.com".to_string()
    ))));
}

#[tokio::test]
async fn test_manual_order_failures() {
    let app = app();
    let order = |quantity: u32, name: &str| {
        json!({
            "event_id": "ev_1",
            "ticket_type_id": "tt_ga",
            "buyer_name": name,
            "buyer_email": "jane@x.com",
            "quantity": quantity
        })
    };

    let (status, _) = app.post("/orders", order(0, "Jane")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.post("/orders", order(1, "Jane|Doe")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.provider.call_count("POST", "/issued_tickets"), 0);

    app.provider.limit_issuance("tt_ga", 0);
    let (status, body) = app.post("/orders", order(1, "Jane")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "UPSTREAM_VALIDATION_ERROR");
    assert_eq!(body["error"]["message"], "Not enough tickets remaining");
}

#[tokio::test]
async fn test_orders_are_grouped_by_buyer_and_event() {
    let app = app();
    app.provider.set_response(
        "/events",
        json!({ "data": [{ "id": "ev_1", "name": "Friday", "event_series_id": "es_1" }] }),
    );
    app.provider.set_response(
        "/event_series",
        json!({ "data": [{ "id": "es_1", "name": "Jazz Nights" }] }),
    );
    app.provider.add_ticket(ticket("it_1", "a@x.com", 1000, 100));
    app.provider.add_ticket(ticket("it_2", "a@x.com", 1500, 101));
    app.provider.add_ticket(ticket("it_3", "b@x.com", 0, 102));

    let (status, body) = app.get("/orders").await;

    assert_eq!(status, StatusCode::OK);
    let orders = body["data"].as_array().unwrap();
    assert_eq!(orders.len(), 2);

    let paid = orders.iter().find(|o| o["buyer_email"] == "a@x.com").unwrap();
    assert_eq!(paid["total"], 2500);
    assert_eq!(paid["source"], "stripe");
    assert_eq!(paid["event_name"], "Jazz Nights");
    assert_eq!(paid["issued_tickets"].as_array().unwrap().len(), 2);

    let free = orders.iter().find(|o| o["buyer_email"] == "b@x.com").unwrap();
    assert_eq!(free["source"], "free");
}

#[tokio::test]
async fn test_bundle_availability_route() {
    let app = app();
    app.provider.set_response(
        "/event_series/es_1",
        json!({
            "id": "es_1",
            "name": "Festival",
            "bundles": [{
                "id": "b_1",
                "name": "Pair",
                "ticket_types": [{ "id": "tt_a", "quantity": 2 }]
            }]
        }),
    );
    app.provider.set_response(
        "/event_series/es_1/events",
        json!({ "data": [{ "id": "ev_1", "ticket_types": [{ "id": "tt_a", "quantity": 5 }] }] }),
    );

    let (status, body) = app.get("/event_series/es_1/bundles/availability").await;

    assert_eq!(status, StatusCode::OK);
    let bundle = &body["data"][0];
    assert_eq!(bundle["id"], "b_1");
    assert_eq!(bundle["is_available"], true);
    assert_eq!(bundle["max_quantity"], 2);
    assert_eq!(bundle["ticket_inventory"]["tt_a"], 5);
}

#[tokio::test]
async fn test_discount_update_replaces_code() {
    let app = app();
    app.provider.add_discount(json!({
        "id": "di_old",
        "code": "EARLY",
        "name": "EARLY",
        "face_value_percentage": 10,
        "ticket_types": [{ "id": "tt_a" }]
    }));

    let (status, body) = app
        .json(
            Method::PUT,
            "/discounts/di_old",
            json!({ "percentage": 25 }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_ne!(body["id"], "di_old");
    assert_eq!(body["code"], "EARLY");

    let discounts = app.provider.discounts();
    assert_eq!(discounts.len(), 1);
    assert_eq!(discounts[0]["face_value_percentage"], 25.0);
}

#[tokio::test]
async fn test_discount_recreate_failure_is_reported() {
    let app = app();
    app.provider.add_discount(json!({ "id": "di_old", "code": "EARLY", "face_value_percentage": 10 }));
    app.provider.fail("POST", "/discounts", 500, "boom");

    let (status, body) = app
        .json(Method::PUT, "/discounts/di_old", json!({ "code": "LATE" }))
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "DISCOUNT_RECREATE_FAILED");
    assert_eq!(body["error"]["details"]["discount_id"], "di_old");
}

#[tokio::test]
async fn test_check_in_once() {
    let app = app();
    app.provider.add_ticket(ticket("it_1", "a@x.com", 1000, 100));

    let (status, body) = app.post("/check_ins", json!({ "ticket_id": "it_1" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["issued_ticket_id"], "it_1");

    let (status, body) = app.post("/check_ins", json!({ "ticket_id": "it_1" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "ALREADY_CHECKED_IN");
}

#[tokio::test]
async fn test_lookup_by_barcode_unmasks_holder() {
    let app = app();
    app.provider.add_ticket(IssuedTicket {
        full_name: Some("****".to_string()),
        email: Some("****".to_string()),
        reference: Some("Jane Doe|jane@x.com".to_string()),
        ..ticket("it_7", "****", 0, 100)
    });

    let (status, body) = app.get("/check_ins/BC-it_7").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "it_7");
    assert_eq!(body["full_name"], "Jane Doe");
    assert_eq!(body["email"], "jane@x.com");
}
