//! Integration tests for discount replacement and check-ins

mod common;

use std::sync::Arc;

use serde_json::json;
use ticketdesk_provider::{CheckInService, DiscountService, InMemoryProvider, ProviderError};
use ticketdesk_types::{DiscountDraft, DiscountPatch, IssuedTicket};

use common::{masked_ticket, ticket};

fn seeded_discount(provider: &InMemoryProvider) {
    provider.add_discount(json!({
        "id": "di_old",
        "code": "EARLY",
        "face_value_percentage": 20.0,
        "ticket_types": [{ "id": "tt_1" }, { "id": "tt_2" }]
    }));
}

// =============================================================================
// Discounts
// =============================================================================

#[tokio::test]
async fn test_update_replaces_discount_and_keeps_bindings() {
    let provider = Arc::new(InMemoryProvider::new());
    seeded_discount(&provider);

    let created = DiscountService::new(provider.clone())
        .update(
            "di_old",
            &DiscountPatch {
                code: None,
                percentage: Some(35.0),
            },
        )
        .await
        .unwrap();

    assert_ne!(created["id"], "di_old");
    assert_eq!(created["code"], "EARLY");
    assert_eq!(created["face_value_percentage"], 35.0);
    assert_eq!(created["ticket_types"], json!([{ "id": "tt_1" }, { "id": "tt_2" }]));

    let remaining = provider.discounts();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0]["id"], created["id"]);
}

#[tokio::test]
async fn test_recreate_failure_is_distinct_from_rejection() {
    let provider = Arc::new(InMemoryProvider::new());
    seeded_discount(&provider);
    provider.fail("POST", "/discounts", 422, "Code already in use");

    let err = DiscountService::new(provider.clone())
        .update(
            "di_old",
            &DiscountPatch {
                code: Some("LATE".to_string()),
                percentage: None,
            },
        )
        .await
        .unwrap_err();

    match &err {
        ProviderError::RecreateFailed { discount_id, source } => {
            assert_eq!(discount_id, "di_old");
            assert!(source.is_rejected());
            assert_eq!(err.provider_message(), "Code already in use");
        }
        other => panic!("expected RecreateFailed, got {other:?}"),
    }
    // The original is gone
    assert!(provider.discounts().is_empty());
}

#[tokio::test]
async fn test_empty_patched_code_keeps_old_code() {
    let provider = Arc::new(InMemoryProvider::new());
    seeded_discount(&provider);

    let created = DiscountService::new(provider.clone())
        .update(
            "di_old",
            &DiscountPatch {
                code: Some(String::new()),
                percentage: Some(25.0),
            },
        )
        .await
        .unwrap();

    assert_eq!(created["code"], "EARLY");
    assert_eq!(created["face_value_percentage"], 25.0);
}

#[tokio::test]
async fn test_invalid_merged_draft_leaves_discount_in_place() {
    let provider = Arc::new(InMemoryProvider::new());
    provider.add_discount(json!({ "id": "di_nocode", "face_value_percentage": 20.0 }));

    let err = DiscountService::new(provider.clone())
        .update(
            "di_nocode",
            &DiscountPatch {
                code: Some(String::new()),
                percentage: None,
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::InvalidRequest(_)));
    assert_eq!(provider.call_count("DELETE", "/discounts/di_nocode"), 0);
    assert_eq!(provider.call_count("POST", "/discounts"), 0);
    assert_eq!(provider.discounts().len(), 1);
}

#[tokio::test]
async fn test_update_of_missing_discount_deletes_nothing() {
    let provider = Arc::new(InMemoryProvider::new());

    let err = DiscountService::new(provider.clone())
        .update("di_nope", &DiscountPatch::default())
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(provider.call_count("DELETE", "/discounts/di_nope"), 0);
}

#[tokio::test]
async fn test_create_rejects_blank_code() {
    let provider = Arc::new(InMemoryProvider::new());
    let err = DiscountService::new(provider.clone())
        .create(&DiscountDraft {
            code: "  ".to_string(),
            percentage: 10.0,
            ticket_type_ids: vec![],
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::InvalidRequest(_)));
    assert_eq!(provider.call_count("POST", "/discounts"), 0);
}

// =============================================================================
// Check-ins
// =============================================================================

#[tokio::test]
async fn test_lookup_by_barcode_unmasks_holder() {
    let provider = Arc::new(InMemoryProvider::new());
    provider.add_ticket(IssuedTicket {
        reference: Some("Jane Doe|jane@x.com".to_string()),
        ..masked_ticket("it_1", "ev_1", 100)
    });

    let found = CheckInService::new(provider.clone())
        .lookup("BC-it_1")
        .await
        .unwrap();

    assert_eq!(found.id, "it_1");
    assert_eq!(found.full_name.as_deref(), Some("Jane Doe"));
    assert_eq!(found.email.as_deref(), Some("jane@x.com"));
}

#[tokio::test]
async fn test_lookup_unknown_barcode_is_not_found() {
    let provider = Arc::new(InMemoryProvider::new());
    let err = CheckInService::new(provider)
        .lookup("NOPE")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_second_check_in_is_already_checked_in() {
    let provider = Arc::new(InMemoryProvider::new());
    provider.add_ticket(ticket("it_1", "ev_1", "a@x.com", 0, 1));
    let service = CheckInService::new(provider.clone());

    service.check_in("it_1").await.unwrap();
    let err = service.check_in("it_1").await.unwrap_err();

    assert!(matches!(err, ProviderError::AlreadyCheckedIn));
    let looked_up = service.lookup("it_1").await.unwrap();
    assert!(looked_up.checked_in);
}
