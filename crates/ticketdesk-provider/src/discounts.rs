//! Discount codes
//!
//! The provider cannot edit a discount in place, so updates are emulated by
//! fetching the old discount, deleting it and creating a replacement.

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, instrument};

use ticketdesk_types::{Discount, DiscountDraft, DiscountPatch};

use crate::client::{decode, form, Form, TicketingApi};
use crate::error::{ProviderError, ProviderResult};

/// Discount operations against the provider
pub struct DiscountService {
    api: Arc<dyn TicketingApi>,
}

impl DiscountService {
    /// Create a new discount service
    pub fn new(api: Arc<dyn TicketingApi>) -> Self {
        Self { api }
    }

    /// List discounts
    pub async fn list(&self) -> ProviderResult<Value> {
        self.api.get("/discounts", &[]).await
    }

    /// Create a percentage discount
    #[instrument(skip(self, draft), fields(code = %draft.code))]
    pub async fn create(&self, draft: &DiscountDraft) -> ProviderResult<Value> {
        validate_draft(draft)?;
        self.api.post("/discounts", &discount_form(draft)).await
    }

    /// Delete a discount
    #[instrument(skip(self))]
    pub async fn delete(&self, discount_id: &str) -> ProviderResult<Value> {
        self.api.delete(&format!("/discounts/{discount_id}")).await
    }

    /// Replace a discount with one carrying the patched code or percentage.
    ///
    /// Ticket type bindings are copied from the old discount and an empty
    /// patched code keeps the old one. The merged draft is validated before
    /// anything is deleted. If the replacement cannot be created after the
    /// delete succeeded, the error is [`ProviderError::RecreateFailed`]
    /// carrying the deleted ID.
    #[instrument(skip(self, patch))]
    pub async fn update(&self, discount_id: &str, patch: &DiscountPatch) -> ProviderResult<Value> {
        let endpoint = format!("/discounts/{discount_id}");
        let old: Discount = decode(self.api.get(&endpoint, &[]).await?)?;

        let draft = DiscountDraft {
            code: patch
                .code
                .as_deref()
                .filter(|code| !code.trim().is_empty())
                .map(str::to_string)
                .or_else(|| old.code.clone())
                .unwrap_or_default(),
            percentage: patch
                .percentage
                .or(old.face_value_percentage)
                .unwrap_or(0.0),
            ticket_type_ids: old.ticket_type_ids(),
        };
        validate_draft(&draft)?;

        self.api.delete(&endpoint).await?;

        match self.api.post("/discounts", &discount_form(&draft)).await {
            Ok(created) => {
                info!(old_id = %discount_id, code = %draft.code, "Discount replaced");
                Ok(created)
            }
            Err(e) => {
                error!(
                    discount_id = %discount_id,
                    code = %draft.code,
                    percentage = draft.percentage,
                    ticket_type_ids = ?draft.ticket_type_ids,
                    error = %e,
                    "Discount deleted but replacement failed; recreate it manually"
                );
                Err(ProviderError::RecreateFailed {
                    discount_id: discount_id.to_string(),
                    source: Box::new(e),
                })
            }
        }
    }
}

fn validate_draft(draft: &DiscountDraft) -> ProviderResult<()> {
    if draft.code.trim().is_empty() {
        return Err(ProviderError::InvalidRequest(
            "discount code must not be empty".to_string(),
        ));
    }
    if !(0.0..=100.0).contains(&draft.percentage) {
        return Err(ProviderError::InvalidRequest(
            "discount percentage must be between 0 and 100".to_string(),
        ));
    }
    Ok(())
}

/// Form body for creating a discount. The percentage is truncated to an
/// integer and bindings are sent comma joined.
pub fn discount_form(draft: &DiscountDraft) -> Form {
    #[allow(clippy::cast_possible_truncation)]
    let percent = draft.percentage.trunc() as i64;

    let mut body = form([
        ("name", draft.code.clone()),
        ("code", draft.code.clone()),
        ("type", "percentage".to_string()),
        ("price_percent", percent.to_string()),
    ]);

    if !draft.ticket_type_ids.is_empty() {
        body.push((
            "ticket_type_ids".to_string(),
            draft.ticket_type_ids.join(","),
        ));
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discount_form_fields() {
        let body = discount_form(&DiscountDraft {
            code: "SPRING".into(),
            percentage: 15.7,
            ticket_type_ids: vec!["tt_1".into(), "tt_2".into()],
        });
        let get = |k: &str| {
            body.iter()
                .find(|(key, _)| key == k)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("name"), Some("SPRING"));
        assert_eq!(get("code"), Some("SPRING"));
        assert_eq!(get("type"), Some("percentage"));
        assert_eq!(get("price_percent"), Some("15"));
        assert_eq!(get("ticket_type_ids"), Some("tt_1,tt_2"));
    }

    #[test]
    fn test_validate_draft() {
        let draft = |code: &str, percentage: f64| DiscountDraft {
            code: code.into(),
            percentage,
            ticket_type_ids: vec![],
        };
        assert!(validate_draft(&draft("SPRING", 15.0)).is_ok());
        assert!(validate_draft(&draft("  ", 15.0)).is_err());
        assert!(validate_draft(&draft("SPRING", 120.0)).is_err());
        assert!(validate_draft(&draft("SPRING", f64::NAN)).is_err());
    }

    #[test]
    fn test_discount_form_omits_empty_bindings() {
        let body = discount_form(&DiscountDraft {
            code: "ALL".into(),
            percentage: 10.0,
            ticket_type_ids: vec![],
        });
        assert!(body.iter().all(|(k, _)| k != "ticket_type_ids"));
    }
}
