//! Ticket lookup and check-in for the door scanner

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, instrument};

use ticketdesk_types::{IssuedTicket, ProviderPage};

use crate::client::{decode, form, TicketingApi};
use crate::error::{ProviderError, ProviderResult};
use crate::pii::IdentityResolver;

/// Prefix of provider issued-ticket IDs
pub const ISSUED_TICKET_PREFIX: &str = "it_";

/// Scanner operations
pub struct CheckInService {
    api: Arc<dyn TicketingApi>,
}

impl CheckInService {
    /// Create a new check-in service
    pub fn new(api: Arc<dyn TicketingApi>) -> Self {
        Self { api }
    }

    /// Look up a ticket by issued-ticket ID or barcode, with the holder's
    /// identity unmasked
    #[instrument(skip(self))]
    pub async fn lookup(&self, ticket_id: &str) -> ProviderResult<IssuedTicket> {
        let mut ticket = if ticket_id.starts_with(ISSUED_TICKET_PREFIX) {
            decode(
                self.api
                    .get(&format!("/issued_tickets/{ticket_id}"), &[])
                    .await?,
            )?
        } else {
            let page: ProviderPage<IssuedTicket> = decode(
                self.api
                    .get("/issued_tickets", &[("barcode", ticket_id)])
                    .await?,
            )?;
            page.data
                .into_iter()
                .next()
                .ok_or_else(|| ProviderError::NotFound(format!("barcode {ticket_id}")))?
        };

        IdentityResolver::new(Arc::clone(&self.api))
            .unmask(&mut ticket)
            .await;
        Ok(ticket)
    }

    /// Check a ticket in
    #[instrument(skip(self))]
    pub async fn check_in(&self, ticket_id: &str) -> ProviderResult<Value> {
        let body = form([("issued_ticket_id", ticket_id), ("quantity", "1")]);

        match self.api.post("/check_ins", &body).await {
            Ok(data) => {
                info!(ticket_id = %ticket_id, "Ticket checked in");
                Ok(data)
            }
            Err(e) if is_already_checked_in(&e) => Err(ProviderError::AlreadyCheckedIn),
            Err(e) => Err(e),
        }
    }
}

fn is_already_checked_in(error: &ProviderError) -> bool {
    error.is_rejected() && error.provider_message().to_lowercase().contains("already")
}
