//! PII unmasking
//!
//! The provider redacts attendee names and emails as `****` unless they were
//! collected through its own checkout. Identity is recovered, in order, from
//! the ticket's `reference` side channel, the parent provider order, and
//! finally fixed placeholders. Resolution never fails: a failed parent-order
//! lookup is logged and treated as "nothing found".

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use ticketdesk_types::{decode_reference, is_masked, IssuedTicket, ProviderOrder};

use crate::client::{decode, TicketingApi};

/// Placeholder name when no unmasked name can be found
pub const GUEST_NAME: &str = "Guest Attendee";

/// Placeholder email when no unmasked email can be found
pub const NO_EMAIL: &str = "No Email Provided";

/// A resolved buyer identity. Never contains the mask sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// Buyer name
    pub name: String,
    /// Buyer email
    pub email: String,
}

/// Identity recoverable from a record without any remote call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalIdentity {
    /// Unmasked name, if known
    pub name: Option<String>,
    /// Unmasked email, if known
    pub email: Option<String>,
}

impl LocalIdentity {
    /// Read the unmasked fields of a ticket, preferring the reference.
    pub fn from_ticket(ticket: &IssuedTicket) -> Self {
        let mut name = unmasked(ticket.full_name.as_deref());
        let mut email = unmasked(ticket.email.as_deref());

        if let Some((ref_name, ref_email)) = ticket.reference.as_deref().and_then(decode_reference)
        {
            if let Some(n) = unmasked(Some(ref_name)) {
                name = Some(n);
            }
            if let Some(e) = unmasked(Some(ref_email)) {
                email = Some(e);
            }
        }

        Self { name, email }
    }

    /// Whether both fields are known
    pub fn is_complete(&self) -> bool {
        self.name.is_some() && self.email.is_some()
    }

    /// Fill missing fields from `fallback`, then from the placeholders
    pub fn or_fallback(self, fallback: Option<&Identity>) -> Identity {
        Identity {
            name: self
                .name
                .or_else(|| fallback.map(|f| f.name.clone()))
                .unwrap_or_else(|| GUEST_NAME.to_string()),
            email: self
                .email
                .or_else(|| fallback.map(|f| f.email.clone()))
                .unwrap_or_else(|| NO_EMAIL.to_string()),
        }
    }
}

fn unmasked(value: Option<&str>) -> Option<String> {
    value.filter(|v| !is_masked(Some(*v))).map(str::to_string)
}

/// Resolves buyer identity for provider records.
///
/// Parent-order lookups are memoised per order ID for the lifetime of the
/// resolver, so one resolver should be used per logical request.
pub struct IdentityResolver {
    api: Arc<dyn TicketingApi>,
    parent_orders: HashMap<String, LocalIdentity>,
}

impl IdentityResolver {
    /// Create a new resolver
    pub fn new(api: Arc<dyn TicketingApi>) -> Self {
        Self {
            api,
            parent_orders: HashMap::new(),
        }
    }

    /// Resolve the true name and email of a ticket holder.
    ///
    /// 1. The `name|email` reference wins over masked fields.
    /// 2. If still masked and the ticket has a parent order, the order's
    ///    buyer details fill the gaps (at most one fetch per order).
    /// 3. Whatever is still missing gets a placeholder.
    pub async fn resolve_identity(&mut self, ticket: &IssuedTicket) -> Identity {
        self.resolve_known(ticket).await.or_fallback(None)
    }

    /// Steps 1 and 2 of [`Self::resolve_identity`], leaving unknown fields
    /// empty instead of substituting placeholders.
    pub async fn resolve_known(&mut self, ticket: &IssuedTicket) -> LocalIdentity {
        let mut local = LocalIdentity::from_ticket(ticket);

        if !local.is_complete() {
            if let Some(order_id) = ticket.order_id.as_deref().filter(|id| !id.is_empty()) {
                let parent = self.parent_order_identity(order_id).await;
                if local.name.is_none() {
                    local.name = parent.name;
                }
                if local.email.is_none() {
                    local.email = parent.email;
                }
            }
        }

        local
    }

    /// Resolve the identity and write it back onto the ticket
    pub async fn unmask(&mut self, ticket: &mut IssuedTicket) -> Identity {
        let identity = self.resolve_identity(ticket).await;
        ticket.full_name = Some(identity.name.clone());
        ticket.email = Some(identity.email.clone());
        identity
    }

    async fn parent_order_identity(&mut self, order_id: &str) -> LocalIdentity {
        if let Some(cached) = self.parent_orders.get(order_id) {
            return cached.clone();
        }

        debug!(order_id = %order_id, "Fetching parent order to unmask buyer details");

        let identity = match self.api.get(&format!("/orders/{order_id}"), &[]).await {
            Ok(value) => match decode::<ProviderOrder>(value) {
                Ok(order) => LocalIdentity {
                    name: unmasked(order.buyer_name()),
                    email: unmasked(order.buyer_email()),
                },
                Err(e) => {
                    warn!(order_id = %order_id, error = %e, "Parent order has unexpected shape");
                    LocalIdentity::default()
                }
            },
            Err(e) => {
                warn!(order_id = %order_id, error = %e, "Failed to fetch parent order for buyer details");
                LocalIdentity::default()
            }
        };

        self.parent_orders
            .insert(order_id.to_string(), identity.clone());
        identity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket(name: Option<&str>, email: Option<&str>, reference: Option<&str>) -> IssuedTicket {
        IssuedTicket {
            id: "it_1".into(),
            full_name: name.map(str::to_string),
            email: email.map(str::to_string),
            reference: reference.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_reference_overrides_masked_fields() {
        let local = LocalIdentity::from_ticket(&ticket(
            Some("****"),
            Some("****"),
            Some("Jane Doe|jane@x.com"),
        ));
        assert_eq!(local.name.as_deref(), Some("Jane Doe"));
        assert_eq!(local.email.as_deref(), Some("jane@x.com"));
    }

    #[test]
    fn test_malformed_reference_is_ignored() {
        let local = LocalIdentity::from_ticket(&ticket(Some("Jane"), Some("****"), Some("a|b|c")));
        assert_eq!(local.name.as_deref(), Some("Jane"));
        assert_eq!(local.email, None);
    }

    #[test]
    fn test_placeholders_when_nothing_known() {
        let identity = LocalIdentity::default().or_fallback(None);
        assert_eq!(identity.name, GUEST_NAME);
        assert_eq!(identity.email, NO_EMAIL);
    }
}
