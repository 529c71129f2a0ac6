//! Payment-to-fulfillment pipeline
//!
//! Paid orders go through a Stripe Checkout Session with a destination charge.
//! Tickets are issued when Stripe reports the session completed. Anything
//! that could not be issued is parked in the pending store for an operator to
//! retry; tickets that did issue stay issued.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use ticketdesk_provider::TicketingApi;
use ticketdesk_types::{
    encode_reference, CheckoutRequest, FreeOrderRequest, IssuedTicket, OrderItem, OrderSource,
    PendingItem, PendingOrder, PendingStatus,
};

use crate::config::{application_fee, PaymentsConfig};
use crate::error::{PaymentError, PaymentResult};
use crate::issuer::{IssuanceReport, Recipient, TicketIssuer, FALLBACK_EVENT_NAME};
use crate::metrics::{self, Operation, OperationTimer, Outcome};
use crate::notifier::{ConfirmedTicket, Notifier, TicketConfirmation};
use crate::pending::PendingOrderStore;
use crate::provider::{PaymentProvider, SessionLine, SessionRequest};
use crate::stripe::StripeProvider;
use crate::webhook::{CompletedSession, WebhookEventData, WebhookHandler};

/// Message for a checkout with nothing to buy
pub const NO_ITEMS_MESSAGE: &str = "No valid ticket items selected.";

/// Paid checkout created
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaidCheckout {
    /// Hosted checkout URL
    pub url: Option<String>,
    /// Stripe session ID
    pub session_id: String,
    /// Order total in minor units
    pub total: i64,
    /// Platform share
    pub platform_fee: i64,
    /// Connected account share
    pub merchant_receives: i64,
    /// Currency
    pub currency: String,
}

/// Zero-total checkout; the client completes it through the free-order path
#[derive(Debug, Clone, Serialize)]
pub struct FreeCheckout {
    /// Where to send the buyer afterwards
    pub url: String,
    /// Always `true`
    pub free: bool,
    /// Order to submit to the free-order path
    pub metadata: FreeOrderRequest,
}

/// Result of creating a checkout
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CheckoutOutcome {
    /// Redirect to Stripe
    Paid(PaidCheckout),
    /// Nothing to pay
    Free(FreeCheckout),
}

/// Tickets issued for a free order
#[derive(Debug, Clone, Serialize)]
pub struct FreeOrderResult {
    /// Always `true`
    pub success: bool,
    /// Issued tickets
    pub issued_tickets: Vec<IssuedTicket>,
}

/// A pending order fully issued by a retry
#[derive(Debug, Clone, Serialize)]
pub struct RetryResult {
    /// Always `true`
    pub success: bool,
    /// Tickets issued by this retry
    pub issued_ticket_ids: Vec<String>,
}

/// What a webhook delivery led to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Every ticket issued
    Fulfilled {
        /// Tickets issued
        issued: u32,
    },
    /// Some tickets owed; queued for retry
    Pending(Uuid),
    /// Session already handled
    Duplicate,
    /// Not an event that drives issuance
    Ignored,
    /// Session metadata could not be used
    Unprocessable,
}

/// Pending orders with a count
#[derive(Debug, Clone, Serialize)]
pub struct PendingOrderList {
    /// Pending orders
    pub data: Vec<PendingOrder>,
    /// Number of pending orders
    pub count: usize,
}

/// Payment reconciliation service
pub struct FulfillmentService {
    config: PaymentsConfig,
    payments: Option<Arc<dyn PaymentProvider>>,
    issuer: TicketIssuer,
    store: Arc<dyn PendingOrderStore>,
    notifier: Arc<dyn Notifier>,
    webhooks: WebhookHandler,
    retries_in_flight: Arc<Mutex<HashSet<Uuid>>>,
}

impl FulfillmentService {
    /// Create the service. A Stripe client is built when a secret key is
    /// configured.
    pub fn new(
        config: PaymentsConfig,
        api: Arc<dyn TicketingApi>,
        store: Arc<dyn PendingOrderStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let payments = config.stripe_secret_key.as_ref().map(|key| {
            Arc::new(StripeProvider::new(key.clone()).with_api_base(config.stripe_api_base.clone()))
                as Arc<dyn PaymentProvider>
        });

        Self {
            webhooks: WebhookHandler::new(config.stripe_webhook_secret.clone()),
            config,
            payments,
            issuer: TicketIssuer::new(api),
            store,
            notifier,
            retries_in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Use a different payment provider
    pub fn with_payment_provider(mut self, provider: Arc<dyn PaymentProvider>) -> Self {
        self.payments = Some(provider);
        self
    }

    /// Whether webhook signatures are checked
    pub fn verifies_webhooks(&self) -> bool {
        self.webhooks.verifies_signatures()
    }

    /// Start a checkout.
    ///
    /// A zero total never touches Stripe and does not need it configured.
    #[instrument(skip(self, request), fields(event_id = %request.event_id, items = request.items.len()))]
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> PaymentResult<CheckoutOutcome> {
        let _timer = OperationTimer::start(Operation::CreateCheckout);

        if request.billable_items().next().is_none() {
            return Err(PaymentError::Rejected(NO_ITEMS_MESSAGE.to_string()));
        }
        encode_reference(&request.buyer_name, &request.buyer_email)
            .map_err(|e| PaymentError::Rejected(e.to_string()))?;

        let total = request
            .total()
            .map_err(|e| PaymentError::Rejected(e.to_string()))?;
        if total == 0 {
            info!("Zero total; routing to free order");
            return Ok(CheckoutOutcome::Free(FreeCheckout {
                url: self.config.free_success_url(),
                free: true,
                metadata: FreeOrderRequest::from(request),
            }));
        }

        let payments = self
            .payments
            .as_ref()
            .filter(|_| self.config.stripe_secret_key.is_some())
            .ok_or(PaymentError::Configuration("Stripe is not configured"))?;
        let destination = self
            .config
            .connected_account
            .clone()
            .ok_or(PaymentError::Configuration("Stripe connected account is not configured"))?;

        let platform_fee = application_fee(total, self.config.platform_fee_percent);
        let merchant_receives = total - platform_fee;
        let currency = request.currency.to_lowercase();

        let session = payments
            .create_checkout_session(&SessionRequest {
                currency: currency.clone(),
                lines: session_lines(request),
                customer_email: request.buyer_email.clone(),
                success_url: self.config.success_url(),
                cancel_url: self.config.cancel_url(),
                metadata: session_metadata(request, &destination)?,
                application_fee_amount: platform_fee,
                destination,
            })
            .await?;

        info!(
            session_id = %session.id,
            total,
            platform_fee,
            merchant_receives,
            "Checkout session created"
        );

        Ok(CheckoutOutcome::Paid(PaidCheckout {
            url: session.url,
            session_id: session.id,
            total,
            platform_fee,
            merchant_receives,
            currency,
        }))
    }

    /// Issue a zero-total order directly.
    ///
    /// A partial issuance is queued as a pending order and reported as
    /// [`PaymentError::PartialFulfillment`].
    #[instrument(skip(self, request), fields(event_id = %request.event_id))]
    pub async fn create_free_order(
        &self,
        request: &FreeOrderRequest,
    ) -> PaymentResult<FreeOrderResult> {
        let _timer = OperationTimer::start(Operation::FreeOrder);

        let items: Vec<PendingItem> = request
            .issuable_items()
            .map(|i| PendingItem {
                ticket_type_id: i.ticket_type_id.clone(),
                quantity: i.quantity,
                issued: 0,
            })
            .collect();
        if items.is_empty() {
            return Err(PaymentError::Rejected(NO_ITEMS_MESSAGE.to_string()));
        }
        let total = request
            .total()
            .map_err(|e| PaymentError::Rejected(e.to_string()))?;
        if total != 0 {
            return Err(PaymentError::Rejected(
                "Order has a non-zero total; use checkout".to_string(),
            ));
        }
        let reference = encode_reference(&request.buyer_name, &request.buyer_email)
            .map_err(|e| PaymentError::Rejected(e.to_string()))?;

        let recipient = Recipient {
            event_id: &request.event_id,
            reference: &reference,
            phone: request.phone.as_deref(),
        };
        let mut report = self.issuer.issue(recipient, items).await;
        metrics::record_issued(Operation::FreeOrder, report.issued_now());

        if !report.is_complete() {
            if report.issued_now() == 0 {
                if let Some(e) = report.first_error.take() {
                    return Err(e.into());
                }
            }

            let pending = PendingOrder {
                id: Uuid::new_v4(),
                stripe_session_id: None,
                event_id: request.event_id.clone(),
                buyer_name: request.buyer_name.clone(),
                buyer_email: request.buyer_email.clone(),
                phone: request.phone.clone(),
                items: report.items.clone(),
                amount_total: 0,
                status: PendingStatus::Pending,
                error: report.error_text(),
                created_at: Utc::now(),
                updated_at: None,
            };
            self.store.insert(pending.clone()).await?;
            metrics::record_pending("created");
            warn!(pending_id = %pending.id, "Free order partially issued; queued for retry");

            return Err(PaymentError::PartialFulfillment {
                pending_id: pending.id,
                issued: report.issued_total(),
                requested: report.requested(),
                message: pending.error,
            });
        }

        self.notify(
            &request.event_id,
            &request.buyer_name,
            &request.buyer_email,
            FALLBACK_EVENT_NAME,
            &report.tickets,
            0,
        )
        .await;

        Ok(FreeOrderResult {
            success: true,
            issued_tickets: report.tickets,
        })
    }

    /// Verify and act on a Stripe webhook.
    ///
    /// Errors are returned only for deliveries that fail verification or
    /// cannot be recorded; everything else is acknowledged.
    #[instrument(skip(self, payload, signature), fields(bytes = payload.len()))]
    pub async fn process_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> PaymentResult<WebhookOutcome> {
        let _timer = OperationTimer::start(Operation::Webhook);

        let event = self.webhooks.verify_and_parse(payload, signature)?;
        let label = event.event_type.as_label().to_string();

        let outcome = match event.data {
            WebhookEventData::CheckoutSession(session) => self.fulfill_session(session).await,
            WebhookEventData::Raw(_) => Ok(WebhookOutcome::Ignored),
        };

        let metric_outcome = match &outcome {
            Ok(WebhookOutcome::Fulfilled { .. }) => Outcome::Fulfilled,
            Ok(WebhookOutcome::Pending(_)) => Outcome::Pending,
            Ok(WebhookOutcome::Duplicate) => Outcome::Duplicate,
            Ok(WebhookOutcome::Ignored) => Outcome::Ignored,
            Ok(WebhookOutcome::Unprocessable) | Err(_) => Outcome::Error,
        };
        metrics::record_webhook(&label, metric_outcome);

        outcome
    }

    async fn fulfill_session(&self, session: CompletedSession) -> PaymentResult<WebhookOutcome> {
        if !session.id.is_empty() && !self.store.mark_session_processed(&session.id).await? {
            info!(session_id = %session.id, "Checkout session already processed");
            return Ok(WebhookOutcome::Duplicate);
        }

        let items: Vec<OrderItem> = match serde_json::from_str(session.meta("items").unwrap_or("[]")) {
            Ok(items) => items,
            Err(e) => {
                error!(session_id = %session.id, error = %e, "Undecodable items in session metadata");
                return Ok(WebhookOutcome::Unprocessable);
            }
        };
        if items.iter().all(|i| i.quantity == 0) {
            error!(session_id = %session.id, "Completed session has no ticket items");
            return Ok(WebhookOutcome::Unprocessable);
        }

        let event_id = session.meta("event_id").unwrap_or_default();
        let buyer_name = session.meta("buyer_name").unwrap_or_default();
        let buyer_email = session.meta("buyer_email").unwrap_or_default();
        let phone = session.meta("phone");
        let amount_total = session.amount_total.unwrap_or_default();

        let reference = match encode_reference(buyer_name, buyer_email) {
            Ok(reference) => reference,
            Err(e) => {
                error!(session_id = %session.id, error = %e, "Unusable buyer identity in session metadata");
                return Ok(WebhookOutcome::Unprocessable);
            }
        };

        let report = self
            .issuer
            .issue(
                Recipient {
                    event_id,
                    reference: &reference,
                    phone,
                },
                items.iter().map(PendingItem::from).collect(),
            )
            .await;
        metrics::record_issued(Operation::Webhook, report.issued_now());

        if report.is_complete() {
            info!(session_id = %session.id, issued = report.issued_now(), "Paid order fulfilled");
            let fallback = session.meta("event_name").unwrap_or(FALLBACK_EVENT_NAME);
            self.notify(event_id, buyer_name, buyer_email, fallback, &report.tickets, amount_total)
                .await;
            return Ok(WebhookOutcome::Fulfilled {
                issued: report.issued_now(),
            });
        }

        let pending = PendingOrder {
            id: Uuid::new_v4(),
            stripe_session_id: Some(session.id.clone()),
            event_id: event_id.to_string(),
            buyer_name: buyer_name.to_string(),
            buyer_email: buyer_email.to_string(),
            phone: phone.map(str::to_string),
            items: report.items.clone(),
            amount_total,
            status: PendingStatus::Pending,
            error: report.error_text(),
            created_at: Utc::now(),
            updated_at: None,
        };

        if let Err(e) = self.store.insert(pending.clone()).await {
            let issued_ids: Vec<&str> = report.tickets.iter().map(|t| t.id.as_str()).collect();
            error!(
                session_id = %session.id,
                issued = report.issued_total(),
                requested = report.requested(),
                items = ?pending.items,
                issued_ids = ?issued_ids,
                error = %e,
                "Failed to queue partially issued order; releasing session for redelivery"
            );
            // The redelivery issues the whole order again; the tickets
            // logged above are the ones to void
            if let Err(forget) = self.store.forget_session(&session.id).await {
                error!(session_id = %session.id, error = %forget, "Failed to release session");
            }
            return Err(e);
        }
        metrics::record_pending("created");
        warn!(
            session_id = %session.id,
            pending_id = %pending.id,
            issued = report.issued_total(),
            requested = report.requested(),
            "Paid order partially issued; queued for retry"
        );

        Ok(WebhookOutcome::Pending(pending.id))
    }

    /// All pending orders
    pub async fn list_pending(&self) -> PaymentResult<PendingOrderList> {
        let data = self.store.list().await?;
        Ok(PendingOrderList {
            count: data.len(),
            data,
        })
    }

    /// Issue whatever a pending order still owes.
    ///
    /// Only one retry of a given order runs at a time.
    #[instrument(skip(self))]
    pub async fn retry_pending(&self, id: Uuid) -> PaymentResult<RetryResult> {
        let _timer = OperationTimer::start(Operation::RetryPending);
        let _guard = RetryGuard::acquire(&self.retries_in_flight, id)?;

        let mut order = self
            .store
            .get(id)
            .await?
            .ok_or(PaymentError::PendingOrderNotFound(id))?;

        let reference = encode_reference(&order.buyer_name, &order.buyer_email)
            .map_err(|e| PaymentError::Rejected(e.to_string()))?;

        let report: IssuanceReport = self
            .issuer
            .issue(
                Recipient {
                    event_id: &order.event_id,
                    reference: &reference,
                    phone: order.phone.as_deref(),
                },
                order.items.clone(),
            )
            .await;
        metrics::record_issued(Operation::RetryPending, report.issued_now());

        if report.is_complete() {
            self.store.remove(id).await?;
            metrics::record_pending("resolved");
            info!(pending_id = %id, issued = report.issued_now(), "Pending order fulfilled");

            self.notify(
                &order.event_id,
                &order.buyer_name,
                &order.buyer_email,
                FALLBACK_EVENT_NAME,
                &report.tickets,
                order.amount_total,
            )
            .await;

            return Ok(RetryResult {
                success: true,
                issued_ticket_ids: report.tickets.into_iter().map(|t| t.id).collect(),
            });
        }

        order.items.clone_from(&report.items);
        order.error = report.error_text();
        order.updated_at = Some(Utc::now());
        self.store.update(order.clone()).await?;
        metrics::record_pending("updated");
        warn!(pending_id = %id, error = %order.error, "Pending order retry incomplete");

        Err(PaymentError::PartialFulfillment {
            pending_id: id,
            issued: report.issued_total(),
            requested: report.requested(),
            message: order.error,
        })
    }

    async fn notify(
        &self,
        event_id: &str,
        buyer_name: &str,
        buyer_email: &str,
        fallback_event_name: &str,
        tickets: &[IssuedTicket],
        amount_total: i64,
    ) {
        let source = OrderSource::from_total(amount_total);
        let ticket_type_name = match source {
            OrderSource::Free => "Free Ticket",
            OrderSource::Stripe => "Ticket",
        };
        let event = self.issuer.describe_event(event_id, fallback_event_name).await;

        let confirmation = TicketConfirmation {
            buyer_email: buyer_email.to_string(),
            buyer_name: buyer_name.to_string(),
            event_name: event.name,
            event_date: event.date,
            event_venue: event.venue,
            tickets: tickets
                .iter()
                .map(|t| ConfirmedTicket {
                    id: t.id.clone(),
                    barcode: t.barcode.clone().unwrap_or_default(),
                    ticket_type_name: ticket_type_name.to_string(),
                })
                .collect(),
            amount_total,
            source,
        };

        if !self.notifier.send_ticket_confirmation(&confirmation).await {
            warn!(to = %buyer_email, "Confirmation not delivered");
        }
    }
}

impl std::fmt::Debug for FulfillmentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FulfillmentService")
            .field("config", &self.config)
            .field("stripe", &self.payments.is_some())
            .field("webhooks", &self.webhooks)
            .finish_non_exhaustive()
    }
}

/// Marks a pending order as being retried until dropped
struct RetryGuard {
    set: Arc<Mutex<HashSet<Uuid>>>,
    id: Uuid,
}

impl RetryGuard {
    fn acquire(set: &Arc<Mutex<HashSet<Uuid>>>, id: Uuid) -> PaymentResult<Self> {
        let inserted = set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);
        if !inserted {
            return Err(PaymentError::RetryInProgress(id));
        }
        Ok(Self {
            set: Arc::clone(set),
            id,
        })
    }
}

impl Drop for RetryGuard {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

fn session_lines(request: &CheckoutRequest) -> Vec<SessionLine> {
    let description = match request.event_name.as_deref() {
        Some(name) if !name.trim().is_empty() => format!("Ticket for {name}"),
        _ => "Event ticket".to_string(),
    };
    request
        .billable_items()
        .map(|item| SessionLine {
            name: item.name.clone(),
            description: description.clone(),
            unit_amount: item.price,
            quantity: item.quantity,
        })
        .collect()
}

/// Order fields stored on the session and read back by the webhook
pub fn session_metadata(
    request: &CheckoutRequest,
    connected_account: &str,
) -> PaymentResult<BTreeMap<String, String>> {
    let items = serde_json::to_string(&request.order_items())
        .map_err(|e| PaymentError::Rejected(e.to_string()))?;

    Ok(BTreeMap::from([
        ("event_id".to_string(), request.event_id.clone()),
        ("buyer_name".to_string(), request.buyer_name.clone()),
        ("buyer_email".to_string(), request.buyer_email.clone()),
        ("phone".to_string(), request.phone.clone().unwrap_or_default()),
        ("items".to_string(), items),
        ("connected_account".to_string(), connected_account.to_string()),
        (
            "event_name".to_string(),
            request.event_name.clone().unwrap_or_default(),
        ),
    ]))
}
