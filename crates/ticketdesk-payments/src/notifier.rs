//! Ticket confirmation notifications
//!
//! Notification is best effort: a failed send is logged and reported as
//! `false`, never as an error, so it cannot undo a completed issuance.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use ticketdesk_types::OrderSource;

/// Default SMTP relay
pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";

/// Default SMTP submission port
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Display name on outgoing mail
pub const SENDER_NAME: &str = "Ticket Tailor";

/// One ticket in a confirmation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmedTicket {
    /// Issued ticket ID
    pub id: String,
    /// Barcode
    pub barcode: String,
    /// Ticket type label
    pub ticket_type_name: String,
}

/// Everything a confirmation message needs
#[derive(Debug, Clone, Serialize)]
pub struct TicketConfirmation {
    /// Recipient
    pub buyer_email: String,
    /// Recipient name
    pub buyer_name: String,
    /// Event name
    pub event_name: String,
    /// Human formatted start date
    pub event_date: String,
    /// Venue name, or "Online Event"/"TBA"
    pub event_venue: String,
    /// Tickets issued
    pub tickets: Vec<ConfirmedTicket>,
    /// Amount paid in minor units
    pub amount_total: i64,
    /// Free or paid
    pub source: OrderSource,
}

/// Confirmation delivery
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a booking confirmation. Returns whether it was delivered.
    async fn send_ticket_confirmation(&self, confirmation: &TicketConfirmation) -> bool;
}

/// SMTP settings
#[derive(Clone)]
pub struct SmtpSettings {
    /// Relay host
    pub host: String,
    /// Relay port
    pub port: u16,
    /// Sender address, also the login
    pub username: String,
    /// App password
    pub password: String,
}

impl std::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Sends confirmations over SMTP with STARTTLS
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpNotifier {
    /// Build a notifier for the given relay.
    ///
    /// No connection is made until the first send.
    pub fn new(settings: SmtpSettings) -> Result<Self, lettre::transport::smtp::Error> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)?
            .port(settings.port)
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password,
            ))
            .build();

        Ok(Self {
            transport,
            from: format!("{SENDER_NAME} <{}>", settings.username),
        })
    }

    fn build_message(&self, confirmation: &TicketConfirmation) -> Result<Message, String> {
        Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| format!("Invalid from address: {e}"))?,
            )
            .to(confirmation
                .buyer_email
                .parse()
                .map_err(|e| format!("Invalid to address: {e}"))?)
            .subject(format!("Booking Confirmed - {}", confirmation.event_name))
            .header(ContentType::TEXT_HTML)
            .body(render_html(confirmation))
            .map_err(|e| format!("Failed to build email: {e}"))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    #[instrument(skip(self, confirmation), fields(tickets = confirmation.tickets.len()))]
    async fn send_ticket_confirmation(&self, confirmation: &TicketConfirmation) -> bool {
        if confirmation.buyer_email.trim().is_empty() {
            warn!("No buyer email; skipping confirmation");
            return false;
        }

        let message = match self.build_message(confirmation) {
            Ok(message) => message,
            Err(e) => {
                error!(error = %e, "Failed to build confirmation email");
                return false;
            }
        };

        match self.transport.send(message).await {
            Ok(_) => {
                info!(to = %confirmation.buyer_email, "Confirmation email sent");
                true
            }
            Err(e) => {
                error!(to = %confirmation.buyer_email, error = %e, "Failed to send confirmation email");
                false
            }
        }
    }
}

impl std::fmt::Debug for SmtpNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpNotifier")
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

/// Used when SMTP is not configured
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_ticket_confirmation(&self, confirmation: &TicketConfirmation) -> bool {
        warn!(
            to = %confirmation.buyer_email,
            event = %confirmation.event_name,
            tickets = confirmation.tickets.len(),
            "SMTP not configured; confirmation email not sent"
        );
        false
    }
}

/// `$x.yy`, or `FREE` for zero
pub fn format_amount(minor_units: i64) -> String {
    if minor_units == 0 {
        return "FREE".to_string();
    }
    let sign = if minor_units < 0 { "-" } else { "" };
    let abs = minor_units.unsigned_abs();
    format!("{sign}${}.{:02}", abs / 100, abs % 100)
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}

/// HTML body of a confirmation
pub fn render_html(c: &TicketConfirmation) -> String {
    let rows: String = c
        .tickets
        .iter()
        .map(|t| {
            format!(
                r#"
            <tr>
                <td style="padding: 8px; border-bottom: 1px solid #eee;">{}</td>
                <td style="padding: 8px; border-bottom: 1px solid #eee; font-family: monospace;">{}</td>
            </tr>"#,
                escape(&t.ticket_type_name),
                escape(&t.barcode),
            )
        })
        .collect();

    let name = escape(&c.buyer_name);
    let event = escape(&c.event_name);
    let date = escape(&c.event_date);
    let venue = escape(&c.event_venue);
    let amount = format_amount(c.amount_total);
    let count = c.tickets.len();

    format!(
        r#"
<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>Booking Confirmed</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
        <h2 style="color: #16a34a;">Booking Confirmed</h2>
        <p>Hi {name}, your booking for <strong>{event}</strong> is confirmed.</p>
        <p>
            <strong>Date:</strong> {date}<br>
            <strong>Venue:</strong> {venue}<br>
            <strong>Tickets:</strong> {count}<br>
            <strong>Total:</strong> {amount}
        </p>
        <table style="width: 100%; border-collapse: collapse;">
            <tr>
                <th style="text-align: left; padding: 8px;">Ticket</th>
                <th style="text-align: left; padding: 8px;">Barcode</th>
            </tr>{rows}
        </table>
        <p style="color: #666; font-size: 14px; margin-top: 30px;">
            Show the barcode at the door to check in.
        </p>
    </div>
</body>
</html>
"#
    )
}
