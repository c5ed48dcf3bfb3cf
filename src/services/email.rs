use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;
use std::time::Duration;

use crate::models::{Booking, Event, Ticket};

#[derive(thiserror::Error, Debug)]
pub enum EmailError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Mail API error: {0}")]
    ApiError(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[derive(Serialize)]
struct SendGridRequest<'a> {
    personalizations: [Personalization<'a>; 1],
    from: Address<'a>,
    subject: &'a str,
    content: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Personalization<'a> {
    to: [Address<'a>; 1],
}

#[derive(Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    value: &'a str,
}

/// SendGrid v3 mailer. Without an API key messages are only logged.
#[derive(Clone)]
pub struct EmailClient {
    http: Client,
    base_url: String,
    api_key: Option<Secret<String>>,
    from: String,
}

impl EmailClient {
    pub fn new(base_url: &str, api_key: Option<Secret<String>>, from: &str) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            from: from.to_string(),
        }
    }

    #[tracing::instrument(skip(self, email), fields(to = %email.to, subject = %email.subject))]
    pub async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError> {
        let Some(api_key) = &self.api_key else {
            tracing::info!("Mail API not configured, skipping delivery");
            return Ok(());
        };

        let body = SendGridRequest {
            personalizations: [Personalization {
                to: [Address { email: &email.to }],
            }],
            from: Address { email: &self.from },
            subject: &email.subject,
            content: [Content {
                kind: "text/plain",
                value: &email.text,
            }],
        };

        let response = self
            .http
            .post(format!("{}/v3/mail/send", self.base_url))
            .bearer_auth(api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(EmailError::ApiError(format!("Status {}: {}", status, error_text)));
        }

        tracing::debug!("Email accepted for delivery");
        Ok(())
    }

    /// Sends every message, logging failures instead of returning them.
    /// Mail is a side effect and never fails the operation that queued it.
    pub async fn send_all_best_effort(&self, emails: &[OutgoingEmail]) -> usize {
        let mut delivered = 0;
        for email in emails {
            match self.send(email).await {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!(to = %email.to, error = %e, "Email delivery failed"),
            }
        }
        delivered
    }
}

pub fn ticket_confirmation(event: &Event, ticket: &Ticket, ticket_url: &str) -> OutgoingEmail {
    let mut text = format!(
        "Hi {},\n\nYour ticket for \"{}\" is confirmed.\n\nWhen: {}\n",
        ticket.attendee_name,
        event.title,
        event.starts_at.format("%A %-d %B %Y, %H:%M UTC"),
    );
    if let Some(location) = &event.location {
        text.push_str(&format!("Where: {}\n", location));
    }
    text.push_str(&format!(
        "\nShow this QR code at the entrance: {}\n\nSee you there!\n",
        ticket_url
    ));

    OutgoingEmail {
        to: ticket.attendee_email.clone(),
        subject: format!("Your ticket for {}", event.title),
        text,
    }
}

pub fn purchase_receipt(
    purchaser_email: &str,
    event: &Event,
    quantity: i32,
    total_amount_minor: i64,
    reference: &str,
) -> OutgoingEmail {
    OutgoingEmail {
        to: purchaser_email.to_string(),
        subject: format!("Payment received for {}", event.title),
        text: format!(
            "We received your payment of {} {} for {} ticket(s) to \"{}\".\nReference: {}\n\nEach attendee will receive their ticket by email.\n",
            event.currency,
            format_minor_units(total_amount_minor),
            quantity,
            event.title,
            reference,
        ),
    }
}

pub fn booking_notice(host_email: &str, booking: &Booking) -> OutgoingEmail {
    let mut text = format!(
        "{} <{}> booked a meeting with you on {} ({} minutes).\n",
        booking.guest_name,
        booking.guest_email,
        booking.starts_at.format("%A %-d %B %Y, %H:%M UTC"),
        (booking.ends_at - booking.starts_at).num_minutes(),
    );
    if let Some(note) = &booking.note {
        text.push_str(&format!("\nNote: {}\n", note));
    }

    OutgoingEmail {
        to: host_email.to_string(),
        subject: format!("New booking from {}", booking.guest_name),
        text,
    }
}

/// 150050 -> "1,500.50"
pub fn format_minor_units(amount_minor: i64) -> String {
    let sign = if amount_minor < 0 { "-" } else { "" };
    let amount = amount_minor.unsigned_abs();
    let major = (amount / 100).to_string();

    let mut grouped = String::with_capacity(major.len() + major.len() / 3);
    for (i, ch) in major.chars().enumerate() {
        if i > 0 && (major.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}{}.{:02}", sign, grouped, amount % 100)
}
