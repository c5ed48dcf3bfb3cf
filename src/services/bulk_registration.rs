//! Event registration: free single sign-ups and payment-gated bulk purchases.
//!
//! Bulk flow:
//! 1. Validate attendees, check capacity, price the order.
//! 2. Store a `pending_payment` row and initialize a Paystack transaction.
//! 3. On webhook or callback, verify the reference with Paystack and
//!    finalize: one transaction that reserves seats, issues one ticket per
//!    attendee and marks the row `completed`.
//! 4. Confirmation mail goes out after commit, off the request path.

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    bulk_registration::{Attendee, BulkRegistration, BulkStatus, CreateBulkRegistrationData},
    event::Event,
    registration::EventRegistration,
    ticket::{NewTicket, Ticket},
    user::User,
};
use crate::services::{
    email::{self, EmailClient, OutgoingEmail},
    paystack::{InitializeTransaction, PaystackClient, PaystackError, TransactionStatus},
    ticket_codes,
    validation::{self, AttendeeError},
};

#[derive(thiserror::Error, Debug)]
pub enum RegistrationError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Payment provider error: {0}")]
    Payment(#[from] PaystackError),

    #[error("Event not found")]
    EventNotFound,

    #[error("Registration not found")]
    RegistrationNotFound,

    #[error("{0}")]
    Invalid(#[from] AttendeeError),

    #[error("Event is not open for registration")]
    EventClosed,

    #[error("Not enough seats left: requested {requested}, available {available}")]
    CapacityExceeded { requested: i64, available: i64 },

    #[error("You are already registered for this event")]
    AlreadyRegistered,

    #[error("This event requires a ticket purchase")]
    NotFree,

    #[error("Order total is too large")]
    AmountOverflow,

    #[error("Ticket code generation failed: {0}")]
    TicketCode(#[from] ticket_codes::TicketCodeError),
}

/// Result of starting a bulk purchase.
#[derive(Debug, Serialize)]
pub struct BulkCheckout {
    pub registration: BulkRegistration,
    /// Where the client sends the purchaser to pay. `None` for free events,
    /// which complete immediately.
    pub authorization_url: Option<String>,
}

/// What a payment confirmation attempt did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PaymentOutcome {
    Completed { tickets_issued: usize },
    Failed { reason: String },
    Pending,
    AlreadyProcessed { status: String },
    /// Paystack took the money after the registration had already failed.
    RefundRequired { reason: String },
}

/// `unit_price × quantity`, refusing to overflow.
pub fn total_amount(unit_price_minor: i64, quantity: usize) -> Result<i64, RegistrationError> {
    i64::try_from(quantity)
        .ok()
        .and_then(|q| unit_price_minor.checked_mul(q))
        .ok_or(RegistrationError::AmountOverflow)
}

/// Rejects a request that would push attendees past `max_attendees`.
pub fn ensure_capacity(event: &Event, requested: i64) -> Result<(), RegistrationError> {
    match event.remaining_capacity() {
        Some(available) if requested > available => {
            Err(RegistrationError::CapacityExceeded { requested, available })
        }
        _ => Ok(()),
    }
}

#[derive(Clone)]
pub struct TicketingService {
    pool: PgPool,
    paystack: PaystackClient,
    mailer: EmailClient,
    signing_key: Vec<u8>,
    base_url: String,
    callback_url: String,
}

impl TicketingService {
    pub fn new(
        pool: PgPool,
        paystack: PaystackClient,
        mailer: EmailClient,
        signing_key: &[u8],
        base_url: &str,
        callback_url: &str,
    ) -> Self {
        Self {
            pool,
            paystack,
            mailer,
            signing_key: signing_key.to_vec(),
            base_url: base_url.to_string(),
            callback_url: callback_url.to_string(),
        }
    }

    pub fn paystack(&self) -> &PaystackClient {
        &self.paystack
    }

    /// Public link that renders the ticket's QR code.
    pub fn ticket_url(&self, ticket: &Ticket) -> String {
        let payload = ticket_codes::qr_payload(ticket.id, &ticket.ticket_code, &self.signing_key);
        format!("{}/t/{}", self.base_url, payload)
    }

    pub fn ticket_payload(&self, ticket: &Ticket) -> String {
        ticket_codes::qr_payload(ticket.id, &ticket.ticket_code, &self.signing_key)
    }

    async fn load_open_event(&self, event_id: Uuid) -> Result<Event, RegistrationError> {
        let event = Event::find_by_id(&self.pool, event_id)
            .await?
            .ok_or(RegistrationError::EventNotFound)?;

        if !event.is_open_for_registration(Utc::now()) {
            return Err(RegistrationError::EventClosed);
        }

        Ok(event)
    }

    /// Starts a bulk purchase for `attendees` on behalf of `purchaser`.
    #[tracing::instrument(skip(self, purchaser, attendees), fields(purchaser_id = %purchaser.id, quantity = attendees.len()))]
    pub async fn start_bulk_registration(
        &self,
        event_id: Uuid,
        purchaser: &User,
        attendees: Vec<Attendee>,
    ) -> Result<BulkCheckout, RegistrationError> {
        let event = self.load_open_event(event_id).await?;
        let attendees = validation::validate_attendees(attendees)?;
        let quantity = attendees.len();

        ensure_capacity(&event, quantity as i64)?;
        let total = total_amount(event.ticket_price_minor, quantity)?;

        let reference = PaystackClient::generate_reference();
        let registration = BulkRegistration::create(
            &self.pool,
            CreateBulkRegistrationData {
                event_id: event.id,
                purchaser_id: purchaser.id,
                purchaser_email: purchaser.email.clone(),
                unit_price_minor: event.ticket_price_minor,
                total_amount_minor: total,
                currency: event.currency.clone(),
                payment_reference: reference.clone(),
                attendees,
            },
        )
        .await?;

        tracing::info!(
            bulk_registration_id = %registration.id,
            reference = %reference,
            total_amount_minor = total,
            "Bulk registration created"
        );

        if total == 0 {
            let outcome = self.finalize(registration.id).await?;
            tracing::info!(?outcome, "Free bulk registration finalized");

            let registration = BulkRegistration::find_by_id(&self.pool, registration.id)
                .await?
                .ok_or(RegistrationError::RegistrationNotFound)?;
            return Ok(BulkCheckout {
                registration,
                authorization_url: None,
            });
        }

        let init = self
            .paystack
            .initialize_transaction(&InitializeTransaction {
                email: &purchaser.email,
                amount: total,
                currency: &event.currency,
                reference: &reference,
                callback_url: &self.callback_url,
                metadata: json!({
                    "bulk_registration_id": registration.id,
                    "event_id": event.id,
                    "quantity": quantity,
                }),
            })
            .await;

        let init = match init {
            Ok(init) => init,
            Err(e) => {
                let mut conn = self.pool.acquire().await?;
                BulkRegistration::mark_failed(
                    &mut conn,
                    registration.id,
                    &format!("Payment initialization failed: {}", e),
                )
                .await?;
                return Err(e.into());
            }
        };

        BulkRegistration::set_authorization_url(&self.pool, registration.id, &init.authorization_url)
            .await?;

        let registration = BulkRegistration::find_by_id(&self.pool, registration.id)
            .await?
            .ok_or(RegistrationError::RegistrationNotFound)?;

        Ok(BulkCheckout {
            registration,
            authorization_url: Some(init.authorization_url),
        })
    }

    /// Verifies `reference` with Paystack and finalizes or fails the
    /// registration accordingly. Safe to call repeatedly.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_payment(&self, reference: &str) -> Result<PaymentOutcome, RegistrationError> {
        let registration = BulkRegistration::find_by_reference(&self.pool, reference)
            .await?
            .ok_or(RegistrationError::RegistrationNotFound)?;

        if registration.status == BulkStatus::Failed.as_str() {
            return self.check_late_payment(registration).await;
        }
        if !registration.is_pending() {
            return Ok(PaymentOutcome::AlreadyProcessed {
                status: registration.status,
            });
        }

        let verified = self.paystack.verify_transaction(reference).await?;

        match verified.status {
            TransactionStatus::Success => {
                if verified.amount != registration.total_amount_minor
                    || !verified.currency.eq_ignore_ascii_case(&registration.currency)
                {
                    tracing::error!(
                        bulk_registration_id = %registration.id,
                        expected = registration.total_amount_minor,
                        paid = verified.amount,
                        currency = %verified.currency,
                        "Paid amount does not match order total"
                    );
                    return self
                        .fail(
                            registration.id,
                            &format!(
                                "Paid {} {} but order total is {} {}",
                                verified.currency,
                                verified.amount,
                                registration.currency,
                                registration.total_amount_minor
                            ),
                        )
                        .await;
                }
                self.finalize(registration.id).await
            }
            status if status.is_terminal_failure() => {
                let reason = verified
                    .gateway_response
                    .unwrap_or_else(|| format!("Payment {:?}", status).to_lowercase());
                self.fail(registration.id, &reason).await
            }
            _ => Ok(PaymentOutcome::Pending),
        }
    }

    /// A failed registration can still be paid if the buyer finishes checkout
    /// after the retry job gave up. Those payments are flagged for refund.
    async fn check_late_payment(
        &self,
        registration: BulkRegistration,
    ) -> Result<PaymentOutcome, RegistrationError> {
        let already_failed = PaymentOutcome::AlreadyProcessed {
            status: registration.status.clone(),
        };

        let verified = match self
            .paystack
            .verify_transaction(&registration.payment_reference)
            .await
        {
            Ok(verified) => verified,
            Err(e) => {
                tracing::warn!(
                    bulk_registration_id = %registration.id,
                    error = %e,
                    "Could not re-verify failed registration"
                );
                return Ok(already_failed);
            }
        };

        if verified.status != TransactionStatus::Success {
            return Ok(already_failed);
        }

        tracing::error!(
            bulk_registration_id = %registration.id,
            reference = %registration.payment_reference,
            amount = verified.amount,
            currency = %verified.currency,
            "Payment succeeded for a failed registration; refund required"
        );

        Ok(PaymentOutcome::RefundRequired {
            reason: registration
                .failure_reason
                .unwrap_or_else(|| "Registration was closed before payment".to_string()),
        })
    }

    /// Marks a pending registration failed (e.g. from a `charge.failed` webhook).
    pub async fn record_failure(
        &self,
        reference: &str,
        reason: &str,
    ) -> Result<PaymentOutcome, RegistrationError> {
        let registration = BulkRegistration::find_by_reference(&self.pool, reference)
            .await?
            .ok_or(RegistrationError::RegistrationNotFound)?;

        self.fail(registration.id, reason).await
    }

    async fn fail(&self, id: Uuid, reason: &str) -> Result<PaymentOutcome, RegistrationError> {
        let mut conn = self.pool.acquire().await?;
        if BulkRegistration::mark_failed(&mut conn, id, reason).await? {
            tracing::warn!(bulk_registration_id = %id, reason, "Bulk registration failed");
            Ok(PaymentOutcome::Failed {
                reason: reason.to_string(),
            })
        } else {
            let status = BulkRegistration::find_by_id(&self.pool, id)
                .await?
                .map(|r| r.status)
                .unwrap_or_else(|| BulkStatus::Failed.as_str().to_string());
            Ok(PaymentOutcome::AlreadyProcessed { status })
        }
    }

    /// Issues tickets for a paid registration in a single transaction.
    async fn finalize(&self, id: Uuid) -> Result<PaymentOutcome, RegistrationError> {
        let mut tx = self.pool.begin().await?;

        let Some(registration) = BulkRegistration::lock_pending(&mut tx, id).await? else {
            let status = BulkRegistration::find_by_id(&self.pool, id)
                .await?
                .map(|r| r.status)
                .ok_or(RegistrationError::RegistrationNotFound)?;
            return Ok(PaymentOutcome::AlreadyProcessed { status });
        };

        if !Event::try_reserve_seats(&mut tx, registration.event_id, registration.quantity).await? {
            let reason = "Event sold out before payment was confirmed";
            BulkRegistration::mark_failed(&mut tx, id, reason).await?;
            tx.commit().await?;

            tracing::error!(
                bulk_registration_id = %id,
                reference = %registration.payment_reference,
                "Paid registration could not be seated; refund required"
            );
            return Ok(PaymentOutcome::Failed {
                reason: reason.to_string(),
            });
        }

        let mut tickets = Vec::with_capacity(registration.attendees.len());
        for attendee in registration.attendees.iter() {
            let ticket_code = ticket_codes::generate_code()?;
            let ticket = Ticket::create(
                &mut tx,
                NewTicket {
                    event_id: registration.event_id,
                    bulk_registration_id: Some(registration.id),
                    registration_id: None,
                    attendee_name: attendee.name.clone(),
                    attendee_email: attendee.email.clone(),
                    ticket_code,
                },
            )
            .await?;
            tickets.push(ticket);
        }

        BulkRegistration::mark_completed(&mut tx, id).await?;
        tx.commit().await?;

        tracing::info!(
            bulk_registration_id = %id,
            reference = %registration.payment_reference,
            tickets_issued = tickets.len(),
            "Bulk registration completed"
        );

        if let Some(event) = Event::find_by_id(&self.pool, registration.event_id).await? {
            let mut emails: Vec<OutgoingEmail> = tickets
                .iter()
                .map(|ticket| email::ticket_confirmation(&event, ticket, &self.ticket_url(ticket)))
                .collect();
            if registration.total_amount_minor > 0 {
                emails.push(email::purchase_receipt(
                    &registration.purchaser_email,
                    &event,
                    registration.quantity,
                    registration.total_amount_minor,
                    &registration.payment_reference,
                ));
            }
            self.send_in_background(emails);
        }

        Ok(PaymentOutcome::Completed {
            tickets_issued: tickets.len(),
        })
    }

    fn send_in_background(&self, emails: Vec<OutgoingEmail>) {
        let mailer = self.mailer.clone();
        tokio::spawn(async move {
            let delivered = mailer.send_all_best_effort(&emails).await;
            tracing::debug!(delivered, total = emails.len(), "Confirmation emails sent");
        });
    }

    /// Registers the signed-in user for a free event and issues their ticket.
    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn register_free(&self, event_id: Uuid, user: &User) -> Result<Ticket, RegistrationError> {
        let event = self.load_open_event(event_id).await?;
        if event.is_paid() {
            return Err(RegistrationError::NotFree);
        }

        if EventRegistration::find_confirmed(&self.pool, event.id, user.id)
            .await?
            .is_some()
        {
            return Err(RegistrationError::AlreadyRegistered);
        }
        ensure_capacity(&event, 1)?;

        let mut tx = self.pool.begin().await?;

        if !Event::try_reserve_seats(&mut tx, event.id, 1).await? {
            return Err(RegistrationError::CapacityExceeded {
                requested: 1,
                available: 0,
            });
        }

        let registration =
            EventRegistration::create(&mut tx, event.id, user.id, &user.display_name, &user.email)
                .await
                .map_err(|e| match e {
                    sqlx::Error::Database(db) if db.is_unique_violation() => {
                        RegistrationError::AlreadyRegistered
                    }
                    other => RegistrationError::Database(other),
                })?;

        let ticket_code = ticket_codes::generate_code()?;
        let ticket = Ticket::create(
            &mut tx,
            NewTicket {
                event_id: event.id,
                bulk_registration_id: None,
                registration_id: Some(registration.id),
                attendee_name: user.display_name.clone(),
                attendee_email: user.email.clone(),
                ticket_code,
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(event_id = %event.id, ticket_id = %ticket.id, "Free registration confirmed");

        let confirmation = email::ticket_confirmation(&event, &ticket, &self.ticket_url(&ticket));
        self.send_in_background(vec![confirmation]);

        Ok(ticket)
    }
}
