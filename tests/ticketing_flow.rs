//! Bulk registration against a real database and a mocked Paystack.
//! Needs `DATABASE_URL`; each test gets a fresh migrated database.

use chrono::{Duration, Utc};
use secrecy::Secret;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cardlink::jobs::payment_retry::{retry_pending_payments, MAX_VERIFICATION_ATTEMPTS};
use cardlink::models::{
    event::CreateEventData, user::UpsertUserData, Attendee, BulkRegistration, Event, Ticket, User,
};
use cardlink::services::bulk_registration::{PaymentOutcome, RegistrationError, TicketingService};
use cardlink::services::email::EmailClient;
use cardlink::services::paystack::PaystackClient;

const TICKET_PRICE: i64 = 500_000;

fn ticketing(pool: &PgPool, paystack: &MockServer) -> TicketingService {
    TicketingService::new(
        pool.clone(),
        PaystackClient::new(&paystack.uri(), Secret::new("sk_test_flow".to_string())),
        EmailClient::new("http://127.0.0.1:1", None, "tickets@cardlink.app"),
        b"signing-key",
        "http://localhost:3000",
        "http://localhost:3000/api/payments/paystack/callback",
    )
}

async fn mount_initialize(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/transaction/initialize"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": true,
            "message": "Authorization URL created",
            "data": {
                "authorization_url": "https://checkout.paystack.com/flow",
                "access_code": "flow",
                "reference": "ignored"
            }
        })))
        .mount(server)
        .await;
}

fn verify_response(status: &str, amount: i64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "status": true,
        "message": "Verification successful",
        "data": {
            "status": status,
            "reference": "CL-flow",
            "amount": amount,
            "currency": "NGN",
            "gateway_response": status,
            "paid_at": null
        }
    }))
}

async fn mount_verify(server: &MockServer, status: &str, amount: i64, times: Option<u64>) {
    let mock = Mock::given(method("GET"))
        .and(path_regex(r"^/transaction/verify/CL-[0-9a-f]+$"))
        .respond_with(verify_response(status, amount));
    match times {
        Some(n) => mock.up_to_n_times(n).mount(server).await,
        None => mock.mount(server).await,
    }
}

async fn user(pool: &PgPool, email: &str) -> User {
    User::upsert_by_email(
        pool,
        UpsertUserData {
            email: email.to_string(),
            display_name: "Ngozi Eze".to_string(),
            photo_url: None,
        },
    )
    .await
    .unwrap()
}

async fn event(pool: &PgPool, organiser: &User, price: i64, max_attendees: Option<i32>) -> Event {
    let starts_at = Utc::now() + Duration::days(14);
    Event::create(
        pool,
        CreateEventData {
            organiser_id: organiser.id,
            title: "Lagos Founders Meetup".to_string(),
            description: None,
            location: Some("Yaba".to_string()),
            starts_at,
            ends_at: starts_at + Duration::hours(3),
            ticket_price_minor: price,
            currency: "NGN".to_string(),
            max_attendees,
        },
    )
    .await
    .unwrap()
}

fn attendees(n: usize) -> Vec<Attendee> {
    (1..=n)
        .map(|i| Attendee {
            name: format!("Guest {}", i),
            email: format!("guest{}@example.com", i),
            phone: None,
        })
        .collect()
}

async fn backdate(pool: &PgPool, id: Uuid) {
    sqlx::query("UPDATE bulk_registrations SET created_at = NOW() - INTERVAL '3 minutes' WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .unwrap();
}

async fn status_of(pool: &PgPool, reference: &str) -> String {
    BulkRegistration::find_by_reference(pool, reference)
        .await
        .unwrap()
        .unwrap()
        .status
}

/// Starts a paid order for `quantity` attendees.
async fn start_order(
    pool: &PgPool,
    service: &TicketingService,
    max_attendees: Option<i32>,
    quantity: usize,
) -> (Event, BulkRegistration) {
    let organiser = user(pool, "organiser@example.com").await;
    let buyer = user(pool, "buyer@example.com").await;
    let event = event(pool, &organiser, TICKET_PRICE, max_attendees).await;

    let checkout = service
        .start_bulk_registration(event.id, &buyer, attendees(quantity))
        .await
        .unwrap();
    assert_eq!(
        checkout.authorization_url.as_deref(),
        Some("https://checkout.paystack.com/flow")
    );

    (event, checkout.registration)
}

#[sqlx::test]
async fn successful_payment_issues_one_ticket_per_attendee(pool: PgPool) {
    let paystack = MockServer::start().await;
    mount_initialize(&paystack).await;
    mount_verify(&paystack, "success", TICKET_PRICE * 3, None).await;
    let service = ticketing(&pool, &paystack);

    let (event, registration) = start_order(&pool, &service, Some(10), 3).await;
    assert_eq!(registration.total_amount_minor, TICKET_PRICE * 3);

    let outcome = service
        .confirm_payment(&registration.payment_reference)
        .await
        .unwrap();

    assert_eq!(outcome, PaymentOutcome::Completed { tickets_issued: 3 });
    let tickets = Ticket::list_by_bulk_registration(&pool, registration.id)
        .await
        .unwrap();
    assert_eq!(tickets.len(), 3);
    assert_eq!(
        Event::find_by_id(&pool, event.id).await.unwrap().unwrap().current_attendees,
        3
    );
}

#[sqlx::test]
async fn repeated_confirmation_does_not_issue_more_tickets(pool: PgPool) {
    let paystack = MockServer::start().await;
    mount_initialize(&paystack).await;
    mount_verify(&paystack, "success", TICKET_PRICE * 2, None).await;
    let service = ticketing(&pool, &paystack);

    let (event, registration) = start_order(&pool, &service, None, 2).await;
    let reference = registration.payment_reference.as_str();

    service.confirm_payment(reference).await.unwrap();
    let second = service.confirm_payment(reference).await.unwrap();

    assert_eq!(
        second,
        PaymentOutcome::AlreadyProcessed {
            status: "completed".to_string()
        }
    );
    assert_eq!(Ticket::count_by_event(&pool, event.id).await.unwrap(), 2);
}

#[sqlx::test]
async fn sold_out_before_payment_fails_the_order(pool: PgPool) {
    let paystack = MockServer::start().await;
    mount_initialize(&paystack).await;
    mount_verify(&paystack, "success", TICKET_PRICE * 2, None).await;
    let service = ticketing(&pool, &paystack);

    let (event, registration) = start_order(&pool, &service, Some(2), 2).await;

    // Someone else took the remaining seats while the buyer was paying.
    sqlx::query("UPDATE events SET current_attendees = max_attendees WHERE id = $1")
        .bind(event.id)
        .execute(&pool)
        .await
        .unwrap();

    let outcome = service
        .confirm_payment(&registration.payment_reference)
        .await
        .unwrap();

    assert!(matches!(outcome, PaymentOutcome::Failed { .. }));
    assert_eq!(status_of(&pool, &registration.payment_reference).await, "failed");
    assert_eq!(Ticket::count_by_event(&pool, event.id).await.unwrap(), 0);
}

#[sqlx::test]
async fn amount_mismatch_fails_the_order(pool: PgPool) {
    let paystack = MockServer::start().await;
    mount_initialize(&paystack).await;
    mount_verify(&paystack, "success", TICKET_PRICE, None).await;
    let service = ticketing(&pool, &paystack);

    let (event, registration) = start_order(&pool, &service, None, 2).await;

    let outcome = service
        .confirm_payment(&registration.payment_reference)
        .await
        .unwrap();

    assert!(matches!(outcome, PaymentOutcome::Failed { reason } if reason.contains("order total")));
    assert_eq!(status_of(&pool, &registration.payment_reference).await, "failed");
    assert_eq!(Ticket::count_by_event(&pool, event.id).await.unwrap(), 0);
}

#[sqlx::test]
async fn abandoned_checkout_stays_pending_until_paid(pool: PgPool) {
    let paystack = MockServer::start().await;
    mount_initialize(&paystack).await;
    mount_verify(&paystack, "abandoned", 0, Some(1)).await;
    mount_verify(&paystack, "success", TICKET_PRICE * 2, None).await;
    let service = ticketing(&pool, &paystack);

    let (_, registration) = start_order(&pool, &service, None, 2).await;
    backdate(&pool, registration.id).await;

    let stats = retry_pending_payments(&pool, &service, 50).await.unwrap();
    assert_eq!(stats.total_checked, 1);
    assert_eq!(stats.still_pending, 1);
    assert_eq!(stats.failed, 0);
    assert_eq!(
        status_of(&pool, &registration.payment_reference).await,
        "pending_payment"
    );

    let outcome = service
        .confirm_payment(&registration.payment_reference)
        .await
        .unwrap();

    assert_eq!(outcome, PaymentOutcome::Completed { tickets_issued: 2 });
    assert_eq!(
        Ticket::list_by_bulk_registration(&pool, registration.id)
            .await
            .unwrap()
            .len(),
        2
    );
}

#[sqlx::test]
async fn retry_job_gives_up_after_max_attempts(pool: PgPool) {
    let paystack = MockServer::start().await;
    mount_initialize(&paystack).await;
    mount_verify(&paystack, "ongoing", 0, None).await;
    let service = ticketing(&pool, &paystack);

    let (_, registration) = start_order(&pool, &service, None, 1).await;
    backdate(&pool, registration.id).await;

    for _ in 1..MAX_VERIFICATION_ATTEMPTS {
        let stats = retry_pending_payments(&pool, &service, 50).await.unwrap();
        assert_eq!(stats.still_pending, 1);
    }

    let last = retry_pending_payments(&pool, &service, 50).await.unwrap();
    assert_eq!(last.gave_up, 1);

    let row = BulkRegistration::find_by_reference(&pool, &registration.payment_reference)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status, "failed");
    assert_eq!(row.verification_attempts, MAX_VERIFICATION_ATTEMPTS);

    let after = retry_pending_payments(&pool, &service, 50).await.unwrap();
    assert_eq!(after.total_checked, 0);
}

#[sqlx::test]
async fn payment_after_failure_is_flagged_for_refund(pool: PgPool) {
    let paystack = MockServer::start().await;
    mount_initialize(&paystack).await;
    mount_verify(&paystack, "success", TICKET_PRICE, None).await;
    let service = ticketing(&pool, &paystack);

    let (event, registration) = start_order(&pool, &service, None, 1).await;
    let reference = registration.payment_reference.as_str();

    let failed = service
        .record_failure(reference, "Payment not confirmed")
        .await
        .unwrap();
    assert!(matches!(failed, PaymentOutcome::Failed { .. }));

    let outcome = service.confirm_payment(reference).await.unwrap();

    assert_eq!(
        outcome,
        PaymentOutcome::RefundRequired {
            reason: "Payment not confirmed".to_string()
        }
    );
    assert_eq!(status_of(&pool, reference).await, "failed");
    assert_eq!(Ticket::count_by_event(&pool, event.id).await.unwrap(), 0);
}

#[sqlx::test]
async fn free_event_registers_a_user_once(pool: PgPool) {
    let paystack = MockServer::start().await;
    let service = ticketing(&pool, &paystack);

    let organiser = user(&pool, "organiser@example.com").await;
    let guest = user(&pool, "guest@example.com").await;
    let event = event(&pool, &organiser, 0, Some(50)).await;

    let ticket = service.register_free(event.id, &guest).await.unwrap();
    assert_eq!(ticket.attendee_email, "guest@example.com");

    let again = service.register_free(event.id, &guest).await;
    assert!(matches!(again, Err(RegistrationError::AlreadyRegistered)));
    assert_eq!(Ticket::count_by_event(&pool, event.id).await.unwrap(), 1);
}
