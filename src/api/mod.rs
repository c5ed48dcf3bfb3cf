// API module - HTTP endpoints

pub mod auth;
pub mod calendar;
pub mod cards;
pub mod events;
pub mod health;
pub mod middleware;
pub mod payments;
pub mod subscriptions;
pub mod tickets;
pub mod users;
pub mod widget;

use axum::Router;

use middleware::session::AppState;

/// All HTTP routes, without the session and tracing layers.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(users::router())
        .merge(cards::router())
        .merge(events::router())
        .merge(tickets::router())
        .merge(payments::router())
        .merge(subscriptions::router())
        .merge(calendar::router())
        .merge(widget::router())
}
