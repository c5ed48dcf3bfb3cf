// Models module - Database entity representations

pub mod booking;
pub mod bulk_registration;
pub mod card;
pub mod event;
pub mod oauth_account;
pub mod registration;
pub mod subscription;
pub mod ticket;
pub mod user;

pub use booking::Booking;
pub use bulk_registration::{Attendee, BulkRegistration};
pub use card::BusinessCard;
pub use event::Event;
pub use oauth_account::OAuthAccount;
pub use registration::EventRegistration;
pub use subscription::{Subscription, SubscriptionLog};
pub use ticket::Ticket;
pub use user::User;
