// Services module - Business logic

pub mod bulk_registration;
pub mod calendar;
pub mod email;
pub mod encryption;
pub mod oauth;
pub mod paystack;
pub mod qr_generator;
pub mod revenuecat;
pub mod signature;
pub mod ticket_codes;
pub mod validation;
pub mod vcard;
pub mod wallet_pass;
