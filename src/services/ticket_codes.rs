//! Ticket codes and the signed payload encoded in ticket QR codes.
//!
//! Payload format: `TKT1.<ticket uuid>.<code>.<hmac-sha256 hex>` where the
//! HMAC covers everything before the last dot.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ring::rand::{SecureRandom, SystemRandom};
use uuid::Uuid;

use crate::services::signature;

const PAYLOAD_PREFIX: &str = "TKT1";
const CODE_BYTES: usize = 12;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum TicketCodeError {
    #[error("Random source unavailable")]
    Rng,

    #[error("Malformed ticket payload")]
    Malformed,

    #[error("Ticket signature does not match")]
    BadSignature,
}

/// Random URL-safe code, 16 characters.
pub fn generate_code() -> Result<String, TicketCodeError> {
    let mut bytes = [0u8; CODE_BYTES];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| TicketCodeError::Rng)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

pub fn qr_payload(ticket_id: Uuid, code: &str, key: &[u8]) -> String {
    let body = format!("{}.{}.{}", PAYLOAD_PREFIX, ticket_id, code);
    let sig = signature::sign(&body, key);
    format!("{}.{}", body, sig)
}

/// Checks the signature and returns the ticket id and code.
pub fn parse_payload(payload: &str, key: &[u8]) -> Result<(Uuid, String), TicketCodeError> {
    let payload = payload.trim();
    let (body, sig) = payload.rsplit_once('.').ok_or(TicketCodeError::Malformed)?;

    let mut parts = body.split('.');
    let (Some(PAYLOAD_PREFIX), Some(id), Some(code), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TicketCodeError::Malformed);
    };

    let ticket_id = Uuid::parse_str(id).map_err(|_| TicketCodeError::Malformed)?;
    if code.is_empty() {
        return Err(TicketCodeError::Malformed);
    }

    if !signature::verify(body, sig, key) {
        return Err(TicketCodeError::BadSignature);
    }

    Ok((ticket_id, code.to_string()))
}
