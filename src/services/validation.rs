//! Input checks shared by registration and booking handlers.

use std::collections::HashSet;

use crate::models::bulk_registration::Attendee;

pub const MAX_ATTENDEES_PER_REQUEST: usize = 50;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AttendeeError {
    #[error("At least one attendee is required")]
    Empty,

    #[error("A single purchase is limited to {max} attendees")]
    TooMany { max: usize },

    #[error("Attendee {index}: name is required")]
    MissingName { index: usize },

    #[error("Attendee {index}: '{email}' is not a valid email address")]
    InvalidEmail { index: usize, email: String },

    #[error("Attendee emails must be unique; '{email}' appears more than once")]
    DuplicateEmail { email: String },
}

/// Loose structural email check: one `@`, non-empty local part, dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// `#rgb` or `#rrggbb`. The value is interpolated into the card page's CSS.
pub fn is_valid_theme_color(color: &str) -> bool {
    let Some(hex) = color.strip_prefix('#') else {
        return false;
    };
    matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
}

/// Validates and normalizes the attendee list of a bulk purchase.
///
/// Names are trimmed and emails lower-cased; uniqueness is checked on the
/// normalized email. Attendee numbering in errors is 1-based.
pub fn validate_attendees(attendees: Vec<Attendee>) -> Result<Vec<Attendee>, AttendeeError> {
    if attendees.is_empty() {
        return Err(AttendeeError::Empty);
    }
    if attendees.len() > MAX_ATTENDEES_PER_REQUEST {
        return Err(AttendeeError::TooMany {
            max: MAX_ATTENDEES_PER_REQUEST,
        });
    }

    let mut seen = HashSet::with_capacity(attendees.len());
    let mut normalized = Vec::with_capacity(attendees.len());

    for (i, attendee) in attendees.into_iter().enumerate() {
        let index = i + 1;
        let name = attendee.name.trim().to_string();
        if name.is_empty() {
            return Err(AttendeeError::MissingName { index });
        }

        if !is_valid_email(&attendee.email) {
            return Err(AttendeeError::InvalidEmail {
                index,
                email: attendee.email,
            });
        }

        let email = normalize_email(&attendee.email);
        if !seen.insert(email.clone()) {
            return Err(AttendeeError::DuplicateEmail { email });
        }

        let phone = attendee
            .phone
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        normalized.push(Attendee { name, email, phone });
    }

    Ok(normalized)
}
