//! iCalendar feeds and booking slot rules.

use chrono::{DateTime, Duration, Utc};

use crate::models::{Booking, Event};

pub const MIN_BOOKING_MINUTES: i64 = 15;
pub const MAX_BOOKING_MINUTES: i64 = 240;
pub const MAX_ADVANCE_DAYS: i64 = 365;

const PRODID: &str = "-//cardlink//calendar//EN";
const MAX_LINE_OCTETS: usize = 75;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum SlotError {
    #[error("Booking must be between {MIN_BOOKING_MINUTES} and {MAX_BOOKING_MINUTES} minutes")]
    InvalidDuration,

    #[error("Booking slot is in the past")]
    InPast,

    #[error("Booking slot is more than {MAX_ADVANCE_DAYS} days ahead")]
    TooFarAhead,
}

/// Validates a requested slot and returns its end time.
pub fn validate_slot(
    starts_at: DateTime<Utc>,
    duration_minutes: i64,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, SlotError> {
    if !(MIN_BOOKING_MINUTES..=MAX_BOOKING_MINUTES).contains(&duration_minutes) {
        return Err(SlotError::InvalidDuration);
    }
    if starts_at <= now {
        return Err(SlotError::InPast);
    }
    let horizon = now
        .checked_add_signed(Duration::days(MAX_ADVANCE_DAYS))
        .ok_or(SlotError::TooFarAhead)?;
    if starts_at > horizon {
        return Err(SlotError::TooFarAhead);
    }
    starts_at
        .checked_add_signed(Duration::minutes(duration_minutes))
        .ok_or(SlotError::TooFarAhead)
}

fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            c => out.push(c),
        }
    }
    out
}

fn format_utc(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Folds a content line at 75 octets without splitting a UTF-8 sequence.
fn fold(line: &str, out: &mut String) {
    let mut width = 0;
    for c in line.chars() {
        let len = c.len_utf8();
        if width + len > MAX_LINE_OCTETS {
            out.push_str("\r\n ");
            width = 1;
        }
        out.push(c);
        width += len;
    }
    out.push_str("\r\n");
}

#[derive(Debug, Default)]
pub struct CalendarFeed {
    name: String,
    lines: Vec<String>,
}

impl CalendarFeed {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            lines: Vec::new(),
        }
    }

    fn push_vevent(
        &mut self,
        uid: String,
        stamp: DateTime<Utc>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        summary: &str,
        extra: Vec<String>,
    ) {
        self.lines.push("BEGIN:VEVENT".to_string());
        self.lines.push(format!("UID:{}", uid));
        self.lines.push(format!("DTSTAMP:{}", format_utc(stamp)));
        self.lines.push(format!("DTSTART:{}", format_utc(start)));
        self.lines.push(format!("DTEND:{}", format_utc(end)));
        self.lines.push(format!("SUMMARY:{}", escape_text(summary)));
        self.lines.extend(extra);
        self.lines.push("END:VEVENT".to_string());
    }

    pub fn add_event(&mut self, event: &Event, url: &str) {
        let mut extra = Vec::new();
        if let Some(description) = &event.description {
            extra.push(format!("DESCRIPTION:{}", escape_text(description)));
        }
        if let Some(location) = &event.location {
            extra.push(format!("LOCATION:{}", escape_text(location)));
        }
        extra.push(format!("URL:{}", url));

        self.push_vevent(
            format!("event-{}@cardlink", event.id),
            event.updated_at,
            event.starts_at,
            event.ends_at,
            &event.title,
            extra,
        );
    }

    /// Bookings are published as opaque busy blocks; guest details stay private.
    pub fn add_busy_booking(&mut self, booking: &Booking) {
        self.push_vevent(
            format!("booking-{}@cardlink", booking.id),
            booking.created_at,
            booking.starts_at,
            booking.ends_at,
            "Busy",
            vec!["TRANSP:OPAQUE".to_string()],
        );
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in [
            "BEGIN:VCALENDAR".to_string(),
            "VERSION:2.0".to_string(),
            format!("PRODID:{}", PRODID),
            "CALSCALE:GREGORIAN".to_string(),
            "METHOD:PUBLISH".to_string(),
            format!("X-WR-CALNAME:{}", escape_text(&self.name)),
        ]
        .iter()
        .chain(self.lines.iter())
        {
            fold(line, &mut out);
        }
        fold("END:VCALENDAR", &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, h, m, 0).unwrap()
    }

    #[test]
    fn test_slot_duration_bounds() {
        let now = at(8, 0);
        assert_eq!(validate_slot(at(10, 0), 15, now), Ok(at(10, 15)));
        assert_eq!(validate_slot(at(10, 0), 240, now), Ok(at(14, 0)));
        assert_eq!(validate_slot(at(10, 0), 14, now), Err(SlotError::InvalidDuration));
        assert_eq!(validate_slot(at(10, 0), 241, now), Err(SlotError::InvalidDuration));
    }

    #[test]
    fn test_slot_in_past() {
        assert_eq!(validate_slot(at(8, 0), 30, at(8, 0)), Err(SlotError::InPast));
        assert_eq!(validate_slot(at(7, 0), 30, at(8, 0)), Err(SlotError::InPast));
    }

    #[test]
    fn test_slot_too_far_ahead() {
        let now = at(8, 0);
        let far = "+262142-12-31T23:59:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(validate_slot(far, 240, now), Err(SlotError::TooFarAhead));

        let next_year = now + Duration::days(MAX_ADVANCE_DAYS + 1);
        assert_eq!(validate_slot(next_year, 30, now), Err(SlotError::TooFarAhead));

        let in_range = now + Duration::days(MAX_ADVANCE_DAYS);
        assert_eq!(
            validate_slot(in_range, 30, now),
            Ok(in_range + Duration::minutes(30))
        );
    }

    #[test]
    fn test_fold_long_lines() {
        let mut out = String::new();
        fold(&format!("SUMMARY:{}", "x".repeat(100)), &mut out);

        let lines: Vec<&str> = out.trim_end_matches("\r\n").split("\r\n").collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), 75);
        assert!(lines[1].starts_with(' '));
        assert!(lines[1].len() <= 75);
    }

    #[test]
    fn test_fold_keeps_multibyte_chars_whole() {
        let mut out = String::new();
        fold(&"é".repeat(60), &mut out);
        for line in out.split("\r\n") {
            assert!(line.len() <= 75);
        }
    }

    #[test]
    fn test_render_feed() {
        let event = Event {
            id: Uuid::nil(),
            organiser_id: Uuid::new_v4(),
            title: "Demo Day, 2025".to_string(),
            description: Some("Pitches; then drinks".to_string()),
            location: None,
            starts_at: at(16, 0),
            ends_at: at(19, 0),
            ticket_price_minor: 0,
            currency: "NGN".to_string(),
            max_attendees: None,
            current_attendees: 0,
            status: "published".to_string(),
            created_at: at(8, 0),
            updated_at: at(8, 0),
        };
        let booking = Booking {
            id: Uuid::nil(),
            host_user_id: event.organiser_id,
            guest_name: "Bola".to_string(),
            guest_email: "bola@example.com".to_string(),
            starts_at: at(11, 0),
            ends_at: at(11, 30),
            note: None,
            status: "confirmed".to_string(),
            created_at: at(9, 0),
        };

        let mut feed = CalendarFeed::new("Ada Lovelace");
        feed.add_event(&event, "https://cardlink.app/events/1");
        feed.add_busy_booking(&booking);
        let ics = feed.render();

        assert!(ics.starts_with("BEGIN:VCALENDAR\r\nVERSION:2.0\r\n"));
        assert!(ics.contains("SUMMARY:Demo Day\\, 2025\r\n"));
        assert!(ics.contains("DESCRIPTION:Pitches\\; then drinks\r\n"));
        assert!(ics.contains("DTSTART:20250602T160000Z\r\n"));
        assert!(ics.contains("UID:booking-00000000-0000-0000-0000-000000000000@cardlink\r\n"));
        assert!(!ics.contains("bola@example.com"));
        assert_eq!(ics.matches("BEGIN:VEVENT").count(), 2);
        assert!(ics.ends_with("END:VCALENDAR\r\n"));
    }
}
