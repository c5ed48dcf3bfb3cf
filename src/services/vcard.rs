//! vCard 3.0 rendering for business cards.

use crate::models::BusinessCard;

/// Escapes a property value per RFC 2426 section 4.
fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ',' => out.push_str("\\,"),
            ';' => out.push_str("\\;"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            c => out.push(c),
        }
    }
    out
}

/// Splits a display name into (family, given) for the `N` property.
fn split_name(full_name: &str) -> (&str, &str) {
    let full_name = full_name.trim();
    match full_name.rsplit_once(' ') {
        Some((given, family)) => (family, given.trim()),
        None => (full_name, ""),
    }
}

pub fn render(card: &BusinessCard, share_url: &str) -> String {
    let (family, given) = split_name(&card.full_name);

    let mut lines = vec![
        "BEGIN:VCARD".to_string(),
        "VERSION:3.0".to_string(),
        format!("N:{};{};;;", escape(family), escape(given)),
        format!("FN:{}", escape(&card.full_name)),
    ];

    if let Some(company) = &card.company {
        lines.push(format!("ORG:{}", escape(company)));
    }
    if let Some(title) = &card.job_title {
        lines.push(format!("TITLE:{}", escape(title)));
    }
    if let Some(email) = &card.email {
        lines.push(format!("EMAIL;TYPE=INTERNET:{}", escape(email)));
    }
    if let Some(phone) = &card.phone {
        lines.push(format!("TEL;TYPE=CELL:{}", escape(phone)));
    }
    if let Some(website) = &card.website {
        lines.push(format!("URL:{}", escape(website)));
    }
    if let Some(linkedin) = &card.linkedin_url {
        lines.push(format!("X-SOCIALPROFILE;TYPE=linkedin:{}", escape(linkedin)));
    }

    let note = match &card.bio {
        Some(bio) => format!("{}\n{}", bio, share_url),
        None => share_url.to_string(),
    };
    lines.push(format!("NOTE:{}", escape(&note)));
    lines.push(format!("REV:{}", card.updated_at.format("%Y%m%dT%H%M%SZ")));
    lines.push("END:VCARD".to_string());

    let mut out = lines.join("\r\n");
    out.push_str("\r\n");
    out
}

/// Download filename, e.g. `ada-lovelace.vcf`.
pub fn filename(card: &BusinessCard) -> String {
    let slug: String = card
        .full_name
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if slug.is_empty() {
        "contact.vcf".to_string()
    } else {
        format!("{}.vcf", slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn card() -> BusinessCard {
        let at = Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap();
        BusinessCard {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            full_name: "Ada Lovelace".to_string(),
            job_title: Some("Analyst".to_string()),
            company: Some("Engines, Ltd; London".to_string()),
            email: Some("ada@example.com".to_string()),
            phone: Some("+44 20 7946 0000".to_string()),
            website: None,
            linkedin_url: None,
            bio: None,
            theme_color: "#1f2937".to_string(),
            is_primary: true,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_render_vcard() {
        let vcard = render(&card(), "https://cardlink.app/c/123");

        assert!(vcard.starts_with("BEGIN:VCARD\r\nVERSION:3.0\r\n"));
        assert!(vcard.contains("N:Lovelace;Ada;;;\r\n"));
        assert!(vcard.contains("FN:Ada Lovelace\r\n"));
        assert!(vcard.contains("ORG:Engines\\, Ltd\\; London\r\n"));
        assert!(vcard.contains("TEL;TYPE=CELL:+44 20 7946 0000\r\n"));
        assert!(vcard.contains("NOTE:https://cardlink.app/c/123\r\n"));
        assert!(vcard.contains("REV:20250314T093000Z\r\n"));
        assert!(vcard.ends_with("END:VCARD\r\n"));
        assert!(!vcard.contains("URL:"));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("a\\b"), "a\\\\b");
        assert_eq!(escape("line1\r\nline2"), "line1\\nline2");
    }

    #[test]
    fn test_single_word_name() {
        assert_eq!(split_name("Madonna"), ("Madonna", ""));
        assert_eq!(split_name("Jean Luc Picard"), ("Picard", "Jean Luc"));
    }

    #[test]
    fn test_filename() {
        assert_eq!(filename(&card()), "ada-lovelace.vcf");
        let mut nameless = card();
        nameless.full_name = "  ".to_string();
        assert_eq!(filename(&nameless), "contact.vcf");
    }
}
