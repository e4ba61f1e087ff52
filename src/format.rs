use chrono::{DateTime, Datelike, NaiveDateTime};

/// Month names used on the frame, January first.
const TURKISH_MONTHS: [&str; 12] = [
    "Ocak", "Şubat", "Mart", "Nisan", "Mayıs", "Haziran",
    "Temmuz", "Ağustos", "Eylül", "Ekim", "Kasım", "Aralık",
];

/// Formats an upstream timestamp as `"{day} {month} {year}"`.
///
/// Accepts strict RFC 3339 only: `T` separator, optional fraction, then `Z`
/// or a `±hh:mm` offset. The calendar date is taken as written (its own
/// offset), not converted to the host timezone. Anything else yields an empty
/// string so a bad timestamp never blocks a photo from showing.
pub fn format_date(iso_date: &str) -> String {
    if !is_rfc3339_shaped(iso_date) {
        return String::new();
    }

    let (day, month, year) = match DateTime::parse_from_str(iso_date, "%Y-%m-%dT%H:%M:%S%.f%:z") {
        Ok(parsed) => (parsed.day(), parsed.month0(), parsed.year()),
        Err(_) => match NaiveDateTime::parse_from_str(iso_date, "%Y-%m-%dT%H:%M:%S%.fZ") {
            Ok(parsed) => (parsed.day(), parsed.month0(), parsed.year()),
            Err(_) => return String::new(),
        },
    };

    format!("{} {} {}", day, TURKISH_MONTHS[month as usize], year)
}

// chrono skips whitespace before numbers and takes unpadded fields, so the
// layout is checked byte by byte first.
fn is_rfc3339_shaped(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() < 20 {
        return false;
    }

    let (head, mut rest) = bytes.split_at(19);
    let head_ok = head
        .iter()
        .zip(b"dddd-dd-ddTdd:dd:dd")
        .all(|(c, layout)| match layout {
            b'd' => c.is_ascii_digit(),
            literal => c == literal,
        });
    if !head_ok {
        return false;
    }

    if let [b'.', fraction @ ..] = rest {
        let digits = fraction.iter().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            return false;
        }
        rest = &fraction[digits..];
    }

    match rest {
        [b'Z'] => true,
        [b'+' | b'-', h1, h2, b':', m1, m2] => [h1, h2, m1, m2].iter().all(|c| c.is_ascii_digit()),
        _ => false,
    }
}

/// Joins the non-empty geographic fields with `", "`.
pub fn build_location(city: &str, state: &str, country: &str) -> String {
    [city, state, country]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}
