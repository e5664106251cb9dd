use chrono::{NaiveTime, Timelike};

pub const MINUTES_PER_DAY: u16 = 1440;

/// Parses a textual time-of-day into minutes since midnight (0–1439).
///
/// Accepts bare `HH:MM` / `HH:MM:SS` values as well as combined date-time
/// strings (`2026-02-16T06:30:00`), optionally suffixed with a UTC marker or
/// a `±HH:MM` zone offset; the date and zone parts are discarded. Returns
/// `None` for anything that does not contain two in-range numeric
/// components. Malformed input is not an error anywhere in this crate — a
/// task with an unparsable start time simply never becomes timeline-eligible.
pub fn parse_minutes(text: &str) -> Option<u16> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let time_part = match trimmed.find('T') {
        Some(index) => &trimmed[index + 1..],
        None => trimmed,
    };
    let time_part = time_part
        .strip_suffix('Z')
        .or_else(|| time_part.strip_suffix('z'))
        .unwrap_or(time_part);
    let time_part = strip_zone_offset(time_part);

    let mut components = time_part.split(':');
    let hour = components.next()?.trim().parse::<u32>().ok()?;
    let minute = components.next()?.trim().parse::<u32>().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }

    Some((hour * 60 + minute) as u16)
}

/// Renders minutes-since-midnight as zero-padded `HH:MM`.
pub fn format_minutes(total: u16) -> String {
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Missing values render as empty text rather than a sentinel time.
pub fn format_minutes_opt(total: Option<u16>) -> String {
    match total {
        Some(total) => format_minutes(total),
        None => String::new(),
    }
}

pub fn minutes_of_day(time: NaiveTime) -> u16 {
    (time.hour() * 60 + time.minute()) as u16
}

fn strip_zone_offset(text: &str) -> &str {
    let bytes = text.as_bytes();
    if bytes.len() < 6 {
        return text;
    }
    let tail = &bytes[bytes.len() - 6..];
    let signed = tail[0] == b'+' || tail[0] == b'-';
    let shaped = tail[1].is_ascii_digit()
        && tail[2].is_ascii_digit()
        && tail[3] == b':'
        && tail[4].is_ascii_digit()
        && tail[5].is_ascii_digit();
    if signed && shaped {
        &text[..text.len() - 6]
    } else {
        text
    }
}
