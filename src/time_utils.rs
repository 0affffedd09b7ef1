use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

#[derive(Clone, Copy)]
enum ParsedTimezone {
    Named(Tz),
    Fixed(FixedOffset),
}

fn parse_fixed_offset(raw: &str) -> Option<FixedOffset> {
    let trimmed = raw.trim();
    let (sign, rest) = match trimmed.chars().next()? {
        '+' => (1, &trimmed[1..]),
        '-' => (-1, &trimmed[1..]),
        _ => return None,
    };

    let rest = rest.trim();
    if rest.is_empty() {
        return None;
    }

    let (hours, minutes) = if let Some((h, m)) = rest.split_once(':') {
        (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?)
    } else if rest.len() > 2 {
        let (h, m) = rest.split_at(rest.len() - 2);
        (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?)
    } else {
        (rest.parse::<i32>().ok()?, 0)
    };

    if hours > 14 || minutes > 59 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn parse_timezone(raw: &str) -> Option<ParsedTimezone> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let upper = trimmed.to_uppercase();
    if upper == "UTC" || upper == "GMT" {
        return FixedOffset::east_opt(0).map(ParsedTimezone::Fixed);
    }
    if let Some(offset) = upper.strip_prefix("UTC").or_else(|| upper.strip_prefix("GMT")) {
        return parse_fixed_offset(offset).map(ParsedTimezone::Fixed);
    }
    if trimmed.starts_with('+') || trimmed.starts_with('-') {
        return parse_fixed_offset(trimmed).map(ParsedTimezone::Fixed);
    }

    trimmed.parse::<Tz>().ok().map(ParsedTimezone::Named)
}

/// Returns the timezone string unchanged if it can be resolved, `None` otherwise.
pub fn normalize_timezone(raw: &str) -> Option<String> {
    parse_timezone(raw).map(|_| raw.trim().to_string())
}

/// Calendar day of `utc_dt` in `raw_tz`; unknown zones fall back to UTC.
pub fn local_date(raw_tz: &str, utc_dt: DateTime<Utc>) -> NaiveDate {
    match parse_timezone(raw_tz) {
        Some(ParsedTimezone::Named(tz)) => utc_dt.with_timezone(&tz).date_naive(),
        Some(ParsedTimezone::Fixed(offset)) => utc_dt.with_timezone(&offset).date_naive(),
        None => utc_dt.date_naive(),
    }
}

/// UTC instant of local midnight for the day containing `utc_dt`.
pub fn start_of_local_day(raw_tz: &str, utc_dt: DateTime<Utc>) -> DateTime<Utc> {
    let midnight = local_date(raw_tz, utc_dt)
        .and_hms_opt(0, 0, 0)
        .unwrap_or_default();
    let resolved = match parse_timezone(raw_tz) {
        Some(ParsedTimezone::Named(tz)) => tz
            .from_local_datetime(&midnight)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc)),
        Some(ParsedTimezone::Fixed(offset)) => offset
            .from_local_datetime(&midnight)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc)),
        None => None,
    };
    resolved.unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

/// Export format: `DD/MM/YYYY HH:MM:SS` in the local zone.
pub fn format_local_time(raw_tz: &str, utc_dt: DateTime<Utc>) -> String {
    const FORMAT: &str = "%d/%m/%Y %H:%M:%S";
    match parse_timezone(raw_tz) {
        Some(ParsedTimezone::Named(tz)) => utc_dt.with_timezone(&tz).format(FORMAT).to_string(),
        Some(ParsedTimezone::Fixed(offset)) => {
            utc_dt.with_timezone(&offset).format(FORMAT).to_string()
        }
        None => utc_dt.format(FORMAT).to_string(),
    }
}
