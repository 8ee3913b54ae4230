//! HTTP-date classification and re-anchoring.
//!
//! Dated response headers (`Date`, `Expires`, `Last-Modified`, ...) are stored
//! as an offset from the moment the exchange was recorded, and rendered against
//! the wall clock when the response is served. Three grammars are recognized,
//! per RFC 9110 section 5.6.7:
//!
//! - IMF-fixdate / RFC 1123: `Sun, 06 Nov 1994 08:49:37 GMT`
//! - obsolete RFC 850: `Sunday, 06-Nov-94 08:49:37 GMT`
//! - ANSI C `asctime`: `Sun Nov  6 08:49:37 1994` (one or two spaces before a single-digit day)

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

static RFC1123: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(Mon|Tue|Wed|Thu|Fri|Sat|Sun), (\d{2}) (Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec) (\d{4}) (\d{2}):(\d{2}):(\d{2}) GMT$",
    )
    .expect("RFC 1123 date pattern is valid")
});

static RFC850: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(Monday|Tuesday|Wednesday|Thursday|Friday|Saturday|Sunday), (\d{2})-(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)-(\d{2}) (\d{2}):(\d{2}):(\d{2}) GMT$",
    )
    .expect("RFC 850 date pattern is valid")
});

static ASCTIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(Mon|Tue|Wed|Thu|Fri|Sat|Sun) (Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec) ( ?\d|\d{2}) (\d{2}):(\d{2}):(\d{2}) (\d{4})$",
    )
    .expect("asctime date pattern is valid")
});

/// Which HTTP-date grammar a header value matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateGrammar {
    Rfc1123,
    Rfc850,
    Asctime,
}

/// Offset in milliseconds between the recording instant and a dated header value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeDelta {
    millis: i64,
}

impl TimeDelta {
    pub const fn from_millis(millis: i64) -> Self {
        Self { millis }
    }

    /// Offset of `dated` relative to `recorded_at`
    pub fn between(recorded_at: DateTime<Utc>, dated: DateTime<Utc>) -> Self {
        Self {
            millis: (dated - recorded_at).num_milliseconds(),
        }
    }

    pub const fn millis(self) -> i64 {
        self.millis
    }

    /// Re-anchor this offset on `now`.
    ///
    /// Offsets that cannot be represented saturate to `now`.
    pub fn anchor(self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::try_milliseconds(self.millis)
            .and_then(|offset| now.checked_add_signed(offset))
            .unwrap_or(now)
    }

    /// Render `now + offset` as an RFC 1123 HTTP-date
    pub fn render(self, now: DateTime<Utc>) -> String {
        format_http_date(self.anchor(now))
    }
}

/// Format an instant as an RFC 1123 HTTP-date (`Sun, 06 Nov 1994 08:49:37 GMT`)
pub fn format_http_date(instant: DateTime<Utc>) -> String {
    instant.format(HTTP_DATE_FORMAT).to_string()
}

/// Classify a header value. Returns `None` for anything that is not exactly an HTTP-date.
pub fn classify(value: &str) -> Option<DateGrammar> {
    parse_http_date_with_grammar(value).map(|(grammar, _)| grammar)
}

/// Parse a header value as an HTTP-date under any of the three grammars.
///
/// The whole value must match; a value naming an impossible instant, or whose
/// weekday disagrees with its date, is not a date.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    parse_http_date_with_grammar(value).map(|(_, instant)| instant)
}

fn parse_http_date_with_grammar(value: &str) -> Option<(DateGrammar, DateTime<Utc>)> {
    if let Some(caps) = RFC1123.captures(value) {
        let year: i32 = caps[4].parse().ok()?;
        let instant = build_instant(&caps[1], &caps[2], &caps[3], year, &caps, 5)?;
        return Some((DateGrammar::Rfc1123, instant));
    }

    if let Some(caps) = RFC850.captures(value) {
        let short_year: i32 = caps[4].parse().ok()?;
        let year = if short_year < 70 {
            2000 + short_year
        } else {
            1900 + short_year
        };
        let instant = build_instant(&caps[1], &caps[2], &caps[3], year, &caps, 5)?;
        return Some((DateGrammar::Rfc850, instant));
    }

    if let Some(caps) = ASCTIME.captures(value) {
        let year: i32 = caps[7].parse().ok()?;
        let instant = build_instant(&caps[1], caps[3].trim_start(), &caps[2], year, &caps, 4)?;
        return Some((DateGrammar::Asctime, instant));
    }

    None
}

/// Build an instant from grammar pieces that already passed the pattern.
///
/// `hour_group` is the capture group holding the hour; minutes and seconds follow it.
fn build_instant(
    weekday: &str,
    day: &str,
    month: &str,
    year: i32,
    caps: &Captures<'_>,
    hour_group: usize,
) -> Option<DateTime<Utc>> {
    let month = month_number(month)?;
    let day: u32 = day.parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;

    // RFC 850 spells the weekday out, the other grammars abbreviate it
    let weekday_format = if weekday.len() == 3 { "%a" } else { "%A" };
    if date.format(weekday_format).to_string() != weekday {
        return None;
    }

    let hour: u32 = caps[hour_group].parse().ok()?;
    let minute: u32 = caps[hour_group + 1].parse().ok()?;
    let second: u32 = caps[hour_group + 2].parse().ok()?;
    let time = NaiveTime::from_hms_opt(hour, minute, second)?;

    Some(NaiveDateTime::new(date, time).and_utc())
}

fn month_number(month: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];
    MONTHS
        .iter()
        .position(|m| *m == month)
        .map(|idx| idx as u32 + 1)
}

/// Parse an entry's `startedDateTime` (ISO 8601 / RFC 3339, any offset)
pub fn parse_recording_time(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|instant| instant.with_timezone(&Utc))
}

/// A response header value as stored in the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    /// Replayed byte-identical to the capture
    Literal(String),
    /// An HTTP-date, re-anchored on the serve time
    Dated(TimeDelta),
}

impl HeaderValue {
    /// Classify a captured value against the entry's recording instant
    pub fn normalize(value: &str, recorded_at: DateTime<Utc>) -> Self {
        match parse_http_date(value) {
            Some(dated) => HeaderValue::Dated(TimeDelta::between(recorded_at, dated)),
            None => HeaderValue::Literal(value.to_string()),
        }
    }

    pub fn render(&self, now: DateTime<Utc>) -> String {
        match self {
            HeaderValue::Literal(value) => value.clone(),
            HeaderValue::Dated(delta) => delta.render(now),
        }
    }
}
