//! Publish-date parsing for RSS `pubDate` values
//!
//! RSS dates look like `Thu, 19 Jun 2008 15:51:25 -1100`. Parsing never
//! fails: fields that cannot be scanned stay at zero, and when the calendar
//! conversion rejects the result an approximate epoch offset is computed
//! instead.
//!
//! ## Precision
//!
//! The approximate path uses 30-day months and 365-day years counted from
//! 1970 and ignores the timezone offset. Values produced that way are only
//! roughly comparable with exact ones.

use chrono::{FixedOffset, NaiveDate, NaiveTime, TimeZone};

/// Month abbreviations indexed by 0-based month number
const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const SECS_PER_MINUTE: i64 = 60;
const SECS_PER_HOUR: i64 = 3_600;
const SECS_PER_DAY: i64 = 86_400;
const SECS_PER_MONTH: i64 = 2_592_000;
const SECS_PER_YEAR: i64 = 31_536_000;
const EPOCH_YEAR: i64 = 1970;

/// Which conversion produced a timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// Calendar-aware conversion honoring the timezone offset
    Exact,
    /// Fixed-unit approximation (no leap years, 30-day months, offset ignored)
    Approximate,
}

/// Fields scanned from a publish-date string
///
/// Anything that could not be scanned is left at zero, so an unknown month
/// reads as January and a missing offset as UTC.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PubDateFields {
    pub day: u32,
    /// 0-based month index
    pub month: u32,
    pub year: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    /// Signed `±HHMM` offset as written, e.g. `-1100`
    pub offset: i64,
}

/// A parsed publish date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedPubDate {
    pub fields: PubDateFields,
    /// Seconds since the Unix epoch
    pub timestamp: i64,
    pub precision: Precision,
}

/// Parse a publish date into seconds since the Unix epoch
///
/// Never fails; see the module docs for how malformed input degrades.
pub fn parse_pub_date(input: &str) -> i64 {
    parse_pub_date_detailed(input).timestamp
}

/// Parse a publish date, also reporting the scanned fields and precision
pub fn parse_pub_date_detailed(input: &str) -> ParsedPubDate {
    let fields = scan_fields(input);

    match calendar_timestamp(&fields) {
        Some(timestamp) => ParsedPubDate {
            fields,
            timestamp,
            precision: Precision::Exact,
        },
        None => {
            tracing::trace!("Falling back to approximate timestamp for '{}'", input);
            ParsedPubDate {
                fields,
                timestamp: approximate_timestamp(&fields),
                precision: Precision::Approximate,
            }
        }
    }
}

/// Map a three-letter month abbreviation to its 0-based index
///
/// Matching is exact and case-sensitive. Unknown names map to 0.
pub fn month_index(name: &str) -> u32 {
    MONTH_ABBREVIATIONS
        .iter()
        .position(|m| *m == name)
        .map_or(0, |i| i as u32)
}

/// Scan `<wday>, <day> <mon> <year> <HH>:<MM>:<SS> <±ZZZZ>` positionally
pub fn scan_fields(input: &str) -> PubDateFields {
    let mut fields = PubDateFields::default();
    let mut scanner = Scanner::new(input);
    // Stops at the first field that does not scan; the rest stay zero
    let _ = scan_into(&mut scanner, &mut fields);
    fields
}

fn scan_into(s: &mut Scanner<'_>, f: &mut PubDateFields) -> Option<()> {
    s.word(3)?;
    s.literal(',')?;
    f.day = s.unsigned(2)?;
    f.month = month_index(s.word(3)?);
    f.year = s.unsigned(4)?;
    f.hour = s.unsigned(2)?;
    s.literal(':')?;
    f.minute = s.unsigned(2)?;
    s.literal(':')?;
    f.second = s.unsigned(2)?;
    f.offset = s.signed(5)?;
    Some(())
}

fn calendar_timestamp(f: &PubDateFields) -> Option<i64> {
    let date = NaiveDate::from_ymd_opt(i32::try_from(f.year).ok()?, f.month + 1, f.day)?;
    let time = NaiveTime::from_hms_opt(f.hour, f.minute, f.second)?;
    let offset = FixedOffset::east_opt(offset_seconds(f.offset)?)?;

    let timestamp = offset
        .from_local_datetime(&date.and_time(time))
        .single()?
        .timestamp();

    (timestamp > 0).then_some(timestamp)
}

/// Convert a `±HHMM` offset into seconds east of UTC
fn offset_seconds(raw: i64) -> Option<i32> {
    let magnitude = raw.abs();
    let (hours, minutes) = (magnitude / 100, magnitude % 100);
    if minutes >= 60 {
        return None;
    }
    let seconds = hours * SECS_PER_HOUR + minutes * SECS_PER_MINUTE;
    i32::try_from(raw.signum() * seconds).ok()
}

fn approximate_timestamp(f: &PubDateFields) -> i64 {
    i64::from(f.second)
        + SECS_PER_MINUTE * i64::from(f.minute)
        + SECS_PER_HOUR * i64::from(f.hour)
        + SECS_PER_DAY * i64::from(f.day)
        + SECS_PER_MONTH * i64::from(f.month)
        + SECS_PER_YEAR * (i64::from(f.year) - EPOCH_YEAR)
}

/// Minimal fixed-width field scanner
struct Scanner<'a> {
    rest: &'a str,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self { rest: input }
    }

    fn skip_whitespace(&mut self) {
        self.rest = self.rest.trim_start();
    }

    /// Up to `max` non-whitespace characters
    fn word(&mut self, max: usize) -> Option<&'a str> {
        self.skip_whitespace();
        let end = self
            .rest
            .char_indices()
            .take(max)
            .take_while(|(_, c)| !c.is_whitespace())
            .last()
            .map(|(i, c)| i + c.len_utf8())?;
        let (word, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(word)
    }

    fn literal(&mut self, expected: char) -> Option<()> {
        self.rest = self.rest.strip_prefix(expected)?;
        Some(())
    }

    fn unsigned(&mut self, width: usize) -> Option<u32> {
        self.skip_whitespace();
        let digits = self.take_digits(width)?;
        digits.parse().ok()
    }

    fn signed(&mut self, width: usize) -> Option<i64> {
        self.skip_whitespace();
        let negative = match self.rest.as_bytes().first() {
            Some(b'-') => true,
            Some(b'+') => false,
            _ => return self.take_digits(width)?.parse().ok(),
        };
        let after_sign = &self.rest[1..];
        let before = self.rest;
        self.rest = after_sign;
        match self.take_digits(width - 1).and_then(|d| d.parse::<i64>().ok()) {
            Some(value) => Some(if negative { -value } else { value }),
            None => {
                self.rest = before;
                None
            }
        }
    }

    fn take_digits(&mut self, width: usize) -> Option<&'a str> {
        let len = self
            .rest
            .bytes()
            .take(width)
            .take_while(u8::is_ascii_digit)
            .count();
        if len == 0 {
            return None;
        }
        let (digits, rest) = self.rest.split_at(len);
        self.rest = rest;
        Some(digits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rss_date_with_negative_offset() {
        let parsed = parse_pub_date_detailed("Thu, 19 Jun 2008 15:51:25 -1100");

        assert_eq!(parsed.precision, Precision::Exact);
        assert_eq!(
            parsed.fields,
            PubDateFields {
                day: 19,
                month: 5,
                year: 2008,
                hour: 15,
                minute: 51,
                second: 25,
                offset: -1100,
            }
        );
        // 2008-06-19T15:51:25-11:00 == 2008-06-20T02:51:25Z
        assert_eq!(parsed.timestamp, 1_213_930_285);
    }

    #[test]
    fn positive_offset_moves_backwards_to_utc() {
        assert_eq!(parse_pub_date("Sun, 10 Mar 2024 14:30:00 +0230"), 1_710_072_000);
        assert_eq!(parse_pub_date("Sun, 10 Mar 2024 12:00:00 +0000"), 1_710_072_000);
    }

    #[test]
    fn named_zone_is_treated_as_utc() {
        // The offset field does not scan, so it stays zero
        let parsed = parse_pub_date_detailed("Mon, 01 Jan 2024 00:00:00 GMT");
        assert_eq!(parsed.precision, Precision::Exact);
        assert_eq!(parsed.timestamp, 1_704_067_200);
    }

    #[test]
    fn garbage_uses_approximate_path() {
        let parsed = parse_pub_date_detailed("definitely not a date");

        assert_eq!(parsed.precision, Precision::Approximate);
        assert_eq!(parsed.fields, PubDateFields::default());
        assert_eq!(parsed.timestamp, -1970 * SECS_PER_YEAR);
    }

    #[test]
    fn empty_input_does_not_panic() {
        let parsed = parse_pub_date_detailed("");
        assert_eq!(parsed.precision, Precision::Approximate);
    }

    #[test]
    fn impossible_date_uses_fixed_unit_arithmetic() {
        let parsed = parse_pub_date_detailed("Mon, 31 Feb 2024 10:00:00 +0000");

        assert_eq!(parsed.precision, Precision::Approximate);
        assert_eq!(parsed.timestamp, 1_708_250_400);
    }

    #[test]
    fn partial_scan_keeps_earlier_fields() {
        let fields = scan_fields("Sat, 09 Mar 2024 08");
        assert_eq!(fields.day, 9);
        assert_eq!(fields.month, 2);
        assert_eq!(fields.year, 2024);
        assert_eq!(fields.hour, 8);
        assert_eq!(fields.minute, 0);
    }

    #[test]
    fn missing_weekday_stops_scanning() {
        assert_eq!(scan_fields("09 Mar 2024 08:00:00 +0000"), PubDateFields::default());
    }

    #[test]
    fn month_lookup_is_exact() {
        assert_eq!(month_index("Jan"), 0);
        assert_eq!(month_index("Jun"), 5);
        assert_eq!(month_index("Dec"), 11);
        assert_eq!(month_index("jun"), 0);
        assert_eq!(month_index("Foo"), 0);
    }

    #[test]
    fn single_digit_day_and_surrounding_whitespace() {
        assert_eq!(
            parse_pub_date("  Sat,  9 Mar 2024 08:00:00 +0000\n"),
            1_709_971_200
        );
    }
}
