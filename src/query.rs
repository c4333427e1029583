use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveDateTime, Utc};
use compact_str::CompactString;

// Source: https://github.com/mediawiki-utilities/python-mwtypes/blob/523a93f98fe1372938fc15872b5abb1f267cc643/mwtypes/timestamp.py#L12
const TIMESTAMP_FORMAT_LONG: &str = "%Y-%m-%dT%H:%M:%SZ";
const TIMESTAMP_FORMAT_SHORT: &str = "%Y%m%d%H%M%S";

/// Parse a MediaWiki timestamp, either `20221201000000` or `2022-12-01T00:00:00Z`.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    // chrono accepts single digit fields, the wire formats are fixed width
    let format = if has_shape(text, "dddddddddddddd") {
        TIMESTAMP_FORMAT_SHORT
    } else if has_shape(text, "dddd-dd-ddTdd:dd:ddZ") {
        TIMESTAMP_FORMAT_LONG
    } else {
        return None;
    };

    NaiveDateTime::parse_from_str(text, format)
        .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc))
        .ok()
}

/// `d` in `shape` stands for an ASCII digit, every other byte has to match exactly.
fn has_shape(text: &str, shape: &str) -> bool {
    text.len() == shape.len()
        && text
            .bytes()
            .zip(shape.bytes())
            .all(|(byte, expected)| match expected {
                b'd' => byte.is_ascii_digit(),
                _ => byte == expected,
            })
}

/// Format a point in time the way the API expects it in `rvstart`/`ucstart` and friends.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(TIMESTAMP_FORMAT_LONG).to_string()
}

/// A possibly partial point in time as supplied by a caller, e.g. only a year and a month.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DateParts {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub hour: Option<u32>,
    pub minute: Option<u32>,
    pub second: Option<u32>,
}

impl DateParts {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// The earliest instant consistent with the supplied components.
    ///
    /// `Ok(None)` if no year is given, finer components are ignored in that case.
    pub fn earliest(&self) -> Result<Option<DateTime<Utc>>, QueryError> {
        let Some(year) = self.year_or_warn("start") else {
            return Ok(None);
        };

        NaiveDate::from_ymd_opt(year, self.month.unwrap_or(1), self.day.unwrap_or(1))
            .and_then(|date| {
                date.and_hms_opt(
                    self.hour.unwrap_or(0),
                    self.minute.unwrap_or(0),
                    self.second.unwrap_or(0),
                )
            })
            .map(|dt| Some(dt.and_utc()))
            .ok_or(QueryError::InvalidDate {
                bound: "start",
                parts: *self,
            })
    }

    /// The latest instant consistent with the supplied components.
    ///
    /// Omitted components take their maximum, so `2022-12` ends at `2022-12-31T23:59:59`.
    pub fn latest(&self) -> Result<Option<DateTime<Utc>>, QueryError> {
        let Some(year) = self.year_or_warn("end") else {
            return Ok(None);
        };

        let month = self.month.unwrap_or(12);
        let day = match self.day {
            Some(day) => Some(day),
            None => last_day_of_month(year, month),
        };

        day.and_then(|day| NaiveDate::from_ymd_opt(year, month, day))
            .and_then(|date| {
                date.and_hms_opt(
                    self.hour.unwrap_or(23),
                    self.minute.unwrap_or(59),
                    self.second.unwrap_or(59),
                )
            })
            .map(|dt| Some(dt.and_utc()))
            .ok_or(QueryError::InvalidDate {
                bound: "end",
                parts: *self,
            })
    }

    fn year_or_warn(&self, bound: &'static str) -> Option<i32> {
        if self.year.is_none() && !self.is_empty() {
            tracing::warn!(
                message = "Ignoring date components without a year",
                bound,
                parts = ?self
            );
        }
        self.year
    }
}

fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    NaiveDate::from_ymd_opt(year, month, 1)?
        .checked_add_months(Months::new(1))?
        .pred_opt()
        .map(|date| date.day())
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("invalid {bound} date: {parts:?}")]
    InvalidDate {
        bound: &'static str,
        parts: DateParts,
    },
    #[error("start of the date range ({start}) is after its end ({end})")]
    InvertedRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Everything that describes one history request.
///
/// Which of `titles` and `user` names the subject depends on the kind of history that is fetched,
/// the other one acts as an additional filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuerySpec {
    pub titles: Option<CompactString>,
    pub user: Option<CompactString>,
    pub keyword: Option<String>,
    pub tags: BTreeSet<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl QuerySpec {
    pub fn new(start: &DateParts, end: &DateParts) -> Result<Self, QueryError> {
        let start = start.earliest()?;
        let end = end.latest()?;

        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(QueryError::InvertedRange { start, end });
            }
        }

        Ok(Self {
            start,
            end,
            ..Self::default()
        })
    }

    pub fn with_titles(mut self, titles: impl Into<CompactString>) -> Self {
        self.titles = Some(titles.into());
        self
    }

    pub fn with_user(mut self, user: impl Into<CompactString>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// An empty keyword matches everything and is dropped.
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        let keyword = keyword.into();
        self.keyword = if keyword.is_empty() {
            None
        } else {
            Some(keyword)
        };
        self
    }

    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }
}
