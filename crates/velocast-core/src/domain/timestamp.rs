use std::fmt::{Display, Formatter};

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::well_known::Rfc3339;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use crate::ValidationError;

/// Offsets written without a colon (`+0000`), as the tracker emits them.
const COMPACT_OFFSET_FRACTIONAL: &[FormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond][offset_hour sign:mandatory][offset_minute]"
);
const COMPACT_OFFSET: &[FormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second][offset_hour sign:mandatory][offset_minute]"
);

/// Timestamp normalized to UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtcDateTime(OffsetDateTime);

impl UtcDateTime {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    /// Parse RFC 3339 or the tracker's compact-offset form, converting to UTC.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        OffsetDateTime::parse(trimmed, &Rfc3339)
            .or_else(|_| OffsetDateTime::parse(trimmed, COMPACT_OFFSET_FRACTIONAL))
            .or_else(|_| OffsetDateTime::parse(trimmed, COMPACT_OFFSET))
            .map(Self::from_offset_datetime)
            .map_err(|_| ValidationError::InvalidTimestamp {
                value: input.to_owned(),
            })
    }

    /// Lenient variant for optional record fields: anything unparseable is absent.
    pub fn parse_optional(input: Option<&str>) -> Option<Self> {
        let value = input?;
        match Self::parse(value) {
            Ok(parsed) => Some(parsed),
            Err(error) => {
                tracing::debug!(%error, "ignoring unparseable timestamp");
                None
            }
        }
    }

    pub fn from_offset_datetime(value: OffsetDateTime) -> Self {
        Self(value.to_offset(UtcOffset::UTC))
    }

    pub fn into_inner(self) -> OffsetDateTime {
        self.0
    }

    /// Fractional days elapsed from `self` to `later`.
    pub fn days_until(self, later: Self) -> f64 {
        (later.0 - self.0).as_seconds_f64() / 86_400.0
    }

    pub fn format_rfc3339(self) -> String {
        self.0
            .format(&Rfc3339)
            .unwrap_or_else(|_| String::from("<unformattable>"))
    }
}

impl Display for UtcDateTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_rfc3339())
    }
}

impl Serialize for UtcDateTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.format_rfc3339())
    }
}

impl<'de> Deserialize<'de> for UtcDateTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_utc_timestamp_with_millis() {
        let parsed = UtcDateTime::parse("2024-01-15T09:00:00.000Z").expect("must parse");
        assert_eq!(parsed.format_rfc3339(), "2024-01-15T09:00:00Z");
    }

    #[test]
    fn normalizes_offsets_to_utc() {
        let compact = UtcDateTime::parse("2024-01-15T11:00:00.000+0200").expect("compact offset");
        let colon = UtcDateTime::parse("2024-01-15T11:00:00+02:00").expect("rfc3339 offset");
        let zero = UtcDateTime::parse("2024-01-15T09:00:00+0000").expect("compact zero");

        assert_eq!(compact.format_rfc3339(), "2024-01-15T09:00:00Z");
        assert_eq!(compact, colon);
        assert_eq!(compact, zero);
    }

    #[test]
    fn rejects_garbage() {
        let err = UtcDateTime::parse("last tuesday").expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidTimestamp { .. }));
        assert_eq!(UtcDateTime::parse_optional(Some("last tuesday")), None);
        assert_eq!(UtcDateTime::parse_optional(None), None);
    }

    #[test]
    fn counts_fractional_days() {
        let start = UtcDateTime::parse("2024-01-01T00:00:00Z").expect("start");
        let end = UtcDateTime::parse("2024-01-15T12:00:00Z").expect("end");
        assert!((start.days_until(end) - 14.5).abs() < f64::EPSILON);
    }
}
