//! Standard timestamp format for persisted summaries
//!
//! Timestamps are written as `2019/05/23 15:29:19 +0000` and always carry
//! whole seconds.

use chrono::{DateTime, SubsecRound, Utc};

pub const STANDARD_FORMAT: &str = "%Y/%m/%d %H:%M:%S %z";

/// Renders a timestamp in the standard format
pub fn to_standard_format(t: &DateTime<Utc>) -> String {
    t.format(STANDARD_FORMAT).to_string()
}

/// Parses a timestamp written by [`to_standard_format`]
pub fn parse_standard_format(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_str(s, STANDARD_FORMAT).map(|t| t.with_timezone(&Utc))
}

/// Drops sub-second precision, which the standard format cannot carry
pub fn truncate_to_seconds(t: DateTime<Utc>) -> DateTime<Utc> {
    t.trunc_subsecs(0)
}

/// `#[serde(with = "...")]` adapter for the standard format
pub mod serde_standard {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::to_standard_format(t))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_standard_format(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_and_parse() {
        let t = Utc.with_ymd_and_hms(2019, 5, 23, 15, 29, 19).unwrap();
        let s = to_standard_format(&t);
        assert_eq!(s, "2019/05/23 15:29:19 +0000");
        assert_eq!(parse_standard_format(&s).unwrap(), t);
    }

    #[test]
    fn test_parse_with_offset_normalizes_to_utc() {
        let t = parse_standard_format("2019/05/24 00:29:19 +0900").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2019, 5, 23, 15, 29, 19).unwrap());
    }

    #[test]
    fn test_truncate_to_seconds() {
        let t = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 1).unwrap()
            + chrono::Duration::milliseconds(750);
        assert_eq!(
            truncate_to_seconds(t),
            Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 1).unwrap()
        );
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_standard_format("yesterday").is_err());
    }
}
