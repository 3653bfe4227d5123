//! Fixed-zone date handling.
//!
//! Due dates are exchanged as ISO-8601 strings with an explicit `+09:00`
//! offset, independent of the machine's timezone. The backend may answer
//! with offset-less timestamps; those are read as wall time in the same
//! fixed zone.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, SecondsFormat, TimeZone, Utc};

/// Offset of the fixed zone, in seconds east of UTC.
pub const ZONE_OFFSET_SECS: i32 = 9 * 3600;

pub fn zone() -> FixedOffset {
    FixedOffset::east_opt(ZONE_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Current wall time in the fixed zone.
pub fn now_local() -> NaiveDateTime {
    Utc::now().with_timezone(&zone()).naive_local()
}

/// Attach the fixed offset to a wall-clock value.
pub fn to_zoned(naive: NaiveDateTime) -> DateTime<FixedOffset> {
    let zone = zone();
    zone.from_local_datetime(&naive)
        .single()
        .unwrap_or_else(|| DateTime::from_naive_utc_and_offset(naive - zone_delta(), zone))
}

fn zone_delta() -> chrono::TimeDelta {
    chrono::TimeDelta::seconds(i64::from(ZONE_OFFSET_SECS))
}

/// `YYYY-MM-DDTHH:MM:SS+09:00`
pub fn format_iso(dt: &DateTime<FixedOffset>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Parse an RFC 3339 timestamp, or an offset-less one as fixed-zone wall time.
pub fn parse_flexible(s: &str) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&zone()));
    }
    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
    ];
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(to_zoned(naive));
        }
    }
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| to_zoned(d.and_time(chrono::NaiveTime::MIN)))
}

/// serde adapter for `Option<DateTime<FixedOffset>>` fields.
pub mod option {
    use chrono::{DateTime, FixedOffset};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(
        value: &Option<DateTime<FixedOffset>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_str(&super::format_iso(dt)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<FixedOffset>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => super::parse_flexible(&s)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid datetime: {}", s))),
        }
    }
}
