//! Deserializers that normalize what the remote API and older local data
//! send: numeric ids become strings, and date-like values (RFC 3339, naive
//! datetimes from form inputs, plain dates, epoch milliseconds) become
//! `chrono` values.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{de::Error, Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Text(s) => s,
            RawId::Signed(n) => n.to_string(),
            RawId::Unsigned(n) => n.to_string(),
            RawId::Float(n) if n.fract() == 0.0 => format!("{}", n as i64),
            RawId::Float(n) => n.to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDate {
    Text(String),
    Millis(i64),
}

pub fn string_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawId::deserialize(deserializer).map(RawId::into_string)
}

pub fn option_string_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RawId>::deserialize(deserializer)?
        .map(RawId::into_string)
        .filter(|id| !id.is_empty()))
}

pub fn datetime<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = RawDate::deserialize(deserializer)?;
    from_raw(&raw).ok_or_else(|| D::Error::custom("unrecognized date-time value"))
}

pub fn option_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawDate>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawDate::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(raw) => from_raw(&raw)
            .map(Some)
            .ok_or_else(|| D::Error::custom("unrecognized date-time value")),
    }
}

pub fn option_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawDate>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawDate::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(RawDate::Text(s)) => parse_date(&s)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("unrecognized date value: {}", s))),
        Some(raw @ RawDate::Millis(_)) => from_raw(&raw)
            .map(|dt| Some(dt.date_naive()))
            .ok_or_else(|| D::Error::custom("unrecognized date value")),
    }
}

fn from_raw(raw: &RawDate) -> Option<DateTime<Utc>> {
    match raw {
        RawDate::Text(s) => parse_datetime(s),
        RawDate::Millis(ms) => Utc.timestamp_millis_opt(*ms).single(),
    }
}

/// Naive values carry no offset and are read as UTC.
pub fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .ok()
        .or_else(|| parse_datetime(value).map(|dt| dt.date_naive()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(deserialize_with = "string_id")]
        id: String,
        #[serde(deserialize_with = "datetime")]
        at: DateTime<Utc>,
        #[serde(default, deserialize_with = "option_date")]
        born: Option<NaiveDate>,
    }

    #[test]
    fn test_numeric_ids_become_strings() {
        let probe: Probe = serde_json::from_value(json!({
            "id": 1718000000123u64,
            "at": "2024-06-10T09:30:00Z"
        }))
        .unwrap();

        assert_eq!(probe.id, "1718000000123");
        assert!(probe.born.is_none());
    }

    #[test]
    fn test_form_style_datetime_is_read_as_utc() {
        let probe: Probe = serde_json::from_value(json!({
            "id": "a1",
            "at": "2024-06-10T14:00",
            "born": "1990-03-15T00:00:00.000Z"
        }))
        .unwrap();

        assert_eq!(probe.at.hour(), 14);
        assert_eq!(probe.born.map(|d| d.month()), Some(3));
    }

    #[test]
    fn test_epoch_millis_are_accepted() {
        let probe: Probe = serde_json::from_value(json!({
            "id": "a1",
            "at": 0
        }))
        .unwrap();

        assert_eq!(probe.at.year(), 1970);
    }

    #[test]
    fn test_garbage_date_is_rejected() {
        let result = serde_json::from_value::<Probe>(json!({
            "id": "a1",
            "at": "next tuesday"
        }));

        assert!(result.is_err());
    }
}
