use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A reminder as stored at `reminders/{identity}/{reminder_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub text: String,
    /// Event time. RFC 3339, or civil time in the reminder timezone when no offset is given.
    #[serde(rename = "timeISO")]
    pub time_iso: String,
    #[serde(default)]
    pub morning: bool,
    #[serde(default)]
    pub one_hour: bool,
    #[serde(default)]
    pub morning_sent: bool,
    #[serde(default)]
    pub one_hour_sent: bool,
    #[serde(default)]
    pub exact_sent: bool,
}

/// Binding between an identity and a LINE user, stored at `links/{identity}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRecord {
    pub external_user_id: String,
    /// Informational only. Unreadable values are dropped rather than failing the record.
    #[serde(default, deserialize_with = "deserialize_linked_at")]
    pub linked_at: Option<DateTime<Utc>>,
}

/// Accepts an RFC 3339 string or epoch milliseconds (`Date.now()`, server timestamps).
fn deserialize_linked_at<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(value)) => DateTime::parse_from_rfc3339(value.trim())
            .ok()
            .map(|parsed| parsed.with_timezone(&Utc)),
        Some(Value::Number(value)) => value.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    })
}

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

pub fn parse_event_time(value: &str, timezone: Tz) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    NAIVE_FORMATS.iter().find_map(|format| {
        let naive = NaiveDateTime::parse_from_str(value, format).ok()?;
        timezone
            .from_local_datetime(&naive)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
    })
}
