use chrono::{DateTime, Duration, NaiveTime, Utc};
use chrono_tz::Tz;

use super::types::Reminder;

pub const MORNING_HOUR: u32 = 8;
pub const ONE_HOUR_LEAD_MINUTES: i64 = 60;
/// How long after the event time the exact notification may still go out.
pub const EXACT_WINDOW_MINUTES: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    Morning,
    OneHour,
    Exact,
}

impl TriggerKind {
    pub const ALL: [TriggerKind; 3] = [TriggerKind::Morning, TriggerKind::OneHour, TriggerKind::Exact];

    pub fn label(self) -> &'static str {
        match self {
            TriggerKind::Morning => "morning",
            TriggerKind::OneHour => "one_hour",
            TriggerKind::Exact => "exact",
        }
    }

    /// Store field recording that this trigger already fired.
    pub fn sent_field(self) -> &'static str {
        match self {
            TriggerKind::Morning => "morningSent",
            TriggerKind::OneHour => "oneHourSent",
            TriggerKind::Exact => "exactSent",
        }
    }

    pub fn is_enabled(self, reminder: &Reminder) -> bool {
        match self {
            TriggerKind::Morning => reminder.morning && !reminder.morning_sent,
            TriggerKind::OneHour => reminder.one_hour && !reminder.one_hour_sent,
            TriggerKind::Exact => !reminder.exact_sent,
        }
    }

    pub fn is_due(self, event_time: DateTime<Utc>, now: DateTime<Utc>, timezone: Tz) -> bool {
        match self {
            TriggerKind::Morning => {
                let event_day = event_time.with_timezone(&timezone).date_naive();
                let morning = event_day.and_time(
                    NaiveTime::from_hms_opt(MORNING_HOUR, 0, 0).unwrap_or(NaiveTime::MIN),
                );
                now.with_timezone(&timezone).naive_local() >= morning
            }
            TriggerKind::OneHour => now >= event_time - Duration::minutes(ONE_HOUR_LEAD_MINUTES),
            TriggerKind::Exact => {
                let late_by = now - event_time;
                late_by >= Duration::zero() && late_by < Duration::minutes(EXACT_WINDOW_MINUTES)
            }
        }
    }

    pub fn message(self, text: &str) -> String {
        match self {
            TriggerKind::Morning => format!("🌅 today's plan:\n{}", text),
            TriggerKind::OneHour => format!("⏰ one hour left:\n{}", text),
            TriggerKind::Exact => format!("🔔 time's up:\n{}", text),
        }
    }

    pub fn mark_sent(self, reminder: &mut Reminder) {
        match self {
            TriggerKind::Morning => reminder.morning_sent = true,
            TriggerKind::OneHour => reminder.one_hour_sent = true,
            TriggerKind::Exact => reminder.exact_sent = true,
        }
    }
}
