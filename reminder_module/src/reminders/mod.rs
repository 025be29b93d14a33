mod evaluator;
mod trigger;
mod types;

pub use evaluator::{
    evaluate_reminder, EvaluationError, ReminderEvaluator, TickReport, LINKS_ROOT, REMINDERS_ROOT,
};
pub use trigger::{TriggerKind, EXACT_WINDOW_MINUTES, MORNING_HOUR, ONE_HOUR_LEAD_MINUTES};
pub use types::{parse_event_time, LinkRecord, Reminder};
