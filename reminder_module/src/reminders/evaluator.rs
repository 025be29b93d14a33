use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::document_store::{DocumentStore, StoreError};
use crate::gateway::MessagingGateway;
use crate::link_registry::LinkRegistry;

use super::trigger::TriggerKind;
use super::types::{parse_event_time, LinkRecord, Reminder};

pub const REMINDERS_ROOT: &str = "reminders";
pub const LINKS_ROOT: &str = "links";

#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("malformed record at {path}: {reason}")]
    MalformedRecord { path: String, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub pending_links_swept: usize,
    pub identities_evaluated: usize,
    pub identities_failed: usize,
    pub reminders_evaluated: usize,
    pub malformed_records: usize,
    pub notifications_sent: usize,
    pub flag_write_failures: usize,
}

impl TickReport {
    fn has_activity(&self) -> bool {
        self.pending_links_swept > 0
            || self.identities_failed > 0
            || self.malformed_records > 0
            || self.notifications_sent > 0
            || self.flag_write_failures > 0
    }
}

/// Triggers that should fire for `reminder` at `now`.
pub fn evaluate_reminder(
    reminder: &Reminder,
    event_time: DateTime<Utc>,
    now: DateTime<Utc>,
    timezone: Tz,
) -> Vec<TriggerKind> {
    TriggerKind::ALL
        .into_iter()
        .filter(|kind| kind.is_enabled(reminder) && kind.is_due(event_time, now, timezone))
        .collect()
}

pub struct ReminderEvaluator {
    store: Arc<dyn DocumentStore>,
    gateway: Arc<dyn MessagingGateway>,
    registry: Arc<LinkRegistry>,
    clock: Arc<dyn Clock>,
    timezone: Tz,
}

impl ReminderEvaluator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        gateway: Arc<dyn MessagingGateway>,
        registry: Arc<LinkRegistry>,
        clock: Arc<dyn Clock>,
        timezone: Tz,
    ) -> Self {
        Self {
            store,
            gateway,
            registry,
            clock,
            timezone,
        }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// One sweep over every linked identity's reminders.
    ///
    /// Only a failure to load the reminder or link snapshot fails the tick;
    /// everything per identity or per reminder is logged and counted.
    pub fn tick(&self) -> Result<TickReport, EvaluationError> {
        let now = self.clock.now();
        let mut report = TickReport {
            pending_links_swept: self.registry.sweep_expired(now),
            ..TickReport::default()
        };

        let local_now = now.with_timezone(&self.timezone);
        debug!("reminder tick at {}", local_now.to_rfc3339());

        let reminders = self.store.get(REMINDERS_ROOT)?;
        let links = self.store.get(LINKS_ROOT)?;
        let (Some(reminders), Some(links)) = (reminders, links) else {
            return Ok(report);
        };
        let Value::Object(reminders) = reminders else {
            return Err(EvaluationError::MalformedRecord {
                path: REMINDERS_ROOT.to_string(),
                reason: "expected an object".to_string(),
            });
        };
        let Value::Object(links) = links else {
            return Err(EvaluationError::MalformedRecord {
                path: LINKS_ROOT.to_string(),
                reason: "expected an object".to_string(),
            });
        };

        for (identity, identity_reminders) in &reminders {
            let Some(link) = links.get(identity) else {
                continue;
            };
            report.identities_evaluated += 1;
            if let Err(err) =
                self.evaluate_identity(identity, identity_reminders, link, now, &mut report)
            {
                report.identities_failed += 1;
                warn!("skipping reminders for {}: {}", identity, err);
            }
        }

        if report.has_activity() {
            info!(
                "reminder tick done: sent={} identities={} reminders={} malformed={} failed_identities={} flag_write_failures={} swept_links={}",
                report.notifications_sent,
                report.identities_evaluated,
                report.reminders_evaluated,
                report.malformed_records,
                report.identities_failed,
                report.flag_write_failures,
                report.pending_links_swept
            );
        }
        Ok(report)
    }

    fn evaluate_identity(
        &self,
        identity: &str,
        reminders: &Value,
        link: &Value,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) -> Result<(), EvaluationError> {
        let link: LinkRecord = serde_json::from_value(link.clone()).map_err(|err| {
            EvaluationError::MalformedRecord {
                path: format!("{}/{}", LINKS_ROOT, identity),
                reason: err.to_string(),
            }
        })?;
        let Value::Object(reminders) = reminders else {
            return Err(EvaluationError::MalformedRecord {
                path: format!("{}/{}", REMINDERS_ROOT, identity),
                reason: "expected an object of reminders".to_string(),
            });
        };

        for (reminder_id, raw) in reminders {
            let path = format!("{}/{}/{}", REMINDERS_ROOT, identity, reminder_id);
            let mut reminder: Reminder = match serde_json::from_value(raw.clone()) {
                Ok(reminder) => reminder,
                Err(err) => {
                    report.malformed_records += 1;
                    warn!("skipping malformed reminder {}: {}", path, err);
                    continue;
                }
            };
            let Some(event_time) = parse_event_time(&reminder.time_iso, self.timezone) else {
                report.malformed_records += 1;
                warn!(
                    "skipping reminder {} with unparseable time {:?}",
                    path, reminder.time_iso
                );
                continue;
            };
            report.reminders_evaluated += 1;

            for kind in evaluate_reminder(&reminder, event_time, now, self.timezone) {
                self.gateway
                    .push(&link.external_user_id, &kind.message(&reminder.text));
                kind.mark_sent(&mut reminder);
                report.notifications_sent += 1;

                let mut fields = Map::new();
                fields.insert(kind.sent_field().to_string(), Value::Bool(true));
                if let Err(err) = self.store.update(&path, &fields) {
                    report.flag_write_failures += 1;
                    error!(
                        "failed to persist {} for {}: {}",
                        kind.sent_field(),
                        path,
                        err
                    );
                } else {
                    info!("{} reminder sent for {}", kind.label(), path);
                }
            }
        }
        Ok(())
    }
}
