//! `General/schedule_reminder_action`: a Telegram reminder at a given time.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::{ProviderContext, GENERAL};
use crate::capabilities::{
    formatter, Action, ActionError, CapabilityEntry, CapabilityRegistry, Describe, FieldSpec,
    PerCallAction, TypeTag,
};
use crate::scheduler::{Notification, ScheduledTaskManager};

pub const OPERATION: &str = "schedule_reminder_action";

/// Naive layouts accepted when the datetime carries no offset.
const LOCAL_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderRequest {
    pub reminder_text: String,
    pub reminder_datetime: String,
    pub telegram_user_id: i64,
}

impl Describe for ReminderRequest {
    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::new("reminder_text", TypeTag::String).describe("Text of the reminder"),
            FieldSpec::new("reminder_datetime", TypeTag::String)
                .describe("When to remind, ISO-8601; local time if no offset is given"),
            FieldSpec::new("telegram_user_id", TypeTag::Integer)
                .describe("Telegram chat id that receives the reminder"),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledReminder {
    /// The requested fire time, as given.
    pub reminder_datetime: String,
}

impl Describe for ScheduledReminder {
    fn fields() -> Vec<FieldSpec> {
        vec![FieldSpec::new("reminder_datetime", TypeTag::String)
            .describe("Time the reminder was scheduled for")]
    }
}

pub struct ScheduleReminderAction {
    scheduler: Arc<ScheduledTaskManager>,
}

impl ScheduleReminderAction {
    pub fn new(scheduler: Arc<ScheduledTaskManager>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl Action for ScheduleReminderAction {
    type Input = ReminderRequest;
    type Output = ScheduledReminder;

    async fn execute(&self, input: ReminderRequest) -> Result<ScheduledReminder, ActionError> {
        let fire_at = parse_reminder_datetime(&input.reminder_datetime)?;

        let handle = self.scheduler.schedule(
            fire_at.with_timezone(&Utc),
            Notification {
                destination: input.telegram_user_id.to_string(),
                text: input.reminder_text.clone(),
            },
        );
        log::info!(
            "reminder {} scheduled for {} (user {})",
            handle.id(),
            fire_at,
            input.telegram_user_id
        );

        Ok(ScheduledReminder {
            reminder_datetime: input.reminder_datetime,
        })
    }
}

/// Parse an ISO-8601 datetime. Values without an offset are local time.
pub fn parse_reminder_datetime(raw: &str) -> Result<DateTime<FixedOffset>, ActionError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt);
    }

    LOCAL_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|local| local.with_timezone(local.offset()))
        .ok_or_else(|| ActionError::InvalidArgument(format!("unrecognized datetime '{}'", raw)))
}

fn render(reminder: &ScheduledReminder) -> String {
    let date = parse_reminder_datetime(&reminder.reminder_datetime)
        .map(|dt| dt.format("%c").to_string())
        .unwrap_or_else(|_| reminder.reminder_datetime.clone());
    format!("<i>Scheduled reminder ✅</i>\n📅 {}", date)
}

pub fn register(registry: &mut CapabilityRegistry, ctx: &ProviderContext) {
    let scheduler = Arc::clone(&ctx.scheduler);
    let executor = Arc::new(PerCallAction::new(move || {
        ScheduleReminderAction::new(Arc::clone(&scheduler))
    }));
    let entry = CapabilityEntry::new(OPERATION, executor, Some(formatter(render)))
        .with_description("Schedule a Telegram reminder for a given date and time");
    registry.insert(GENERAL, OPERATION, entry);
}
