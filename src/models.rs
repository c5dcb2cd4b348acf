use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub location: String,
    pub custom_map_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Position {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub needed: i32,
    pub filled: i32,
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    pub fn is_understaffed(&self) -> bool {
        self.filled < self.needed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Signup {
    pub id: Uuid,
    pub position_id: Uuid,
    pub volunteer_name: String,
    pub phone_number: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub arrived: bool,
    pub organization: Option<String>,
    pub other_notes: Option<String>,
}

impl Signup {
    /// Minutes since midnight of the shift end; the date part is ignored.
    pub fn end_minutes(&self) -> i64 {
        minutes_of_day(&self.end_time)
    }
}

pub fn minutes_of_day(at: &NaiveDateTime) -> i64 {
    i64::from(at.hour()) * 60 + i64::from(at.minute())
}

const SHIFT_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Accepts `YYYY-MM-DD HH:MM[:SS]` with either a space or `T` separator.
pub fn parse_shift_time(value: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    let value = value.trim();
    match SHIFT_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
    {
        Some(parsed) => Ok(parsed),
        None => NaiveDateTime::parse_from_str(value, SHIFT_TIME_FORMATS[3]),
    }
}

/// Unvalidated assignment input as it arrives from a form or an import row.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssignmentDraft {
    pub position_id: Option<Uuid>,
    pub volunteer_name: Option<String>,
    pub phone_number: Option<String>,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub organization: Option<String>,
    pub other_notes: Option<String>,
}

/// A validated assignment, ready to insert. New signups never start arrived.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSignup {
    pub position_id: Uuid,
    pub volunteer_name: String,
    pub phone_number: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub organization: Option<String>,
    pub other_notes: Option<String>,
}

/// Partial update for a signup row. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignupPatch {
    pub position_id: Option<Uuid>,
    pub volunteer_name: Option<String>,
    pub phone_number: Option<String>,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub organization: Option<String>,
    pub other_notes: Option<String>,
}

impl SignupPatch {
    pub fn apply(&self, signup: &mut Signup) {
        if let Some(position_id) = self.position_id {
            signup.position_id = position_id;
        }
        if let Some(name) = &self.volunteer_name {
            signup.volunteer_name = name.clone();
        }
        if let Some(phone) = &self.phone_number {
            signup.phone_number = phone.clone();
        }
        if let Some(start) = self.start_time {
            signup.start_time = start;
        }
        if let Some(end) = self.end_time {
            signup.end_time = end;
        }
        if let Some(organization) = &self.organization {
            signup.organization = Some(organization.clone());
        }
        if let Some(notes) = &self.other_notes {
            signup.other_notes = Some(notes.clone());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    InProgress,
    Resolved,
    Ignored,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::InProgress => "in_progress",
            MessageStatus::Resolved => "resolved",
            MessageStatus::Ignored => "ignored",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, MessageStatus::Pending | MessageStatus::InProgress)
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "pending" => Ok(MessageStatus::Pending),
            "in_progress" => Ok(MessageStatus::InProgress),
            "resolved" => Ok(MessageStatus::Resolved),
            "ignored" => Ok(MessageStatus::Ignored),
            other => Err(format!("unknown message status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub volunteer_id: Option<Uuid>,
    pub phone_number: Option<String>,
    pub status: MessageStatus,
    pub position_id: Uuid,
    pub event_id: Uuid,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutOutcome {
    CheckedOut,
    /// Row flipped to not arrived, but the decrement call failed.
    CounterFailed(String),
    UpdateFailed(String),
}

impl CheckoutOutcome {
    /// Whether the signup row itself was checked out.
    pub fn row_updated(&self) -> bool {
        !matches!(self, CheckoutOutcome::UpdateFailed(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutResult {
    pub signup_id: Uuid,
    pub position_id: Uuid,
    pub outcome: CheckoutOutcome,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepSummary {
    pub checked_out: usize,
    pub counter_failures: usize,
    pub update_failures: usize,
    pub results: Vec<CheckoutResult>,
}

impl SweepSummary {
    pub fn from_results(results: Vec<CheckoutResult>) -> Self {
        let mut summary = SweepSummary::default();
        for result in &results {
            match result.outcome {
                CheckoutOutcome::CheckedOut => summary.checked_out += 1,
                CheckoutOutcome::CounterFailed(_) => summary.counter_failures += 1,
                CheckoutOutcome::UpdateFailed(_) => summary.update_failures += 1,
            }
        }
        summary.results = results;
        summary
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn any_row_updated(&self) -> bool {
        self.results.iter().any(|result| result.outcome.row_updated())
    }
}

#[derive(Debug, Clone)]
pub struct PositionStaffing {
    pub position_name: String,
    pub needed: i32,
    pub filled: i32,
    pub assigned: usize,
    pub arrived: usize,
}

impl PositionStaffing {
    /// Difference between the stored counter and the count of arrived volunteers.
    pub fn drift(&self) -> i64 {
        i64::from(self.filled) - self.arrived as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19)
            .and_then(|date| date.and_hms_opt(hour, minute, 0))
            .unwrap()
    }

    #[test]
    fn minutes_of_day_ignores_date_and_seconds() {
        assert_eq!(minutes_of_day(&at(0, 0)), 0);
        assert_eq!(minutes_of_day(&at(13, 45)), 13 * 60 + 45);
    }

    #[test]
    fn shift_times_accept_common_layouts() {
        assert_eq!(parse_shift_time("2026-10-19 13:45").unwrap(), at(13, 45));
        assert_eq!(parse_shift_time("2026-10-19T13:45").unwrap(), at(13, 45));
        assert_eq!(parse_shift_time(" 2026-10-19T13:45:00 ").unwrap(), at(13, 45));
        assert!(parse_shift_time("13:45").is_err());
    }

    #[test]
    fn message_status_parses_loose_spellings() {
        assert_eq!("in-progress".parse::<MessageStatus>(), Ok(MessageStatus::InProgress));
        assert_eq!("Resolved".parse::<MessageStatus>(), Ok(MessageStatus::Resolved));
        assert!("archived".parse::<MessageStatus>().is_err());
        assert!(MessageStatus::Pending.is_open());
        assert!(!MessageStatus::Ignored.is_open());
    }

    #[test]
    fn patch_only_touches_present_fields() {
        let mut signup = Signup {
            id: Uuid::new_v4(),
            position_id: Uuid::new_v4(),
            volunteer_name: "Avery Lee".to_string(),
            phone_number: "555-0100".to_string(),
            start_time: at(9, 0),
            end_time: at(12, 0),
            arrived: true,
            organization: None,
            other_notes: None,
        };
        let patch = SignupPatch {
            phone_number: Some("555-0199".to_string()),
            end_time: Some(at(13, 0)),
            ..SignupPatch::default()
        };
        patch.apply(&mut signup);
        assert_eq!(signup.phone_number, "555-0199");
        assert_eq!(signup.end_time, at(13, 0));
        assert_eq!(signup.volunteer_name, "Avery Lee");
        assert!(signup.arrived);
    }

    #[test]
    fn summary_counts_each_outcome() {
        let results = vec![
            CheckoutResult {
                signup_id: Uuid::new_v4(),
                position_id: Uuid::new_v4(),
                outcome: CheckoutOutcome::CheckedOut,
            },
            CheckoutResult {
                signup_id: Uuid::new_v4(),
                position_id: Uuid::new_v4(),
                outcome: CheckoutOutcome::UpdateFailed("offline".to_string()),
            },
        ];
        let summary = SweepSummary::from_results(results);
        assert_eq!(summary.checked_out, 1);
        assert_eq!(summary.update_failures, 1);
        assert!(summary.any_row_updated());
    }
}
