use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A bookable time-of-day label, canonically formatted as "HH:MM".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SlotLabel(NaiveTime);

impl SlotLabel {
    pub fn parse(s: &str) -> Result<Self, String> {
        let time = NaiveTime::parse_from_str(s, "%H:%M")
            .map_err(|_| format!("invalid time slot '{}', expected HH:MM", s))?;
        Ok(SlotLabel(time))
    }

    pub fn time(&self) -> NaiveTime {
        self.0
    }
}

impl TryFrom<String> for SlotLabel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SlotLabel::parse(&value)
    }
}

impl From<SlotLabel> for String {
    fn from(label: SlotLabel) -> Self {
        label.to_string()
    }
}

impl From<NaiveTime> for SlotLabel {
    fn from(time: NaiveTime) -> Self {
        SlotLabel(time)
    }
}

impl std::fmt::Display for SlotLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

/// The two shapes an availability window can take, stored in one table with a
/// `kind` discriminator column. Columns not used by a shape stay null.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WindowShape {
    Dated {
        date: NaiveDate,
        time_slots: Vec<SlotLabel>,
    },
    Recurring {
        /// 0 = Sunday through 6 = Saturday.
        day_of_week: u8,
        start_time: NaiveTime,
        end_time: NaiveTime,
        is_available: bool,
    },
}

impl WindowShape {
    /// Whether this window makes `slot` bookable on `date`. Dated windows
    /// match on the exact date and slot list; recurring windows match on the
    /// weekday with the slot inside [start_time, end_time).
    pub fn covers(&self, date: NaiveDate, slot: SlotLabel) -> bool {
        match self {
            WindowShape::Dated {
                date: window_date,
                time_slots,
            } => *window_date == date && time_slots.contains(&slot),
            WindowShape::Recurring {
                day_of_week,
                start_time,
                end_time,
                is_available,
            } => {
                *is_available
                    && u32::from(*day_of_week) == date.weekday().num_days_from_sunday()
                    && slot.time() >= *start_time
                    && slot.time() < *end_time
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub id: Uuid,
    pub doctor_id: Uuid,
    #[serde(flatten)]
    pub shape: WindowShape,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public projection of a doctor account. Never includes credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub specialization: Option<String>,
    pub license_number: Option<String>,
}

/// Directory filters. Both are optional; together they narrow the listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoctorSearchQuery {
    /// Case-insensitive substring match on specialization.
    pub specialization: Option<String>,
    /// Case-insensitive substring match on the display name.
    pub name: Option<String>,
}

/// Filters for a doctor's published windows: a single date (dated shape)
/// or a single weekday (recurring shape).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AvailabilityQuery {
    pub date: Option<NaiveDate>,
    pub day_of_week: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PublishWindowRequest {
    Dated {
        date: NaiveDate,
        /// Raw labels, validated and canonicalized before storage.
        time_slots: Vec<String>,
    },
    Recurring {
        day_of_week: u8,
        start_time: NaiveTime,
        end_time: NaiveTime,
        #[serde(default = "default_available")]
        is_available: bool,
    },
}

fn default_available() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableSlotsQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableSlotsResponse {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub slots: Vec<SlotLabel>,
}

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("Not authorized to manage this doctor's availability")]
    NotAuthorized,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_slot_label_parses_and_canonicalizes() {
        let slot = SlotLabel::parse("09:00").unwrap();
        assert_eq!(slot.to_string(), "09:00");

        let slot = SlotLabel::parse("9:05").unwrap();
        assert_eq!(slot.to_string(), "09:05");
    }

    #[test]
    fn test_slot_label_rejects_malformed_input() {
        assert!(SlotLabel::parse("").is_err());
        assert!(SlotLabel::parse("25:00").is_err());
        assert!(SlotLabel::parse("09:60").is_err());
        assert!(SlotLabel::parse("morning").is_err());
        assert!(SlotLabel::parse("09:00:00").is_err());
    }

    #[test]
    fn test_dated_window_covers_only_listed_slots() {
        let shape = WindowShape::Dated {
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            time_slots: vec![
                SlotLabel::parse("09:00").unwrap(),
                SlotLabel::parse("09:30").unwrap(),
            ],
        };

        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert!(shape.covers(date, SlotLabel::parse("09:00").unwrap()));
        assert!(!shape.covers(date, SlotLabel::parse("10:00").unwrap()));

        let other_day = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();
        assert!(!shape.covers(other_day, SlotLabel::parse("09:00").unwrap()));
    }

    #[test]
    fn test_recurring_window_covers_weekday_range() {
        // 2024-06-03 is a Monday
        let monday = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let shape = WindowShape::Recurring {
            day_of_week: 1,
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            is_available: true,
        };

        assert!(shape.covers(monday, SlotLabel::parse("09:00").unwrap()));
        assert!(shape.covers(monday, SlotLabel::parse("16:30").unwrap()));
        // end is exclusive
        assert!(!shape.covers(monday, SlotLabel::parse("17:00").unwrap()));
        assert!(!shape.covers(monday, SlotLabel::parse("08:30").unwrap()));

        let tuesday = NaiveDate::from_ymd_opt(2024, 6, 4).unwrap();
        assert!(!shape.covers(tuesday, SlotLabel::parse("09:00").unwrap()));
    }

    #[test]
    fn test_recurring_window_marked_unavailable_covers_nothing() {
        let monday = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let shape = WindowShape::Recurring {
            day_of_week: 1,
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            is_available: false,
        };

        assert!(!shape.covers(monday, SlotLabel::parse("09:00").unwrap()));
    }

    #[test]
    fn test_dated_row_with_null_recurring_columns_deserializes() {
        // Shape of a PostgREST row: unused shape columns come back as null
        let row = json!({
            "id": Uuid::new_v4(),
            "doctor_id": Uuid::new_v4(),
            "kind": "dated",
            "date": "2024-06-01",
            "time_slots": ["09:00", "09:30"],
            "day_of_week": null,
            "start_time": null,
            "end_time": null,
            "is_available": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        });

        let window: AvailabilityWindow = serde_json::from_value(row).unwrap();
        match window.shape {
            WindowShape::Dated { date, time_slots } => {
                assert_eq!(date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
                assert_eq!(time_slots.len(), 2);
            }
            WindowShape::Recurring { .. } => panic!("expected dated window"),
        }
    }

    #[test]
    fn test_recurring_row_with_null_dated_columns_deserializes() {
        let row = json!({
            "id": Uuid::new_v4(),
            "doctor_id": Uuid::new_v4(),
            "kind": "recurring",
            "date": null,
            "time_slots": null,
            "day_of_week": 2,
            "start_time": "09:00:00",
            "end_time": "12:00:00",
            "is_available": true,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        });

        let window: AvailabilityWindow = serde_json::from_value(row).unwrap();
        match window.shape {
            WindowShape::Recurring {
                day_of_week,
                start_time,
                end_time,
                is_available,
            } => {
                assert_eq!(day_of_week, 2);
                assert_eq!(start_time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
                assert_eq!(end_time, NaiveTime::from_hms_opt(12, 0, 0).unwrap());
                assert!(is_available);
            }
            WindowShape::Dated { .. } => panic!("expected recurring window"),
        }
    }
}
