//! Pure validation rules for meeting booking.
//!
//! Meetings are one hour long, on the hour, weekdays 09:00-17:00 with the
//! 13:00 lunch hour blocked. Validation returns reason strings, not errors;
//! a rejected booking is a normal response.

use crate::timetable::Schedule;
use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::HashSet;

pub const OPENING_HOUR: u32 = 9;
pub const CLOSING_HOUR: u32 = 17;
pub const LUNCH_HOUR: u32 = 13;

/// Activity name that leaves a timetable slot bookable.
pub const OFFICE_HOURS: &str = "Office Hours";

/// Validate a requested date and time against the business-hour rules.
/// Returns the parsed date and the slot hour, or the rejection reason.
pub fn validate_slot(date: &str, time: &str, today: NaiveDate) -> Result<(NaiveDate, u32), String> {
    let parsed_date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| "Invalid date format. Please use YYYY-MM-DD".to_string())?;

    if parsed_date < today {
        return Err("Cannot book meetings for past dates".to_string());
    }

    if matches!(parsed_date.weekday(), Weekday::Sat | Weekday::Sun) {
        return Err("Cannot book meetings on weekends".to_string());
    }

    let hour = parse_hour(time).ok_or("Invalid time format. Please use HH:MM".to_string())?;

    if !(OPENING_HOUR..CLOSING_HOUR).contains(&hour) {
        return Err("Invalid time. Available hours are between 09:00-17:00".to_string());
    }

    if hour == LUNCH_HOUR {
        return Err("Cannot book during lunch break (13:00-14:00)".to_string());
    }

    Ok((parsed_date, hour))
}

/// Accepts `HH:MM` and the bare 4-digit `HHMM` form. Minutes are dropped;
/// slots are on the hour.
fn parse_hour(time: &str) -> Option<u32> {
    let time = time.trim();
    let hour_part = if let Some((h, m)) = time.split_once(':') {
        if m.len() != 2 || m.parse::<u32>().ok()? > 59 {
            return None;
        }
        h
    } else if time.len() == 4 && time.chars().all(|c| c.is_ascii_digit()) {
        &time[..2]
    } else {
        return None;
    };
    let hour: u32 = hour_part.parse().ok()?;
    (hour < 24).then_some(hour)
}

/// Canonical slot label, `"10:00"`.
pub fn slot_label(hour: u32) -> String {
    format!("{:02}:00", hour)
}

/// Timetable slot key spanning the hour, `"10:00-11:00"`.
pub fn slot_range(hour: u32) -> String {
    format!("{:02}:00-{:02}:00", hour, hour + 1)
}

/// Check the teacher's timetable for a conflicting class. Office hours do
/// not block a slot. Returns the rejection reason if blocked.
pub fn timetable_block(schedule: &Schedule, date: NaiveDate, hour: u32) -> Option<String> {
    let weekday = date.format("%A").to_string();
    let activity = schedule.get(&weekday)?.get(&slot_range(hour))?;
    let activity = activity.trim();
    if activity.is_empty() || activity.eq_ignore_ascii_case(OFFICE_HOURS) {
        return None;
    }
    Some(format!("Teacher has {} at this time", activity))
}

/// Compute the bookable slot labels for a teacher on a date: every business
/// hour not blocked by the timetable and not already booked. Past dates and
/// weekends have no slots.
pub fn open_slots(
    schedule: &Schedule,
    booked: &HashSet<String>,
    date: NaiveDate,
    today: NaiveDate,
) -> Vec<String> {
    if date < today || matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        return Vec::new();
    }

    (OPENING_HOUR..CLOSING_HOUR)
        .filter(|&hour| hour != LUNCH_HOUR)
        .filter(|&hour| timetable_block(schedule, date, hour).is_none())
        .map(slot_label)
        .filter(|label| !booked.contains(label))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn today() -> NaiveDate {
        // A Tuesday.
        NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()
    }

    #[test]
    fn test_valid_weekday_slot() {
        // 2030-01-07 is a Monday.
        let (date, hour) = validate_slot("2030-01-07", "10:00", today()).unwrap();
        assert_eq!(hour, 10);
        assert_eq!(date.weekday(), Weekday::Mon);
    }

    #[test]
    fn test_bare_hhmm_time_accepted() {
        let (_, hour) = validate_slot("2030-01-07", "1400", today()).unwrap();
        assert_eq!(hour, 14);
    }

    #[test]
    fn test_invalid_date_format() {
        let err = validate_slot("07/01/2030", "10:00", today()).unwrap_err();
        assert_eq!(err, "Invalid date format. Please use YYYY-MM-DD");
    }

    #[test]
    fn test_past_date_rejected() {
        let err = validate_slot("2029-12-31", "10:00", today()).unwrap_err();
        assert_eq!(err, "Cannot book meetings for past dates");
    }

    #[test]
    fn test_weekend_rejected() {
        // 2030-01-05 is a Saturday.
        let err = validate_slot("2030-01-05", "10:00", today()).unwrap_err();
        assert_eq!(err, "Cannot book meetings on weekends");
    }

    #[test]
    fn test_invalid_time_format() {
        let err = validate_slot("2030-01-07", "ten", today()).unwrap_err();
        assert_eq!(err, "Invalid time format. Please use HH:MM");
    }

    #[test]
    fn test_out_of_hours_rejected() {
        let err = validate_slot("2030-01-07", "08:00", today()).unwrap_err();
        assert_eq!(err, "Invalid time. Available hours are between 09:00-17:00");
        let err = validate_slot("2030-01-07", "17:00", today()).unwrap_err();
        assert_eq!(err, "Invalid time. Available hours are between 09:00-17:00");
    }

    #[test]
    fn test_lunch_hour_rejected() {
        let err = validate_slot("2030-01-07", "13:00", today()).unwrap_err();
        assert_eq!(err, "Cannot book during lunch break (13:00-14:00)");
    }

    #[test]
    fn test_timetable_class_blocks_slot() {
        let mut monday = BTreeMap::new();
        monday.insert("10:00-11:00".to_string(), "Physics 101".to_string());
        monday.insert("11:00-12:00".to_string(), OFFICE_HOURS.to_string());
        let mut schedule: Schedule = BTreeMap::new();
        schedule.insert("Monday".to_string(), monday);

        let date = NaiveDate::from_ymd_opt(2030, 1, 7).unwrap();
        assert_eq!(
            timetable_block(&schedule, date, 10),
            Some("Teacher has Physics 101 at this time".to_string())
        );
        assert_eq!(timetable_block(&schedule, date, 11), None);
        assert_eq!(timetable_block(&schedule, date, 14), None);
    }

    #[test]
    fn test_empty_schedule_gives_seven_slots() {
        let schedule: Schedule = BTreeMap::new();
        let date = NaiveDate::from_ymd_opt(2030, 1, 7).unwrap();
        let slots = open_slots(&schedule, &HashSet::new(), date, today());
        assert_eq!(
            slots,
            vec!["09:00", "10:00", "11:00", "12:00", "14:00", "15:00", "16:00"]
        );
    }

    #[test]
    fn test_open_slots_exclude_booked_and_classes() {
        let mut monday = BTreeMap::new();
        monday.insert("09:00-10:00".to_string(), "Lecture".to_string());
        let mut schedule: Schedule = BTreeMap::new();
        schedule.insert("Monday".to_string(), monday);

        let mut booked = HashSet::new();
        booked.insert("14:00".to_string());

        let date = NaiveDate::from_ymd_opt(2030, 1, 7).unwrap();
        let slots = open_slots(&schedule, &booked, date, today());
        assert_eq!(slots, vec!["10:00", "11:00", "12:00", "15:00", "16:00"]);
    }

    #[test]
    fn test_no_slots_on_weekend_or_past() {
        let schedule: Schedule = BTreeMap::new();
        let saturday = NaiveDate::from_ymd_opt(2030, 1, 5).unwrap();
        assert!(open_slots(&schedule, &HashSet::new(), saturday, today()).is_empty());
        let past = NaiveDate::from_ymd_opt(2029, 12, 30).unwrap();
        assert!(open_slots(&schedule, &HashSet::new(), past, today()).is_empty());
    }
}
