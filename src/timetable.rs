//! Teacher timetable parsing from uploaded XLSX workbooks.
//!
//! Expected layout: the first sheet has a header row of
//! `Time, Monday, Tuesday, Wednesday, Thursday, Friday` and one row per hour
//! slot (`09:00-10:00` etc). Parsed into weekday -> slot -> activity.

use crate::error::ApiError;
use calamine::{Data, Reader, Xlsx};
use std::collections::BTreeMap;
use std::io::Cursor;

/// Weekday name -> slot range (`"10:00-11:00"`) -> activity name.
pub type Schedule = BTreeMap<String, BTreeMap<String, String>>;

pub fn parse_timetable_xlsx(bytes: &[u8]) -> Result<Schedule, ApiError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))
        .map_err(|e| ApiError::Validation(format!("invalid XLSX timetable: {}", e)))?;

    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ApiError::Validation("timetable workbook has no sheets".into()))?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| ApiError::Validation(format!("failed to read timetable sheet: {}", e)))?;

    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| ApiError::Validation("timetable sheet is empty".into()))?;

    // Column 0 is the time slot; the rest are weekday names.
    let weekdays: Vec<String> = header
        .iter()
        .skip(1)
        .map(|c| c.to_string().trim().to_string())
        .collect();
    if weekdays.is_empty() {
        return Err(ApiError::Validation(
            "timetable header has no weekday columns".into(),
        ));
    }

    let mut schedule: Schedule = BTreeMap::new();
    for row in rows {
        let Some(slot_cell) = row.first() else {
            continue;
        };
        let slot = slot_cell.to_string().trim().to_string();
        if slot.is_empty() {
            continue;
        }
        for (i, cell) in row.iter().skip(1).enumerate() {
            if matches!(cell, Data::Empty) {
                continue;
            }
            let activity = cell.to_string().trim().to_string();
            if activity.is_empty() {
                continue;
            }
            if let Some(weekday) = weekdays.get(i) {
                schedule
                    .entry(weekday.clone())
                    .or_default()
                    .insert(slot.clone(), activity);
            }
        }
    }

    Ok(schedule)
}
