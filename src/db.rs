//! Embedded SQLite storage: document metadata, announcements, users,
//! timetables and the meeting ledger.
//!
//! One connection behind a mutex. Booking validates and inserts under a
//! single held guard, so two requests for the same slot cannot interleave;
//! a UNIQUE index on (teacher_id, date, time) backstops the check.

use crate::booking;
use crate::error::ApiError;
use crate::protocol::{
    AnnouncementRecord, BookingOutcome, MeetingRecord, StoredFileInfo, UserRecord,
};
use crate::roles::Role;
use crate::timetable::Schedule;
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const RECENT_FILES_LIMIT: usize = 8;

#[derive(Clone)]
pub struct CampusDb {
    conn: Arc<Mutex<Connection>>,
}

impl CampusDb {
    pub fn open(path: &Path) -> Result<Self, ApiError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, ApiError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, ApiError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS documents (
                file_name    TEXT PRIMARY KEY,
                content_type TEXT NOT NULL,
                role         TEXT NOT NULL,
                size         INTEGER NOT NULL,
                uploaded_at  TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS announcements (
                id           TEXT PRIMARY KEY,
                title        TEXT NOT NULL,
                text         TEXT NOT NULL,
                role         TEXT NOT NULL,
                is_important INTEGER NOT NULL DEFAULT 0,
                created_at   TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS users (
                id    TEXT PRIMARY KEY,
                name  TEXT NOT NULL,
                role  TEXT NOT NULL,
                email TEXT NOT NULL DEFAULT ''
            );
            CREATE TABLE IF NOT EXISTS timetables (
                teacher_id    TEXT PRIMARY KEY,
                schedule_json TEXT NOT NULL,
                updated_at    TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS meetings (
                id           TEXT PRIMARY KEY,
                teacher_id   TEXT NOT NULL,
                teacher_name TEXT NOT NULL,
                student_id   TEXT NOT NULL,
                date         TEXT NOT NULL,
                time         TEXT NOT NULL,
                status       TEXT NOT NULL,
                created_at   TEXT NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_meetings_slot
                ON meetings (teacher_id, date, time);",
        )?;
        Ok(CampusDb {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, ApiError> {
        self.conn
            .lock()
            .map_err(|_| ApiError::Internal("database lock poisoned".into()))
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    pub fn insert_document(
        &self,
        file_name: &str,
        content_type: &str,
        role: Role,
        size: usize,
    ) -> Result<(), ApiError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO documents (file_name, content_type, role, size, uploaded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                file_name,
                content_type,
                role.as_str(),
                size as i64,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    pub fn find_document(&self, file_name: &str) -> Result<Option<StoredFileInfo>, ApiError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT file_name, size, uploaded_at, role, content_type
                 FROM documents WHERE file_name = ?1",
                params![file_name],
                Self::file_info_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn list_documents(&self) -> Result<Vec<StoredFileInfo>, ApiError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT file_name, size, uploaded_at, role, content_type
             FROM documents ORDER BY uploaded_at DESC",
        )?;
        let rows = stmt.query_map([], Self::file_info_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Most recent uploads owned by exactly this role tier.
    pub fn recent_documents(&self, role: Role) -> Result<Vec<StoredFileInfo>, ApiError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT file_name, size, uploaded_at, role, content_type
             FROM documents WHERE role = ?1
             ORDER BY uploaded_at DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![role.as_str(), RECENT_FILES_LIMIT as i64], Self::file_info_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn delete_document(&self, file_name: &str) -> Result<bool, ApiError> {
        let conn = self.lock()?;
        let affected = conn.execute("DELETE FROM documents WHERE file_name = ?1", params![file_name])?;
        Ok(affected > 0)
    }

    fn file_info_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredFileInfo> {
        Ok(StoredFileInfo {
            name: row.get(0)?,
            size: row.get(1)?,
            uploaded: row.get(2)?,
            role: row.get(3)?,
            content_type: row.get(4)?,
        })
    }

    // ------------------------------------------------------------------
    // Announcements
    // ------------------------------------------------------------------

    pub fn insert_announcement(
        &self,
        title: &str,
        text: &str,
        role: Role,
        is_important: bool,
    ) -> Result<AnnouncementRecord, ApiError> {
        let record = AnnouncementRecord {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            text: text.to_string(),
            role: role.as_str().to_string(),
            is_important,
            timestamp: Utc::now().to_rfc3339(),
        };
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO announcements (id, title, text, role, is_important, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.id,
                record.title,
                record.text,
                record.role,
                record.is_important as i64,
                record.timestamp
            ],
        )?;
        Ok(record)
    }

    /// Announcements visible to `viewer`: those posted for any tier the
    /// viewer can access, newest first.
    pub fn list_announcements(
        &self,
        viewer: Role,
        limit: usize,
    ) -> Result<Vec<AnnouncementRecord>, ApiError> {
        let reachable: Vec<String> = viewer
            .reachable()
            .iter()
            .map(|r| format!("'{}'", r.as_str()))
            .collect();
        let sql = format!(
            "SELECT id, title, text, role, is_important, created_at
             FROM announcements WHERE role IN ({})
             ORDER BY created_at DESC LIMIT ?1",
            reachable.join(", ")
        );
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(AnnouncementRecord {
                id: row.get(0)?,
                title: row.get(1)?,
                text: row.get(2)?,
                role: row.get(3)?,
                is_important: row.get::<_, i64>(4)? != 0,
                timestamp: row.get(5)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn delete_announcement(&self, id: &str) -> Result<bool, ApiError> {
        let conn = self.lock()?;
        let affected = conn.execute("DELETE FROM announcements WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    pub fn insert_user(&self, name: &str, role: Role, email: &str) -> Result<UserRecord, ApiError> {
        let record = UserRecord {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            role: role.as_str().to_string(),
            email: email.to_string(),
        };
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO users (id, name, role, email) VALUES (?1, ?2, ?3, ?4)",
            params![record.id, record.name, record.role, record.email],
        )?;
        Ok(record)
    }

    /// All bookable staff (teachers and HOD/Deans), sorted by name.
    pub fn list_teachers(&self) -> Result<Vec<UserRecord>, ApiError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, role, email FROM users
             WHERE role IN ('teacher', 'hod_dean') ORDER BY name",
        )?;
        let rows = stmt.query_map([], Self::user_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Case-insensitive exact name lookup among staff.
    pub fn find_teacher_by_name(&self, name: &str) -> Result<Option<UserRecord>, ApiError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT id, name, role, email FROM users
                 WHERE role IN ('teacher', 'hod_dean') AND LOWER(name) = LOWER(?1)",
                params![name.trim()],
                Self::user_from_row,
            )
            .optional()?;
        Ok(row)
    }

    fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRecord> {
        Ok(UserRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            role: row.get(2)?,
            email: row.get(3)?,
        })
    }

    // ------------------------------------------------------------------
    // Timetables
    // ------------------------------------------------------------------

    pub fn set_timetable(&self, teacher_id: &str, schedule: &Schedule) -> Result<(), ApiError> {
        let json = serde_json::to_string(schedule)
            .map_err(|e| ApiError::Internal(format!("failed to encode timetable: {}", e)))?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO timetables (teacher_id, schedule_json, updated_at)
             VALUES (?1, ?2, ?3)",
            params![teacher_id, json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn get_timetable(&self, teacher_id: &str) -> Result<Option<Schedule>, ApiError> {
        let conn = self.lock()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT schedule_json FROM timetables WHERE teacher_id = ?1",
                params![teacher_id],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| ApiError::Internal(format!("corrupt timetable record: {}", e))),
            None => Ok(None),
        }
    }

    // ------------------------------------------------------------------
    // Meetings
    // ------------------------------------------------------------------

    /// Attempt to book a slot. All checks and the insert run under one held
    /// connection guard, so concurrent requests for the same slot serialize.
    pub fn book_meeting(
        &self,
        teacher: &UserRecord,
        student_id: &str,
        date: &str,
        time: &str,
    ) -> Result<BookingOutcome, ApiError> {
        self.book_meeting_at(teacher, student_id, date, time, Utc::now().date_naive())
    }

    pub fn book_meeting_at(
        &self,
        teacher: &UserRecord,
        student_id: &str,
        date: &str,
        time: &str,
        today: NaiveDate,
    ) -> Result<BookingOutcome, ApiError> {
        let schedule = self.get_timetable(&teacher.id)?.unwrap_or_default();

        let conn = self.lock()?;

        let (parsed_date, hour) = match booking::validate_slot(date, time, today) {
            Ok(ok) => ok,
            Err(reason) => {
                let slots = Self::open_slots_locked(&conn, &schedule, &teacher.id, date, today)?;
                return Ok(BookingOutcome::rejected(reason, slots));
            }
        };
        let slot = booking::slot_label(hour);

        if let Some(reason) = booking::timetable_block(&schedule, parsed_date, hour) {
            let slots = Self::open_slots_locked(&conn, &schedule, &teacher.id, date, today)?;
            return Ok(BookingOutcome::rejected(reason, slots));
        }

        let taken: bool = conn
            .query_row(
                "SELECT 1 FROM meetings WHERE teacher_id = ?1 AND date = ?2 AND time = ?3",
                params![teacher.id, date, slot],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if taken {
            let slots = Self::open_slots_locked(&conn, &schedule, &teacher.id, date, today)?;
            return Ok(BookingOutcome::rejected(
                "This time slot is already booked",
                slots,
            ));
        }

        let id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO meetings (id, teacher_id, teacher_name, student_id, date, time, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'scheduled', ?7)",
            params![
                id,
                teacher.id,
                teacher.name,
                student_id,
                date,
                slot,
                Utc::now().to_rfc3339()
            ],
        )?;

        Ok(BookingOutcome::scheduled(id))
    }

    pub fn available_slots(&self, teacher_id: &str, date: &str) -> Result<Vec<String>, ApiError> {
        self.available_slots_at(teacher_id, date, Utc::now().date_naive())
    }

    pub fn available_slots_at(
        &self,
        teacher_id: &str,
        date: &str,
        today: NaiveDate,
    ) -> Result<Vec<String>, ApiError> {
        let schedule = self.get_timetable(teacher_id)?.unwrap_or_default();
        let conn = self.lock()?;
        Self::open_slots_locked(&conn, &schedule, teacher_id, date, today)
    }

    fn open_slots_locked(
        conn: &Connection,
        schedule: &Schedule,
        teacher_id: &str,
        date: &str,
        today: NaiveDate,
    ) -> Result<Vec<String>, ApiError> {
        let Ok(parsed_date) = NaiveDate::parse_from_str(date, "%Y-%m-%d") else {
            return Ok(Vec::new());
        };

        let mut stmt =
            conn.prepare("SELECT time FROM meetings WHERE teacher_id = ?1 AND date = ?2")?;
        let booked: HashSet<String> = stmt
            .query_map(params![teacher_id, date], |row| row.get(0))?
            .collect::<Result<_, _>>()?;

        Ok(booking::open_slots(schedule, &booked, parsed_date, today))
    }

    /// Meetings visible to a user: teachers see their own calendar, students
    /// their own bookings. Without a recognized role both sides are matched.
    pub fn list_meetings(
        &self,
        user_id: &str,
        role: Option<Role>,
    ) -> Result<Vec<MeetingRecord>, ApiError> {
        let sql = match role {
            Some(r) if r.is_staff() => {
                "SELECT id, teacher_id, teacher_name, student_id, date, time, status, created_at
                 FROM meetings WHERE teacher_id = ?1 ORDER BY date, time"
            }
            Some(_) => {
                "SELECT id, teacher_id, teacher_name, student_id, date, time, status, created_at
                 FROM meetings WHERE student_id = ?1 ORDER BY date, time"
            }
            None => {
                "SELECT id, teacher_id, teacher_name, student_id, date, time, status, created_at
                 FROM meetings WHERE teacher_id = ?1 OR student_id = ?1 ORDER BY date, time"
            }
        };
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(MeetingRecord {
                id: row.get(0)?,
                teacher_id: row.get(1)?,
                teacher_name: row.get(2)?,
                student_id: row.get(3)?,
                date: row.get(4)?,
                time: row.get(5)?,
                status: row.get(6)?,
                created_at: row.get(7)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn delete_meeting(&self, id: &str) -> Result<bool, ApiError> {
        let conn = self.lock()?;
        let affected = conn.execute("DELETE FROM meetings WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn db() -> CampusDb {
        CampusDb::open_in_memory().unwrap()
    }

    fn teacher(db: &CampusDb) -> UserRecord {
        db.insert_user("Dr Rao", Role::Teacher, "rao@example.edu")
            .unwrap()
    }

    fn today() -> NaiveDate {
        // A Tuesday.
        NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()
    }

    #[test]
    fn test_document_roundtrip_and_recent_limit() {
        let db = db();
        for i in 0..12 {
            db.insert_document(&format!("f{}.pdf", i), "application/pdf", Role::Student, 10)
                .unwrap();
        }
        db.insert_document("staff.pdf", "application/pdf", Role::Teacher, 10)
            .unwrap();

        let recent = db.recent_documents(Role::Student).unwrap();
        assert_eq!(recent.len(), 8);
        assert!(recent.iter().all(|f| f.role == "student"));

        assert!(db.find_document("staff.pdf").unwrap().is_some());
        assert!(db.delete_document("staff.pdf").unwrap());
        assert!(db.find_document("staff.pdf").unwrap().is_none());
        assert!(!db.delete_document("staff.pdf").unwrap());
    }

    #[test]
    fn test_announcement_visibility_hierarchy() {
        let db = db();
        db.insert_announcement("exam", "exam soon", Role::Student, false)
            .unwrap();
        db.insert_announcement("staff", "staff only", Role::Teacher, true)
            .unwrap();
        db.insert_announcement("board", "leadership", Role::HodDean, false)
            .unwrap();

        assert_eq!(db.list_announcements(Role::Student, 10).unwrap().len(), 1);
        assert_eq!(db.list_announcements(Role::Teacher, 10).unwrap().len(), 2);
        assert_eq!(db.list_announcements(Role::HodDean, 10).unwrap().len(), 3);
        assert_eq!(db.list_announcements(Role::HodDean, 2).unwrap().len(), 2);
    }

    #[test]
    fn test_find_teacher_case_insensitive_and_staff_only() {
        let db = db();
        teacher(&db);
        db.insert_user("Sam Student", Role::Student, "").unwrap();

        assert!(db.find_teacher_by_name("dr rao").unwrap().is_some());
        assert!(db.find_teacher_by_name("Sam Student").unwrap().is_none());
        assert_eq!(db.list_teachers().unwrap().len(), 1);
    }

    #[test]
    fn test_booking_valid_slot_scheduled() {
        let db = db();
        let t = teacher(&db);
        // 2030-01-07 is a Monday.
        let outcome = db
            .book_meeting_at(&t, "s1", "2030-01-07", "10:00", today())
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.message, "Meeting scheduled successfully");
        assert!(outcome.meeting_id.is_some());

        let meetings = db.list_meetings("s1", Some(Role::Student)).unwrap();
        assert_eq!(meetings.len(), 1);
        assert_eq!(meetings[0].status, "scheduled");
        assert_eq!(meetings[0].time, "10:00");
    }

    #[test]
    fn test_booking_rejections_carry_reason_and_slots() {
        let db = db();
        let t = teacher(&db);
        for (date, time) in [
            ("2030-01-05", "10:00"), // Saturday
            ("2029-12-31", "10:00"), // past
            ("2030-01-07", "13:00"), // lunch
            ("2030-01-07", "08:00"), // before opening
            ("bad-date", "10:00"),
        ] {
            let outcome = db.book_meeting_at(&t, "s1", date, time, today()).unwrap();
            assert!(!outcome.success, "{} {} should be rejected", date, time);
            assert!(!outcome.message.is_empty());
        }

        // A valid weekday rejection still reports the open slots.
        let outcome = db
            .book_meeting_at(&t, "s1", "2030-01-07", "13:00", today())
            .unwrap();
        assert_eq!(outcome.available_slots.len(), 7);
    }

    #[test]
    fn test_booking_duplicate_slot_rejected() {
        let db = db();
        let t = teacher(&db);
        let first = db
            .book_meeting_at(&t, "s1", "2030-01-07", "10:00", today())
            .unwrap();
        assert!(first.success);

        let second = db
            .book_meeting_at(&t, "s2", "2030-01-07", "10:00", today())
            .unwrap();
        assert!(!second.success);
        assert_eq!(second.message, "This time slot is already booked");
        assert!(!second.available_slots.contains(&"10:00".to_string()));
    }

    #[test]
    fn test_booking_blocked_by_timetable_class() {
        let db = db();
        let t = teacher(&db);
        let mut monday = BTreeMap::new();
        monday.insert("10:00-11:00".to_string(), "Physics 101".to_string());
        let mut schedule: Schedule = BTreeMap::new();
        schedule.insert("Monday".to_string(), monday);
        db.set_timetable(&t.id, &schedule).unwrap();

        let outcome = db
            .book_meeting_at(&t, "s1", "2030-01-07", "10:00", today())
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.message, "Teacher has Physics 101 at this time");
        assert!(!outcome.available_slots.contains(&"10:00".to_string()));
    }

    #[test]
    fn test_available_slots_without_timetable() {
        let db = db();
        let t = teacher(&db);
        let slots = db
            .available_slots_at(&t.id, "2030-01-07", today())
            .unwrap();
        assert_eq!(
            slots,
            vec!["09:00", "10:00", "11:00", "12:00", "14:00", "15:00", "16:00"]
        );
    }

    #[test]
    fn test_meetings_listing_by_role() {
        let db = db();
        let t = teacher(&db);
        db.book_meeting_at(&t, "s1", "2030-01-07", "10:00", today())
            .unwrap();
        db.book_meeting_at(&t, "s2", "2030-01-07", "11:00", today())
            .unwrap();

        assert_eq!(db.list_meetings(&t.id, Some(Role::Teacher)).unwrap().len(), 2);
        assert_eq!(db.list_meetings("s1", Some(Role::Student)).unwrap().len(), 1);
        assert_eq!(db.list_meetings("s1", None).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_meeting_frees_slot() {
        let db = db();
        let t = teacher(&db);
        let outcome = db
            .book_meeting_at(&t, "s1", "2030-01-07", "10:00", today())
            .unwrap();
        let id = outcome.meeting_id.unwrap();
        assert!(db.delete_meeting(&id).unwrap());

        let again = db
            .book_meeting_at(&t, "s2", "2030-01-07", "10:00", today())
            .unwrap();
        assert!(again.success);
    }

    #[test]
    fn test_timetable_persistence() {
        let db = db();
        let t = teacher(&db);
        assert!(db.get_timetable(&t.id).unwrap().is_none());

        let mut monday = BTreeMap::new();
        monday.insert("09:00-10:00".to_string(), "Office Hours".to_string());
        let mut schedule: Schedule = BTreeMap::new();
        schedule.insert("Monday".to_string(), monday);
        db.set_timetable(&t.id, &schedule).unwrap();

        assert_eq!(db.get_timetable(&t.id).unwrap(), Some(schedule));
    }
}
