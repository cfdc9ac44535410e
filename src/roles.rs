//! Role hierarchy for document and announcement visibility.
//!
//! Access tiers are fixed: HOD/Dean sees everything, teachers see teacher and
//! student material, students see only student material. All raw role strings
//! from requests and stored metadata pass through [`Role::parse`]; anything
//! that does not canonicalize to one of the three tiers is rejected rather
//! than silently passed along.

use std::fmt;

/// One of the three access tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    HodDean,
    Teacher,
    Student,
}

impl Role {
    /// Canonicalize a raw role string: lowercase, strip separators
    /// (`/ _ - .` and spaces), strip one trailing `s`, then match.
    ///
    /// `"Students"` -> `Student`, `"HOD/Dean"` -> `HodDean`. Unknown input
    /// yields `None`.
    pub fn parse(raw: &str) -> Option<Role> {
        let mut key: String = raw
            .chars()
            .filter(|c| !matches!(c, '/' | '_' | '-' | '.' | ' '))
            .flat_map(|c| c.to_lowercase())
            .collect();
        if key.len() > 1 && key.ends_with('s') {
            key.pop();
        }
        match key.as_str() {
            "hoddean" | "hod" | "dean" => Some(Role::HodDean),
            "teacher" => Some(Role::Teacher),
            "student" => Some(Role::Student),
            _ => None,
        }
    }

    /// Canonical wire form, matching the stored metadata values.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::HodDean => "hod_dean",
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }

    /// The document tiers reachable from this role.
    pub fn reachable(&self) -> &'static [Role] {
        match self {
            Role::HodDean => &[Role::HodDean, Role::Teacher, Role::Student],
            Role::Teacher => &[Role::Teacher, Role::Student],
            Role::Student => &[Role::Student],
        }
    }

    /// Whether a user with this role may access material owned by `doc_role`.
    pub fn can_access(&self, doc_role: Role) -> bool {
        self.reachable().contains(&doc_role)
    }

    /// Teachers and HOD/Deans can be booked for meetings.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Teacher | Role::HodDean)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_common_spellings() {
        assert_eq!(Role::parse("student"), Some(Role::Student));
        assert_eq!(Role::parse("Students"), Some(Role::Student));
        assert_eq!(Role::parse("Teacher"), Some(Role::Teacher));
        assert_eq!(Role::parse("teachers"), Some(Role::Teacher));
        assert_eq!(Role::parse("HOD/Dean"), Some(Role::HodDean));
        assert_eq!(Role::parse("hod_dean"), Some(Role::HodDean));
        assert_eq!(Role::parse("HOD Dean"), Some(Role::HodDean));
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!(Role::parse(""), None);
        assert_eq!(Role::parse("admin"), None);
        assert_eq!(Role::parse("professor"), None);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        for raw in ["Students", "HOD/Dean", "teacher"] {
            let role = Role::parse(raw).unwrap();
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
    }

    #[test]
    fn test_access_table() {
        let all = [Role::HodDean, Role::Teacher, Role::Student];
        for doc in all {
            assert!(Role::HodDean.can_access(doc));
        }
        assert!(!Role::Teacher.can_access(Role::HodDean));
        assert!(Role::Teacher.can_access(Role::Teacher));
        assert!(Role::Teacher.can_access(Role::Student));
        assert!(!Role::Student.can_access(Role::HodDean));
        assert!(!Role::Student.can_access(Role::Teacher));
        assert!(Role::Student.can_access(Role::Student));
    }

    #[test]
    fn test_staff_roles() {
        assert!(Role::Teacher.is_staff());
        assert!(Role::HodDean.is_staff());
        assert!(!Role::Student.is_staff());
    }
}
