use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{QuorumError, Result};

use super::minutes::Minutes;

/// Meeting correlation, assigned when a session is composed.
///
/// Threaded explicitly through the composer call chain; there is no shared
/// "last group id" anywhere, so concurrent sessions cannot cross-contaminate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionKey {
    pub group_id: Uuid,
    pub meeting_number: i32,
    pub meeting_year: i32,
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.meeting_number, self.meeting_year)
    }
}

/// One expected participant and whether they attended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceEntry {
    pub code: String,
    pub present: bool,
}

/// Who chaired and who kept the record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leadership {
    pub chair: String,
    pub secretary: String,
}

/// Shared logistics/attendance snapshot, one per session, denormalized onto
/// every member agenda when progress is saved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub held_on: NaiveDate,
    pub location: Option<String>,
    pub started_at: Option<NaiveTime>,
    pub ended_at: Option<NaiveTime>,
    pub attendance: Vec<AttendanceEntry>,
    pub leadership: Leadership,
    pub guests: Vec<String>,
}

impl SessionRecord {
    pub fn new(held_on: NaiveDate) -> Self {
        Self {
            held_on,
            location: None,
            started_at: None,
            ended_at: None,
            attendance: Vec::new(),
            leadership: Leadership::default(),
            guests: Vec::new(),
        }
    }

    /// Default the roster to present for every expected participant
    pub fn seed_attendance(&mut self, codes: impl IntoIterator<Item = String>) {
        self.attendance = codes
            .into_iter()
            .map(|code| AttendanceEntry { code, present: true })
            .collect();
    }

    pub fn mark_absent(&mut self, code: &str) -> Result<()> {
        let entry = self
            .attendance
            .iter_mut()
            .find(|e| e.code == code)
            .ok_or_else(|| {
                QuorumError::Validation(format!("{} is not on the attendance roster", code))
            })?;
        entry.present = false;
        Ok(())
    }
}

/// One agenda's worth of in-progress minutes inside a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberDraft {
    pub agenda_id: Uuid,
    pub title: String,
    pub minutes: Minutes,
}

/// Outcome of removing an agenda from a session draft
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalOutcome {
    /// Other members remain, session continues
    Continued,
    /// The sole member was removed, session dissolves
    Dissolved,
}

/// Working state of one live meeting: shared record plus per-agenda minute
/// drafts, in presentation order, with an active-item pointer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDraft {
    pub key: SessionKey,
    pub record: SessionRecord,
    pub members: Vec<MemberDraft>,
    pub active_index: usize,
}

impl SessionDraft {
    pub fn member(&self, agenda_id: Uuid) -> Option<&MemberDraft> {
        self.members.iter().find(|m| m.agenda_id == agenda_id)
    }

    pub fn member_mut(&mut self, agenda_id: Uuid) -> Option<&mut MemberDraft> {
        self.members.iter_mut().find(|m| m.agenda_id == agenda_id)
    }

    pub fn active(&self) -> Option<&MemberDraft> {
        self.members.get(self.active_index)
    }

    pub fn set_active(&mut self, index: usize) -> Result<()> {
        if index >= self.members.len() {
            return Err(QuorumError::Validation(format!(
                "active index {} out of range, session has {} members",
                index,
                self.members.len()
            )));
        }
        self.active_index = index;
        Ok(())
    }

    /// Drop one member's minute draft; the shared record stays untouched.
    ///
    /// The active pointer keeps its index where still valid, else moves to
    /// the last member.
    pub fn remove_member(&mut self, agenda_id: Uuid) -> Result<RemovalOutcome> {
        let position = self
            .members
            .iter()
            .position(|m| m.agenda_id == agenda_id)
            .ok_or(QuorumError::AgendaNotFound(agenda_id))?;
        self.members.remove(position);

        if self.members.is_empty() {
            self.active_index = 0;
            return Ok(RemovalOutcome::Dissolved);
        }
        if self.active_index >= self.members.len() {
            self.active_index = self.members.len() - 1;
        }
        Ok(RemovalOutcome::Continued)
    }

    /// Members still lacking a non-blank decision entry, in session order
    pub fn members_without_decision(&self) -> Vec<Uuid> {
        self.members
            .iter()
            .filter(|m| !m.minutes.has_decision())
            .map(|m| m.agenda_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft_with(n: usize) -> SessionDraft {
        let key = SessionKey {
            group_id: Uuid::new_v4(),
            meeting_number: 7,
            meeting_year: 2026,
        };
        let mut record = SessionRecord::new("2026-09-10".parse().unwrap());
        record.seed_attendance(vec!["D-01".to_string(), "D-02".to_string()]);
        SessionDraft {
            key,
            record,
            members: (0..n)
                .map(|i| MemberDraft {
                    agenda_id: Uuid::new_v4(),
                    title: format!("Item {}", i + 1),
                    minutes: Minutes::default(),
                })
                .collect(),
            active_index: 0,
        }
    }

    #[test]
    fn test_attendance_defaults_to_present() {
        let draft = draft_with(1);
        assert_eq!(draft.record.attendance.len(), 2);
        assert!(draft.record.attendance.iter().all(|e| e.present));
    }

    #[test]
    fn test_mark_absent_requires_roster_entry() {
        let mut draft = draft_with(1);
        draft.record.mark_absent("D-02").unwrap();
        assert!(!draft.record.attendance[1].present);
        assert!(draft.record.mark_absent("D-99").is_err());
    }

    #[test]
    fn test_remove_middle_keeps_index_and_others() {
        let mut draft = draft_with(3);
        let middle = draft.members[1].agenda_id;
        let last = draft.members[2].agenda_id;
        draft.set_active(1).unwrap();

        let outcome = draft.remove_member(middle).unwrap();
        assert_eq!(outcome, RemovalOutcome::Continued);
        // same index now points at the item that followed
        assert_eq!(draft.active_index, 1);
        assert_eq!(draft.active().unwrap().agenda_id, last);
        assert_eq!(draft.members.len(), 2);
    }

    #[test]
    fn test_remove_last_retargets_to_new_last() {
        let mut draft = draft_with(3);
        let last = draft.members[2].agenda_id;
        draft.set_active(2).unwrap();

        draft.remove_member(last).unwrap();
        assert_eq!(draft.active_index, 1);
    }

    #[test]
    fn test_remove_sole_member_dissolves() {
        let mut draft = draft_with(1);
        let only = draft.members[0].agenda_id;
        let outcome = draft.remove_member(only).unwrap();
        assert_eq!(outcome, RemovalOutcome::Dissolved);
        assert!(draft.members.is_empty());
    }

    #[test]
    fn test_remove_unknown_member_fails() {
        let mut draft = draft_with(2);
        assert!(draft.remove_member(Uuid::new_v4()).is_err());
    }

    #[test]
    fn test_members_without_decision() {
        let mut draft = draft_with(3);
        draft.members[0].minutes.decisions.push("Approved".into());
        draft.members[2].minutes.decisions.push("  ".into());

        let missing = draft.members_without_decision();
        assert_eq!(missing.len(), 2);
        assert_eq!(missing[0], draft.members[1].agenda_id);
        assert_eq!(missing[1], draft.members[2].agenda_id);
    }

    #[test]
    fn test_set_active_bounds() {
        let mut draft = draft_with(2);
        assert!(draft.set_active(1).is_ok());
        assert!(draft.set_active(2).is_err());
    }
}
