use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{QuorumError, Result};

use super::attachment::AttachmentRegistry;
use super::completeness;
use super::minutes::Minutes;
use super::session::{SessionKey, SessionRecord};
use super::status::{AgendaStatus, StatusTransition};

/// Meeting category. Each kind carries its own required-slot template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AgendaKind {
    /// Board of directors
    #[serde(alias = "BOD")]
    Directors,
    /// Board of commissioners
    #[serde(alias = "BOC")]
    Commissioners,
    /// Joint directors and commissioners meeting
    #[serde(alias = "BOD_BOC")]
    Joint,
}

impl AgendaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgendaKind::Directors => "DIRECTORS",
            AgendaKind::Commissioners => "COMMISSIONERS",
            AgendaKind::Joint => "JOINT",
        }
    }
}

impl Default for AgendaKind {
    fn default() -> Self {
        AgendaKind::Directors
    }
}

impl std::fmt::Display for AgendaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for AgendaKind {
    type Error = String;

    fn try_from(s: &str) -> std::result::Result<Self, Self::Error> {
        match s.to_uppercase().as_str() {
            "DIRECTORS" | "BOD" => Ok(AgendaKind::Directors),
            "COMMISSIONERS" | "BOC" => Ok(AgendaKind::Commissioners),
            "JOINT" | "BOD_BOC" => Ok(AgendaKind::Joint),
            _ => Err(format!("Unknown agenda kind: {}", s)),
        }
    }
}

/// Handling priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Urgency {
    #[serde(alias = "normal", alias = "REGULAR")]
    Normal,
    #[serde(alias = "urgent", alias = "HIGH")]
    Urgent,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Normal => "NORMAL",
            Urgency::Urgent => "URGENT",
        }
    }
}

impl Default for Urgency {
    fn default() -> Self {
        Urgency::Normal
    }
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for Urgency {
    type Error = String;

    fn try_from(s: &str) -> std::result::Result<Self, Self::Error> {
        match s.to_uppercase().as_str() {
            "NORMAL" | "REGULAR" => Ok(Urgency::Normal),
            "URGENT" | "HIGH" => Ok(Urgency::Urgent),
            _ => Err(format!("Unknown urgency: {}", s)),
        }
    }
}

/// How the meeting convenes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MeetingMethod {
    #[serde(alias = "ONSITE")]
    Offline,
    #[serde(alias = "REMOTE")]
    Online,
    Hybrid,
}

impl MeetingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingMethod::Offline => "OFFLINE",
            MeetingMethod::Online => "ONLINE",
            MeetingMethod::Hybrid => "HYBRID",
        }
    }
}

impl std::fmt::Display for MeetingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for MeetingMethod {
    type Error = String;

    fn try_from(s: &str) -> std::result::Result<Self, Self::Error> {
        match s.to_uppercase().as_str() {
            "OFFLINE" | "ONSITE" => Ok(MeetingMethod::Offline),
            "ONLINE" | "REMOTE" => Ok(MeetingMethod::Online),
            "HYBRID" => Ok(MeetingMethod::Hybrid),
            _ => Err(format!("Unknown meeting method: {}", s)),
        }
    }
}

/// Person answering questions about the proposal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactPoint {
    pub name: String,
    pub position: String,
    pub phone: String,
}

impl ContactPoint {
    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty()
            && !self.position.trim().is_empty()
            && !self.phone.trim().is_empty()
    }
}

/// Meeting logistics, populated only once scheduled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub execution_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: Option<NaiveTime>,
    pub method: MeetingMethod,
    pub location: Option<String>,
    pub link: Option<String>,
}

impl Schedule {
    pub fn validate(&self) -> Result<()> {
        if let Some(end) = self.end_time {
            if end <= self.start_time {
                return Err(QuorumError::Validation(format!(
                    "end time {} is not after start time {}",
                    end, self.start_time
                )));
            }
        }
        Ok(())
    }
}

/// Incoming proposal payload.
///
/// Upstream producers spell several attributes two ways; the aliases and
/// `canonicalize` normalize everything here, once, so nothing downstream
/// ever sees the variant spellings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgendaSubmission {
    #[serde(default)]
    pub kind: AgendaKind,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "bod_codes")]
    pub director_codes: Vec<String>,
    #[serde(default, alias = "proposer_codes")]
    pub initiator_codes: Vec<String>,
    #[serde(default, alias = "supporting_codes")]
    pub support_codes: Vec<String>,
    #[serde(default, alias = "pic_name")]
    pub contact_name: String,
    #[serde(default, alias = "pic_position")]
    pub contact_position: String,
    #[serde(default, alias = "pic_phone")]
    pub contact_phone: String,
    #[serde(default)]
    pub urgency: Urgency,
    #[serde(default, alias = "deadline")]
    pub target_date: Option<NaiveDate>,
}

impl AgendaSubmission {
    /// Normalize values: trim strings, drop blank codes, dedup in order.
    pub fn canonicalize(mut self) -> Self {
        fn clean_codes(codes: Vec<String>) -> Vec<String> {
            let mut seen = Vec::new();
            for code in codes {
                let code = code.trim().to_string();
                if !code.is_empty() && !seen.contains(&code) {
                    seen.push(code);
                }
            }
            seen
        }

        self.title = self.title.trim().to_string();
        self.director_codes = clean_codes(self.director_codes);
        self.initiator_codes = clean_codes(self.initiator_codes);
        self.support_codes = clean_codes(self.support_codes);
        self.contact_name = self.contact_name.trim().to_string();
        self.contact_position = self.contact_position.trim().to_string();
        self.contact_phone = self.contact_phone.trim().to_string();
        self
    }
}

/// One proposed item for a board or commissioner meeting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agenda {
    pub id: Uuid,
    pub kind: AgendaKind,
    pub title: String,
    pub director_codes: Vec<String>,
    pub initiator_codes: Vec<String>,
    pub support_codes: Vec<String>,
    pub contact: ContactPoint,
    pub urgency: Urgency,
    pub target_date: Option<NaiveDate>,
    pub status: AgendaStatus,
    /// Some iff status is Scheduled or Locked
    pub schedule: Option<Schedule>,
    pub minutes: Minutes,
    /// Shared logistics/attendance snapshot, denormalized during a session
    pub conduct: Option<SessionRecord>,
    /// Meeting correlation, assigned at finalization
    pub correlation: Option<SessionKey>,
    pub attachments: AttachmentRegistry,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agenda {
    /// Create a fresh Draft from a proposal submission
    pub fn new(submission: AgendaSubmission) -> Self {
        let submission = submission.canonicalize();
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            kind: submission.kind,
            title: submission.title,
            director_codes: submission.director_codes,
            initiator_codes: submission.initiator_codes,
            support_codes: submission.support_codes,
            contact: ContactPoint {
                name: submission.contact_name,
                position: submission.contact_position,
                phone: submission.contact_phone,
            },
            urgency: submission.urgency,
            target_date: submission.target_date,
            status: AgendaStatus::Draft,
            schedule: None,
            minutes: Minutes::default(),
            conduct: None,
            correlation: None,
            attachments: AttachmentRegistry::for_kind(submission.kind),
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite scalar fields from an edited submission. The kind is fixed
    /// at creation because it decides the slot template.
    pub fn apply_submission(&mut self, submission: AgendaSubmission) -> Result<()> {
        let submission = submission.canonicalize();
        if submission.kind != self.kind {
            return Err(QuorumError::Validation(format!(
                "agenda kind cannot change from {} to {}",
                self.kind, submission.kind
            )));
        }
        self.title = submission.title;
        self.director_codes = submission.director_codes;
        self.initiator_codes = submission.initiator_codes;
        self.support_codes = submission.support_codes;
        self.contact = ContactPoint {
            name: submission.contact_name,
            position: submission.contact_position,
            phone: submission.contact_phone,
        };
        self.urgency = submission.urgency;
        self.target_date = submission.target_date;
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        completeness::is_ready(self)
    }

    pub fn is_locked(&self) -> bool {
        self.status.is_locked()
    }

    /// Re-derive the Draft/Ready label from the current snapshot.
    ///
    /// Never invoked while the agenda is bound to a meeting; completeness is
    /// always computed fresh, never cached.
    pub fn relabel(&mut self) -> Option<StatusTransition> {
        let target = if self.is_ready() {
            AgendaStatus::Ready
        } else {
            AgendaStatus::Draft
        };
        match self.status {
            AgendaStatus::Draft | AgendaStatus::Ready if self.status != target => {
                let transition = StatusTransition::new(self.status, target, "completeness changed");
                self.status = target;
                Some(transition)
            }
            _ => None,
        }
    }

    /// Assign a meeting date. Only a Ready agenda can be scheduled.
    pub fn assign_schedule(&mut self, schedule: Schedule) -> Result<StatusTransition> {
        if !self.status.can_transition_to(AgendaStatus::Scheduled) {
            return Err(QuorumError::InvalidTransition {
                from: self.status.to_string(),
                to: AgendaStatus::Scheduled.to_string(),
            });
        }
        schedule.validate()?;
        let transition =
            StatusTransition::new(self.status, AgendaStatus::Scheduled, "schedule assigned");
        self.schedule = Some(schedule);
        self.status = AgendaStatus::Scheduled;
        Ok(transition)
    }

    /// Clear the schedule block and recompute the label fresh.
    ///
    /// Minutes and the conduct snapshot go with it: those fields may only be
    /// populated past Ready. Documents may have been removed since
    /// scheduling, so the agenda can land on Draft rather than Ready.
    pub fn roll_back(&mut self) -> Result<StatusTransition> {
        if self.status != AgendaStatus::Scheduled {
            return Err(QuorumError::InvalidTransition {
                from: self.status.to_string(),
                to: AgendaStatus::Ready.to_string(),
            });
        }
        self.schedule = None;
        self.minutes.clear();
        self.conduct = None;
        let target = if self.is_ready() {
            AgendaStatus::Ready
        } else {
            AgendaStatus::Draft
        };
        let transition = StatusTransition::new(self.status, target, "schedule rolled back");
        self.status = target;
        Ok(transition)
    }

    /// Finalize as part of a session, never per single agenda
    pub(crate) fn lock(&mut self, key: SessionKey) -> Result<StatusTransition> {
        if !self.status.can_transition_to(AgendaStatus::Locked) {
            return Err(QuorumError::InvalidTransition {
                from: self.status.to_string(),
                to: AgendaStatus::Locked.to_string(),
            });
        }
        let transition = StatusTransition::new(self.status, AgendaStatus::Locked, "minutes finalized");
        self.status = AgendaStatus::Locked;
        self.correlation = Some(key);
        Ok(transition)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
