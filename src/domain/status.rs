use serde::{Deserialize, Serialize};
use std::fmt;

/// Agenda lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgendaStatus {
    /// Captured but missing required documents
    Draft,
    /// All required documents present or waived
    Ready,
    /// Assigned to a meeting date
    Scheduled,
    /// Minutes finalized, record is immutable
    Locked,
}

impl AgendaStatus {
    /// Every lifecycle state, in progression order
    pub const ALL: [AgendaStatus; 4] = [
        AgendaStatus::Draft,
        AgendaStatus::Ready,
        AgendaStatus::Scheduled,
        AgendaStatus::Locked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgendaStatus::Draft => "DRAFT",
            AgendaStatus::Ready => "READY",
            AgendaStatus::Scheduled => "SCHEDULED",
            AgendaStatus::Locked => "LOCKED",
        }
    }

    /// Check if this status can transition to another status
    pub fn can_transition_to(&self, target: AgendaStatus) -> bool {
        use AgendaStatus::*;

        match (self, target) {
            // From Draft
            (Draft, Ready) => true, // Required documents completed

            // From Ready
            (Ready, Draft) => true,     // Required document removed
            (Ready, Scheduled) => true, // Meeting date assigned

            // From Scheduled
            (Scheduled, Ready) => true, // Rolled back, documents intact
            (Scheduled, Draft) => true, // Rolled back, documents since removed
            (Scheduled, Locked) => true, // Minutes finalized

            // Locked is terminal
            _ => false,
        }
    }

    /// Get valid next statuses from current status
    pub fn valid_transitions(&self) -> Vec<AgendaStatus> {
        use AgendaStatus::*;

        match self {
            Draft => vec![Ready],
            Ready => vec![Draft, Scheduled],
            Scheduled => vec![Ready, Draft, Locked],
            Locked => vec![],
        }
    }

    /// Is this agenda bound to a meeting (scheduled or finalized)?
    ///
    /// Scalar edits and deletion are refused in these statuses; the agenda
    /// must be rolled back first.
    pub fn is_locked(&self) -> bool {
        matches!(self, AgendaStatus::Scheduled | AgendaStatus::Locked)
    }

    /// Can this agenda still be deleted?
    pub fn is_deletable(&self) -> bool {
        matches!(self, AgendaStatus::Draft | AgendaStatus::Ready)
    }

    /// Has the record been finalized? No further mutation of any kind.
    pub fn is_final(&self) -> bool {
        matches!(self, AgendaStatus::Locked)
    }
}

impl fmt::Display for AgendaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for AgendaStatus {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_uppercase().as_str() {
            "DRAFT" => Ok(AgendaStatus::Draft),
            "READY" => Ok(AgendaStatus::Ready),
            "SCHEDULED" => Ok(AgendaStatus::Scheduled),
            "LOCKED" => Ok(AgendaStatus::Locked),
            _ => Err(format!("Unknown status: {}", s)),
        }
    }
}

/// Status transition event (for the audit trail)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusTransition {
    pub from: AgendaStatus,
    pub to: AgendaStatus,
    pub reason: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl StatusTransition {
    pub fn new(from: AgendaStatus, to: AgendaStatus, reason: impl Into<String>) -> Self {
        Self {
            from,
            to,
            reason: reason.into(),
            timestamp: chrono::Utc::now(),
        }
    }
}
