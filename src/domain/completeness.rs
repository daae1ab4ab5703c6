//! Readiness evaluation
//!
//! Pure functions over an agenda snapshot. Callers recompute on every
//! mutation; the result is never cached as a second source of truth, because
//! a later edit (clearing a previously-set document) can retroactively make
//! a ready agenda incomplete again.

use serde::Serialize;

use super::agenda::Agenda;

/// One reason an agenda is not ready
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "gap", content = "detail")]
pub enum ReadinessGap {
    MissingTitle,
    NoDirectorCode,
    NoInitiatorCode,
    IncompleteContact,
    UnsatisfiedSlot { slot_id: String, label: String },
}

impl std::fmt::Display for ReadinessGap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadinessGap::MissingTitle => write!(f, "title is empty"),
            ReadinessGap::NoDirectorCode => write!(f, "no director code"),
            ReadinessGap::NoInitiatorCode => write!(f, "no initiator code"),
            ReadinessGap::IncompleteContact => write!(f, "contact person incomplete"),
            ReadinessGap::UnsatisfiedSlot { label, .. } => {
                write!(f, "required document missing: {}", label)
            }
        }
    }
}

/// Everything currently blocking readiness, scalar gaps first
pub fn gaps(agenda: &Agenda) -> Vec<ReadinessGap> {
    let mut gaps = Vec::new();

    if agenda.title.trim().is_empty() {
        gaps.push(ReadinessGap::MissingTitle);
    }
    if agenda.director_codes.is_empty() {
        gaps.push(ReadinessGap::NoDirectorCode);
    }
    if agenda.initiator_codes.is_empty() {
        gaps.push(ReadinessGap::NoInitiatorCode);
    }
    if !agenda.contact.is_complete() {
        gaps.push(ReadinessGap::IncompleteContact);
    }
    for slot in agenda.attachments.unsatisfied() {
        gaps.push(ReadinessGap::UnsatisfiedSlot {
            slot_id: slot.id.clone(),
            label: slot.label.clone(),
        });
    }

    gaps
}

/// Every required slot satisfied and every required scalar present
pub fn is_ready(agenda: &Agenda) -> bool {
    gaps(agenda).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agenda::{AgendaKind, AgendaSubmission};

    fn base_agenda() -> Agenda {
        Agenda::new(AgendaSubmission {
            kind: AgendaKind::Directors,
            title: "Annual capital plan".into(),
            director_codes: vec!["D-01".into()],
            initiator_codes: vec!["FIN".into()],
            contact_name: "R. Tanuwidjaja".into(),
            contact_position: "Head of Finance".into(),
            contact_phone: "+62-21-5550101".into(),
            ..Default::default()
        })
    }

    #[test]
    fn test_fill_one_waive_one_is_ready() {
        let mut agenda = base_agenda();
        assert!(!is_ready(&agenda));

        agenda
            .attachments
            .set_document("proposal_note", Some("docs/note.pdf".into()))
            .unwrap();
        agenda.attachments.mark_not_required("study_material", true).unwrap();
        assert!(is_ready(&agenda));
    }

    #[test]
    fn test_scalar_gaps_reported() {
        let mut agenda = base_agenda();
        agenda.title = "  ".into();
        agenda.director_codes.clear();
        agenda.contact.phone = "".into();

        let gaps = gaps(&agenda);
        assert!(gaps.contains(&ReadinessGap::MissingTitle));
        assert!(gaps.contains(&ReadinessGap::NoDirectorCode));
        assert!(gaps.contains(&ReadinessGap::IncompleteContact));
        assert!(!gaps.contains(&ReadinessGap::NoInitiatorCode));
    }

    #[test]
    fn test_unsatisfied_slots_reported_by_label() {
        let agenda = base_agenda();
        let slot_gaps: Vec<_> = gaps(&agenda)
            .into_iter()
            .filter(|g| matches!(g, ReadinessGap::UnsatisfiedSlot { .. }))
            .collect();
        assert_eq!(slot_gaps.len(), 2);
        assert_eq!(
            slot_gaps[0],
            ReadinessGap::UnsatisfiedSlot {
                slot_id: "proposal_note".into(),
                label: "Proposal note".into(),
            }
        );
    }

    #[test]
    fn test_readiness_depends_only_on_snapshot() {
        // same final snapshot through two different edit orders
        let mut left = base_agenda();
        left.attachments
            .set_document("proposal_note", Some("docs/note.pdf".into()))
            .unwrap();
        left.attachments
            .set_document("study_material", Some("docs/study.pdf".into()))
            .unwrap();

        let mut right = base_agenda();
        right
            .attachments
            .set_document("study_material", Some("docs/study.pdf".into()))
            .unwrap();
        right
            .attachments
            .set_document("proposal_note", Some("docs/note.pdf".into()))
            .unwrap();

        assert_eq!(is_ready(&left), is_ready(&right));
        assert!(is_ready(&left));

        // evaluation does not mutate, repeat calls agree
        assert_eq!(is_ready(&left), is_ready(&left));
    }

    #[test]
    fn test_clearing_document_makes_ready_agenda_incomplete() {
        let mut agenda = base_agenda();
        agenda
            .attachments
            .set_document("proposal_note", Some("docs/note.pdf".into()))
            .unwrap();
        agenda
            .attachments
            .set_document("study_material", Some("docs/study.pdf".into()))
            .unwrap();
        assert!(is_ready(&agenda));

        agenda.attachments.set_document("study_material", None).unwrap();
        assert!(!is_ready(&agenda));
    }
}
