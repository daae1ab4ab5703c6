//! Session composer
//!
//! Orchestrates one live meeting over a set of scheduled agendas:
//! - `compose` builds the working draft: one shared logistics/attendance
//!   record plus an independent minute draft per agenda
//! - `remove_agenda` drops a member mid-meeting, dissolving the session when
//!   the last one goes
//! - `save_progress` persists every member independently and reports which
//!   commits failed; there is no cross-member transaction
//! - `finish` validates every remaining member, then finalizes the whole
//!   group in a single transaction and hands the bundle to the exporter
//!
//! The meeting correlation key is created here and threaded through the
//! calls; nothing session-scoped lives in shared mutable state.

use std::sync::Arc;

use chrono::Datelike;
use futures::future;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapters::{AgendaRepository, MinutesExporter};
use crate::domain::{
    Agenda, AgendaStatus, MemberDraft, RemovalOutcome, SessionDraft, SessionKey, SessionRecord,
};
use crate::error::{QuorumError, Result};

/// Per-member outcome of one `save_progress` pass
#[derive(Debug, Clone, Default)]
pub struct SaveReport {
    pub saved: Vec<Uuid>,
    pub failures: Vec<(Uuid, String)>,
}

impl SaveReport {
    pub fn all_saved(&self) -> bool {
        self.failures.is_empty()
    }

    /// Collapse into an error when any member failed to commit
    pub fn into_result(self) -> Result<Vec<Uuid>> {
        if self.failures.is_empty() {
            Ok(self.saved)
        } else {
            Err(QuorumError::PartialBatch {
                saved: self.saved.len(),
                total: self.saved.len() + self.failures.len(),
                failures: self.failures,
            })
        }
    }
}

pub struct SessionComposer {
    repo: Arc<dyn AgendaRepository>,
    exporter: Arc<dyn MinutesExporter>,
}

impl SessionComposer {
    pub fn new(repo: Arc<dyn AgendaRepository>, exporter: Arc<dyn MinutesExporter>) -> Self {
        Self { repo, exporter }
    }

    /// Open a session over the given scheduled agendas, in the given order.
    ///
    /// All members must be Scheduled, of the same kind, and share one
    /// execution date. Minute drafts are seeded from each agenda's persisted
    /// minutes; the attendance roster defaults every expected director to
    /// present.
    pub async fn compose(&self, agenda_ids: &[Uuid]) -> Result<SessionDraft> {
        if agenda_ids.is_empty() {
            return Err(QuorumError::Validation(
                "a session needs at least one agenda".into(),
            ));
        }

        let mut agendas = Vec::with_capacity(agenda_ids.len());
        for id in agenda_ids {
            agendas.push(self.repo.fetch(*id).await?);
        }

        let kind = agendas[0].kind;
        for agenda in &agendas {
            if agenda.status != AgendaStatus::Scheduled {
                return Err(QuorumError::Validation(format!(
                    "agenda {} is {}, only scheduled agendas can enter a session",
                    agenda.id, agenda.status
                )));
            }
            if agenda.kind != kind {
                return Err(QuorumError::Validation(format!(
                    "agenda {} is a {} item in a {} session",
                    agenda.id, agenda.kind, kind
                )));
            }
        }

        // Scheduled implies the block is present
        let first_schedule = agendas[0]
            .schedule
            .clone()
            .ok_or_else(|| QuorumError::Internal("scheduled agenda without schedule".into()))?;
        for agenda in &agendas[1..] {
            let date = agenda.schedule.as_ref().map(|s| s.execution_date);
            if date != Some(first_schedule.execution_date) {
                return Err(QuorumError::Validation(format!(
                    "agenda {} is scheduled for a different date than the session",
                    agenda.id
                )));
            }
        }

        let year = first_schedule.execution_date.year();
        let meeting_number = self.repo.next_meeting_number(kind, year).await?;
        let key = SessionKey {
            group_id: Uuid::new_v4(),
            meeting_number,
            meeting_year: year,
        };

        let mut record = SessionRecord::new(first_schedule.execution_date);
        record.location = first_schedule.location.clone();
        record.started_at = Some(first_schedule.start_time);
        record.ended_at = first_schedule.end_time;
        record.seed_attendance(roster(&agendas));

        let members = agendas
            .iter()
            .map(|a| MemberDraft {
                agenda_id: a.id,
                title: a.title.clone(),
                minutes: a.minutes.clone(),
            })
            .collect::<Vec<_>>();

        info!(
            "Composed session {} ({} {} agendas on {})",
            key,
            members.len(),
            kind,
            first_schedule.execution_date
        );
        Ok(SessionDraft {
            key,
            record,
            members,
            active_index: 0,
        })
    }

    /// Take one agenda out of a running session.
    ///
    /// The shared record and every other minute draft stay untouched. The
    /// removed agenda's own persisted minutes are cleared; when it was the
    /// sole member the session dissolves and the agenda is rolled back to
    /// the eligible pool.
    pub async fn remove_agenda(
        &self,
        draft: &mut SessionDraft,
        agenda_id: Uuid,
    ) -> Result<RemovalOutcome> {
        if draft.member(agenda_id).is_none() {
            return Err(QuorumError::AgendaNotFound(agenda_id));
        }
        let mut agenda = self.repo.fetch(agenda_id).await?;

        // repo writes land first; the member leaves the draft only once
        // they stick, and a failed removal can be retried
        if draft.members.len() == 1 {
            let transition = agenda.roll_back()?;
            agenda.touch();
            self.repo.update(&agenda).await?;
            // the rollback is committed; a failed audit write must not unwind it
            if let Err(e) = self.repo.record_transition(agenda.id, &transition).await {
                warn!("Audit write failed for agenda {}: {}", agenda.id, e);
            }
            let outcome = draft.remove_member(agenda_id)?;
            info!(
                "Session {} dissolved, agenda {} returned to {}",
                draft.key, agenda_id, transition.to
            );
            Ok(outcome)
        } else {
            agenda.minutes.clear();
            agenda.conduct = None;
            agenda.touch();
            self.repo.update(&agenda).await?;
            let outcome = draft.remove_member(agenda_id)?;
            debug!(
                "Removed agenda {} from session {}, {} members remain",
                agenda_id,
                draft.key,
                draft.members.len()
            );
            Ok(outcome)
        }
    }

    /// Persist the shared record and every member's minutes: N independent
    /// commits, no cross-member transaction. Already-committed members stay
    /// committed when a later one fails; the report says which.
    pub async fn save_progress(&self, draft: &SessionDraft) -> Result<SaveReport> {
        if draft.members.is_empty() {
            return Err(QuorumError::Validation("session has no members".into()));
        }

        let commits = draft.members.iter().map(|member| {
            let record = draft.record.clone();
            async move {
                let result = self.save_member(member, record).await;
                (member.agenda_id, result)
            }
        });

        let mut report = SaveReport::default();
        for (agenda_id, result) in future::join_all(commits).await {
            match result {
                Ok(()) => report.saved.push(agenda_id),
                Err(e) => {
                    warn!("Session save failed for agenda {}: {}", agenda_id, e);
                    report.failures.push((agenda_id, e.to_string()));
                }
            }
        }
        debug!(
            "Saved session {} progress: {} ok, {} failed",
            draft.key,
            report.saved.len(),
            report.failures.len()
        );
        Ok(report)
    }

    /// Close the meeting: every remaining member needs at least one decision
    /// entry, then the whole group flips to Locked in one transaction and
    /// the export collaborator is kicked off in the background. On any
    /// failure no member is modified.
    pub async fn finish(&self, draft: &SessionDraft) -> Result<Vec<Agenda>> {
        if draft.members.is_empty() {
            return Err(QuorumError::Validation("session has no members".into()));
        }
        let undecided = draft.members_without_decision();
        if !undecided.is_empty() {
            let ids = undecided
                .iter()
                .map(Uuid::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(QuorumError::Validation(format!(
                "{} of {} agendas have no decision entry: {}",
                undecided.len(),
                draft.members.len(),
                ids
            )));
        }

        // validate everything before mutating anything
        let mut members = Vec::with_capacity(draft.members.len());
        let mut transitions = Vec::with_capacity(draft.members.len());
        for member in &draft.members {
            let mut agenda = self.repo.fetch(member.agenda_id).await?;
            agenda.conduct = Some(draft.record.clone());
            agenda.minutes = member.minutes.clone();
            agenda.minutes.prune_blank_entries();
            let transition = agenda.lock(draft.key)?;
            agenda.touch();
            transitions.push((agenda.id, transition));
            members.push(agenda);
        }

        self.repo.finalize_group(&members).await?;

        // the group is locked; a failed audit write must not unwind that
        for (agenda_id, transition) in &transitions {
            if let Err(e) = self.repo.record_transition(*agenda_id, transition).await {
                warn!("Audit write failed for agenda {}: {}", agenda_id, e);
            }
        }

        info!(
            "Finalized session {} (group {}) with {} agendas",
            draft.key,
            draft.key.group_id,
            members.len()
        );

        let exporter = self.exporter.clone();
        let key = draft.key;
        tokio::spawn(async move {
            if let Err(e) = exporter.export_group(&key).await {
                warn!("Export failed for group {}: {}", key.group_id, e);
            }
        });

        Ok(members)
    }

    async fn save_member(&self, member: &MemberDraft, record: SessionRecord) -> Result<()> {
        let mut agenda = self.repo.fetch(member.agenda_id).await?;
        if agenda.status != AgendaStatus::Scheduled {
            return Err(QuorumError::Validation(format!(
                "agenda {} is {}, it left the session",
                agenda.id, agenda.status
            )));
        }
        agenda.conduct = Some(record);
        agenda.minutes = member.minutes.clone();
        agenda.minutes.prune_blank_entries();
        agenda.touch();
        self.repo.update(&agenda).await
    }
}

/// Expected participants: every director code across the members, first
/// appearance order, no duplicates
fn roster(agendas: &[Agenda]) -> Vec<String> {
    let mut codes = Vec::new();
    for agenda in agendas {
        for code in &agenda.director_codes {
            if !codes.contains(code) {
                codes.push(code.clone());
            }
        }
    }
    codes
}
