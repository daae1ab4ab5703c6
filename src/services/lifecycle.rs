//! Agenda lifecycle service
//!
//! Action boundary for everything that happens to a single agenda outside a
//! live session:
//! - proposal, scalar edits, deletion (with the locked-status guards)
//! - document upload/removal/waiver against the slot registry
//! - scheduling and rollback
//!
//! Every save recomputes the Draft/Ready label fresh, and every status flip
//! is appended to the transition audit trail. Blob removals staged by the
//! registry are executed only after the owning record has persisted.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapters::{local_blob::attachment_path, AgendaRepository, BlobStore};
use crate::domain::completeness::{self, ReadinessGap};
use crate::domain::{Agenda, AgendaStatus, AgendaSubmission, Schedule, StatusTransition};
use crate::error::{QuorumError, Result};

pub struct AgendaLifecycle {
    repo: Arc<dyn AgendaRepository>,
    blobs: Arc<dyn BlobStore>,
}

impl AgendaLifecycle {
    pub fn new(repo: Arc<dyn AgendaRepository>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { repo, blobs }
    }

    /// Capture a new proposal as a Draft
    pub async fn propose(&self, submission: AgendaSubmission) -> Result<Agenda> {
        let mut agenda = Agenda::new(submission);
        agenda.relabel();
        self.repo.insert(&agenda).await?;
        info!(
            "Proposed agenda {} ({}) \"{}\"",
            agenda.id, agenda.kind, agenda.title
        );
        Ok(agenda)
    }

    pub async fn get(&self, id: Uuid) -> Result<Agenda> {
        self.repo.fetch(id).await
    }

    /// List agendas in one lifecycle state, or across all of them
    pub async fn list(&self, status: Option<AgendaStatus>) -> Result<Vec<Agenda>> {
        match status {
            Some(status) => self.repo.list_by_status(status).await,
            None => {
                let mut all = Vec::new();
                for status in AgendaStatus::ALL {
                    all.extend(self.repo.list_by_status(status).await?);
                }
                Ok(all)
            }
        }
    }

    /// Status audit trail, oldest first
    pub async fn history(&self, id: Uuid) -> Result<Vec<StatusTransition>> {
        self.repo.fetch(id).await?;
        self.repo.transitions(id).await
    }

    /// What still blocks readiness for this agenda
    pub async fn gaps(&self, id: Uuid) -> Result<Vec<ReadinessGap>> {
        let agenda = self.repo.fetch(id).await?;
        Ok(completeness::gaps(&agenda))
    }

    /// Persist scalar edits. Refused once the agenda is bound to a meeting.
    pub async fn save(&self, id: Uuid, submission: AgendaSubmission) -> Result<Agenda> {
        let mut agenda = self.repo.fetch(id).await?;
        if agenda.is_locked() {
            return Err(QuorumError::Locked(id));
        }
        agenda.apply_submission(submission)?;
        let transition = agenda.relabel();
        self.persist(&mut agenda, transition).await?;
        Ok(agenda)
    }

    /// Store a document into a single-file slot, replacing any prior file
    pub async fn upload_document(
        &self,
        id: Uuid,
        slot_id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<Agenda> {
        let mut agenda = self.fetch_editable(id).await?;
        let path = attachment_path(id, slot_id, filename);
        self.blobs.put(&path, bytes).await?;

        if let Err(e) = self.stage_and_persist(&mut agenda, |a| {
            a.attachments.set_document(slot_id, Some(path.clone()))
        })
        .await
        {
            self.discard_orphan(&path).await;
            return Err(e);
        }
        debug!("Stored {} into slot {} of agenda {}", path, slot_id, id);
        Ok(agenda)
    }

    /// Append a document to a multi-file slot
    pub async fn append_document(
        &self,
        id: Uuid,
        slot_id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<Agenda> {
        let mut agenda = self.fetch_editable(id).await?;
        let path = attachment_path(id, slot_id, filename);
        self.blobs.put(&path, bytes).await?;

        if let Err(e) = self.stage_and_persist(&mut agenda, |a| {
            a.attachments.append_file(slot_id, path.clone())
        })
        .await
        {
            self.discard_orphan(&path).await;
            return Err(e);
        }
        debug!("Appended {} to slot {} of agenda {}", path, slot_id, id);
        Ok(agenda)
    }

    /// Clear a single-file slot. The stored object is deleted only after the
    /// cleared record persists.
    pub async fn clear_document(&self, id: Uuid, slot_id: &str) -> Result<Agenda> {
        let mut agenda = self.fetch_editable(id).await?;
        self.stage_and_persist(&mut agenda, |a| a.attachments.set_document(slot_id, None))
            .await?;
        Ok(agenda)
    }

    /// Remove one file from a multi-file slot by position
    pub async fn remove_file(&self, id: Uuid, slot_id: &str, index: usize) -> Result<Agenda> {
        let mut agenda = self.fetch_editable(id).await?;
        self.stage_and_persist(&mut agenda, |a| a.attachments.remove_file(slot_id, index))
            .await?;
        Ok(agenda)
    }

    /// Waive or reinstate a slot requirement
    pub async fn waive_slot(&self, id: Uuid, slot_id: &str, waived: bool) -> Result<Agenda> {
        let mut agenda = self.fetch_editable(id).await?;
        self.stage_and_persist(&mut agenda, |a| {
            a.attachments.mark_not_required(slot_id, waived)
        })
        .await?;
        Ok(agenda)
    }

    /// Assign a meeting date to a Ready agenda
    pub async fn schedule(&self, id: Uuid, schedule: Schedule) -> Result<Agenda> {
        let mut agenda = self.repo.fetch(id).await?;
        let transition = agenda.assign_schedule(schedule)?;
        self.persist(&mut agenda, Some(transition)).await?;
        info!(
            "Scheduled agenda {} for {}",
            id,
            agenda
                .schedule
                .as_ref()
                .map(|s| s.execution_date.to_string())
                .unwrap_or_default()
        );
        Ok(agenda)
    }

    /// Take a Scheduled agenda back off its meeting date. The landing status
    /// is recomputed, so it may be Draft when documents were removed in the
    /// meantime.
    pub async fn rollback(&self, id: Uuid) -> Result<Agenda> {
        let mut agenda = self.repo.fetch(id).await?;
        let transition = agenda.roll_back()?;
        let landed = transition.to;
        self.persist(&mut agenda, Some(transition)).await?;
        info!("Rolled back agenda {} to {}", id, landed);
        Ok(agenda)
    }

    /// Delete one agenda and its stored documents. Refused once bound to a
    /// meeting.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let agenda = self.repo.fetch(id).await?;
        if !agenda.status.is_deletable() {
            return Err(QuorumError::Locked(id));
        }
        let paths = agenda.attachments.stored_paths();
        self.repo.delete(id).await?;
        self.cleanup_blobs(&paths).await;
        info!("Deleted agenda {}", id);
        Ok(())
    }

    /// All-or-nothing bulk delete. Any missing or meeting-bound id rejects
    /// the whole batch and nothing is deleted.
    pub async fn delete_many(&self, ids: &[Uuid]) -> Result<()> {
        let mut paths = Vec::new();
        let mut locked = Vec::new();
        for id in ids {
            let agenda = self.repo.fetch(*id).await?;
            if agenda.status.is_locked() {
                locked.push(*id);
            } else {
                paths.extend(agenda.attachments.stored_paths());
            }
        }
        if !locked.is_empty() {
            return Err(QuorumError::LockedBatch { ids: locked });
        }

        self.repo.delete_many(ids).await?;
        self.cleanup_blobs(&paths).await;
        info!("Deleted {} agendas", ids.len());
        Ok(())
    }

    /// Fetch for a document mutation. Only a finalized record refuses these;
    /// a Scheduled agenda still accepts document changes and its label is
    /// re-derived at the next rollback.
    async fn fetch_editable(&self, id: Uuid) -> Result<Agenda> {
        let agenda = self.repo.fetch(id).await?;
        if agenda.status.is_final() {
            return Err(QuorumError::Locked(id));
        }
        Ok(agenda)
    }

    /// Run a registry mutation, relabel, persist, then flush staged blob
    /// removals
    async fn stage_and_persist<F>(&self, agenda: &mut Agenda, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut Agenda) -> Result<()>,
    {
        mutate(agenda)?;
        let transition = agenda.relabel();
        self.persist(agenda, transition).await
    }

    /// Take staged deletes, touch, update, audit, flush
    async fn persist(
        &self,
        agenda: &mut Agenda,
        transition: Option<StatusTransition>,
    ) -> Result<()> {
        // staged deletes come out before the write; the stored record
        // never carries them and a failed update flushes nothing
        let staged = agenda.attachments.take_pending_deletes();
        agenda.touch();
        self.repo.update(agenda).await?;
        if let Some(transition) = &transition {
            // the record is committed; a failed audit write must not unwind that
            match self.repo.record_transition(agenda.id, transition).await {
                Ok(()) => debug!(
                    "Agenda {} moved {} -> {}",
                    agenda.id, transition.from, transition.to
                ),
                Err(e) => warn!("Audit write failed for agenda {}: {}", agenda.id, e),
            }
        }
        self.cleanup_blobs(&staged).await;
        Ok(())
    }

    /// Best-effort blob removals after a successful commit; failures are
    /// logged and never fail the action
    async fn cleanup_blobs(&self, paths: &[String]) {
        for path in paths {
            if let Err(e) = self.blobs.delete(path).await {
                warn!("Deferred delete failed for {}: {}", path, e);
            }
        }
    }

    /// A document was stored but the record failed to persist; try to take
    /// the object back out
    async fn discard_orphan(&self, path: &str) {
        if let Err(e) = self.blobs.delete(path).await {
            warn!("Could not remove orphaned upload {}: {}", path, e);
        }
    }
}
