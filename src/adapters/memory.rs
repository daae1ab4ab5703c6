//! In-process repository
//!
//! Backs tests and local dry runs. Mirrors every `AgendaRepository` contract
//! the Postgres adapter honors, including the all-or-nothing bulk delete and
//! the transactional group finalize, plus one-shot failure injection for
//! exercising partial-batch paths.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{Agenda, AgendaKind, AgendaStatus, StatusTransition};
use crate::error::{QuorumError, Result};

use super::AgendaRepository;

#[derive(Default)]
pub struct MemoryStore {
    agendas: RwLock<HashMap<Uuid, Agenda>>,
    transitions: RwLock<HashMap<Uuid, Vec<StatusTransition>>>,
    failing_updates: RwLock<HashSet<Uuid>>,
    failing_finalize: RwLock<bool>,
    failing_transitions: RwLock<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `update` for this agenda fail once
    pub async fn inject_update_failure(&self, id: Uuid) {
        self.failing_updates.write().await.insert(id);
    }

    /// Make the next `finalize_group` fail once
    pub async fn inject_finalize_failure(&self) {
        *self.failing_finalize.write().await = true;
    }

    /// Make the next `record_transition` fail once
    pub async fn inject_transition_failure(&self) {
        *self.failing_transitions.write().await = true;
    }

    pub async fn len(&self) -> usize {
        self.agendas.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.agendas.read().await.is_empty()
    }
}

#[async_trait]
impl AgendaRepository for MemoryStore {
    async fn insert(&self, agenda: &Agenda) -> Result<()> {
        self.agendas.write().await.insert(agenda.id, agenda.clone());
        Ok(())
    }

    async fn update(&self, agenda: &Agenda) -> Result<()> {
        if self.failing_updates.write().await.remove(&agenda.id) {
            return Err(QuorumError::Internal(format!(
                "injected update failure for {}",
                agenda.id
            )));
        }
        let mut agendas = self.agendas.write().await;
        if !agendas.contains_key(&agenda.id) {
            return Err(QuorumError::AgendaNotFound(agenda.id));
        }
        agendas.insert(agenda.id, agenda.clone());
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<Agenda> {
        self.agendas
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(QuorumError::AgendaNotFound(id))
    }

    async fn list_by_status(&self, status: AgendaStatus) -> Result<Vec<Agenda>> {
        let mut matched: Vec<Agenda> = self
            .agendas
            .read()
            .await
            .values()
            .filter(|a| a.status == status)
            .cloned()
            .collect();
        matched.sort_by_key(|a| a.created_at);
        Ok(matched)
    }

    async fn list_by_group(&self, group_id: Uuid) -> Result<Vec<Agenda>> {
        let mut matched: Vec<Agenda> = self
            .agendas
            .read()
            .await
            .values()
            .filter(|a| a.correlation.map(|k| k.group_id) == Some(group_id))
            .cloned()
            .collect();
        matched.sort_by_key(|a| a.created_at);
        Ok(matched)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.agendas
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(QuorumError::AgendaNotFound(id))
    }

    async fn delete_many(&self, ids: &[Uuid]) -> Result<()> {
        let mut agendas = self.agendas.write().await;

        for id in ids {
            if !agendas.contains_key(id) {
                return Err(QuorumError::AgendaNotFound(*id));
            }
        }
        let locked: Vec<Uuid> = ids
            .iter()
            .filter(|id| agendas[id].status.is_locked())
            .copied()
            .collect();
        if !locked.is_empty() {
            return Err(QuorumError::LockedBatch { ids: locked });
        }

        for id in ids {
            agendas.remove(id);
        }
        Ok(())
    }

    async fn next_meeting_number(&self, kind: AgendaKind, year: i32) -> Result<i32> {
        let max = self
            .agendas
            .read()
            .await
            .values()
            .filter(|a| a.kind == kind)
            .filter_map(|a| a.correlation)
            .filter(|k| k.meeting_year == year)
            .map(|k| k.meeting_number)
            .max()
            .unwrap_or(0);
        Ok(max + 1)
    }

    async fn finalize_group(&self, members: &[Agenda]) -> Result<()> {
        if std::mem::take(&mut *self.failing_finalize.write().await) {
            return Err(QuorumError::Internal("injected finalize failure".into()));
        }
        let mut agendas = self.agendas.write().await;
        for member in members {
            if !agendas.contains_key(&member.id) {
                return Err(QuorumError::AgendaNotFound(member.id));
            }
        }
        for member in members {
            agendas.insert(member.id, member.clone());
        }
        Ok(())
    }

    async fn record_transition(
        &self,
        agenda_id: Uuid,
        transition: &StatusTransition,
    ) -> Result<()> {
        if std::mem::take(&mut *self.failing_transitions.write().await) {
            return Err(QuorumError::Internal("injected transition failure".into()));
        }
        self.transitions
            .write()
            .await
            .entry(agenda_id)
            .or_default()
            .push(transition.clone());
        Ok(())
    }

    async fn transitions(&self, agenda_id: Uuid) -> Result<Vec<StatusTransition>> {
        Ok(self
            .transitions
            .read()
            .await
            .get(&agenda_id)
            .cloned()
            .unwrap_or_default())
    }
}
