use serde::{Deserialize, Serialize};

use crate::error::{QuorumError, Result};

use super::AgendaKind;

/// How many files a slot accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SlotCardinality {
    Single,
    Multi,
}

/// Slot state as a tagged variant.
///
/// Requiredness is part of the state, not a separate flag, so a waived
/// required slot and an ordinary optional slot are the same thing and a
/// "waived but still blocking" combination cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    /// Required, no file yet; blocks completeness
    RequiredMissing,
    /// Required and holding at least one file
    RequiredPresent { paths: Vec<String> },
    /// Marked not-required with no file; never blocks
    OptionalSkipped,
    /// Not required but holding files anyway
    OptionalPresent { paths: Vec<String> },
}

impl SlotState {
    /// A slot is satisfied iff it holds a path or is marked not-required.
    pub fn is_satisfied(&self) -> bool {
        !matches!(self, SlotState::RequiredMissing)
    }

    /// Is the slot currently required (waiver not applied)?
    pub fn is_required(&self) -> bool {
        matches!(
            self,
            SlotState::RequiredMissing | SlotState::RequiredPresent { .. }
        )
    }

    pub fn paths(&self) -> &[String] {
        match self {
            SlotState::RequiredPresent { paths } | SlotState::OptionalPresent { paths } => paths,
            _ => &[],
        }
    }

    fn empty(required: bool) -> Self {
        if required {
            SlotState::RequiredMissing
        } else {
            SlotState::OptionalSkipped
        }
    }

    fn present(required: bool, paths: Vec<String>) -> Self {
        if required {
            SlotState::RequiredPresent { paths }
        } else {
            SlotState::OptionalPresent { paths }
        }
    }
}

/// A named document requirement on an agenda
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentSlot {
    pub id: String,
    pub label: String,
    pub cardinality: SlotCardinality,
    pub state: SlotState,
}

impl AttachmentSlot {
    pub fn single(id: impl Into<String>, label: impl Into<String>, required: bool) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            cardinality: SlotCardinality::Single,
            state: SlotState::empty(required),
        }
    }

    pub fn multi(id: impl Into<String>, label: impl Into<String>, required: bool) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            cardinality: SlotCardinality::Multi,
            state: SlotState::empty(required),
        }
    }

    pub fn is_satisfied(&self) -> bool {
        self.state.is_satisfied()
    }

    pub fn paths(&self) -> &[String] {
        self.state.paths()
    }
}

/// Per-agenda document slots plus removals staged until commit.
///
/// `pending_deletes` is in-memory only: discarding an edited copy without
/// saving cancels the staged removals and the stored objects survive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRegistry {
    #[serde(default)]
    slots: Vec<AttachmentSlot>,
    #[serde(skip)]
    pending_deletes: Vec<String>,
}

impl AttachmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot template for an agenda kind
    pub fn for_kind(kind: AgendaKind) -> Self {
        let mut registry = Self::new();
        match kind {
            AgendaKind::Directors => {
                registry.push(AttachmentSlot::single("proposal_note", "Proposal note", true));
                registry.push(AttachmentSlot::single(
                    "study_material",
                    "Study material",
                    true,
                ));
                registry.push(AttachmentSlot::single(
                    "draft_resolution",
                    "Draft resolution",
                    false,
                ));
            }
            AgendaKind::Commissioners => {
                registry.push(AttachmentSlot::single("proposal_note", "Proposal note", true));
                registry.push(AttachmentSlot::single(
                    "directors_recommendation",
                    "Directors' recommendation",
                    true,
                ));
                registry.push(AttachmentSlot::single(
                    "prior_minutes",
                    "Prior meeting minutes",
                    false,
                ));
            }
            AgendaKind::Joint => {
                registry.push(AttachmentSlot::single("proposal_note", "Proposal note", true));
                registry.push(AttachmentSlot::single(
                    "study_material",
                    "Study material",
                    true,
                ));
                registry.push(AttachmentSlot::single(
                    "directors_recommendation",
                    "Directors' recommendation",
                    true,
                ));
            }
        }
        registry.push(AttachmentSlot::multi(
            "supporting_files",
            "Supporting files",
            false,
        ));
        registry
    }

    pub fn register_slot(
        &mut self,
        id: impl Into<String>,
        label: impl Into<String>,
        required: bool,
    ) {
        self.push(AttachmentSlot::single(id, label, required));
    }

    pub fn register_multi(
        &mut self,
        id: impl Into<String>,
        label: impl Into<String>,
        required: bool,
    ) {
        self.push(AttachmentSlot::multi(id, label, required));
    }

    fn push(&mut self, slot: AttachmentSlot) {
        self.slots.push(slot);
    }

    pub fn slots(&self) -> &[AttachmentSlot] {
        &self.slots
    }

    pub fn get(&self, slot_id: &str) -> Option<&AttachmentSlot> {
        self.slots.iter().find(|s| s.id == slot_id)
    }

    fn get_mut(&mut self, slot_id: &str) -> Result<&mut AttachmentSlot> {
        self.slots
            .iter_mut()
            .find(|s| s.id == slot_id)
            .ok_or_else(|| QuorumError::SlotNotFound(slot_id.to_string()))
    }

    /// Set or clear a slot's document. Storing a path is a single-file
    /// operation; `None` empties a slot of either cardinality.
    ///
    /// Displaced prior paths are staged for deferred deletion, not deleted
    /// here.
    pub fn set_document(&mut self, slot_id: &str, path: Option<String>) -> Result<()> {
        let slot = self.get_mut(slot_id)?;
        if path.is_some() && slot.cardinality != SlotCardinality::Single {
            return Err(QuorumError::Validation(format!(
                "slot {} holds multiple files, use append/remove",
                slot_id
            )));
        }
        let required = slot.state.is_required();
        let displaced: Vec<String> = slot.state.paths().to_vec();
        slot.state = match path {
            Some(p) => SlotState::present(required, vec![p]),
            None => SlotState::empty(required),
        };
        self.pending_deletes.extend(displaced);
        Ok(())
    }

    /// Toggle a slot's waiver. Files already present are kept either way.
    pub fn mark_not_required(&mut self, slot_id: &str, waived: bool) -> Result<()> {
        let slot = self.get_mut(slot_id)?;
        let paths = slot.state.paths().to_vec();
        let required = !waived;
        slot.state = if paths.is_empty() {
            SlotState::empty(required)
        } else {
            SlotState::present(required, paths)
        };
        Ok(())
    }

    /// Append one file to a multi-file slot
    pub fn append_file(&mut self, slot_id: &str, path: String) -> Result<()> {
        let slot = self.get_mut(slot_id)?;
        if slot.cardinality != SlotCardinality::Multi {
            return Err(QuorumError::Validation(format!(
                "slot {} holds a single file, use set_document",
                slot_id
            )));
        }
        let required = slot.state.is_required();
        let mut paths = slot.state.paths().to_vec();
        paths.push(path);
        slot.state = SlotState::present(required, paths);
        Ok(())
    }

    /// Remove one file from a multi-file slot by position.
    ///
    /// The removed path is staged for deferred deletion.
    pub fn remove_file(&mut self, slot_id: &str, index: usize) -> Result<()> {
        let slot = self.get_mut(slot_id)?;
        if slot.cardinality != SlotCardinality::Multi {
            return Err(QuorumError::Validation(format!(
                "slot {} holds a single file, use set_document",
                slot_id
            )));
        }
        let required = slot.state.is_required();
        let mut paths = slot.state.paths().to_vec();
        if index >= paths.len() {
            return Err(QuorumError::Validation(format!(
                "slot {} has {} files, index {} out of range",
                slot_id,
                paths.len(),
                index
            )));
        }
        let removed = paths.remove(index);
        slot.state = if paths.is_empty() {
            SlotState::empty(required)
        } else {
            SlotState::present(required, paths)
        };
        self.pending_deletes.push(removed);
        Ok(())
    }

    pub fn is_satisfied(&self, slot_id: &str) -> Result<bool> {
        self.get(slot_id)
            .map(|s| s.is_satisfied())
            .ok_or_else(|| QuorumError::SlotNotFound(slot_id.to_string()))
    }

    /// Are all slots satisfied? Required-missing slots are the only blockers.
    pub fn all_satisfied(&self) -> bool {
        self.slots.iter().all(|s| s.is_satisfied())
    }

    /// Slots currently blocking completeness
    pub fn unsatisfied(&self) -> Vec<&AttachmentSlot> {
        self.slots.iter().filter(|s| !s.is_satisfied()).collect()
    }

    /// Every stored path across all slots (for whole-agenda cleanup)
    pub fn stored_paths(&self) -> Vec<String> {
        self.slots
            .iter()
            .flat_map(|s| s.paths().iter().cloned())
            .collect()
    }

    /// Drain staged removals. Called once after a successful commit.
    pub fn take_pending_deletes(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending_deletes)
    }

    pub fn has_pending_deletes(&self) -> bool {
        !self.pending_deletes.is_empty()
    }
}
