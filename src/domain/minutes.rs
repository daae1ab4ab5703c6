use serde::{Deserialize, Serialize};

/// Per-agenda minutes. Independent per agenda even inside a shared session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Minutes {
    #[serde(default)]
    pub executive_summary: String,
    /// Ordered consideration entries
    #[serde(default)]
    pub considerations: Vec<String>,
    /// Ordered decision entries
    #[serde(default)]
    pub decisions: Vec<String>,
    #[serde(default)]
    pub dissenting_opinion: Option<String>,
}

impl Minutes {
    pub fn is_empty(&self) -> bool {
        self.executive_summary.trim().is_empty()
            && self.considerations.iter().all(|c| c.trim().is_empty())
            && self.decisions.iter().all(|d| d.trim().is_empty())
            && self
                .dissenting_opinion
                .as_deref()
                .map_or(true, |d| d.trim().is_empty())
    }

    /// Finalization requires at least one non-blank decision entry
    pub fn has_decision(&self) -> bool {
        self.decisions.iter().any(|d| !d.trim().is_empty())
    }

    /// Drop blank entries, keeping order
    pub fn prune_blank_entries(&mut self) {
        self.considerations.retain(|c| !c.trim().is_empty());
        self.decisions.retain(|d| !d.trim().is_empty());
        if let Some(d) = &self.dissenting_opinion {
            if d.trim().is_empty() {
                self.dissenting_opinion = None;
            }
        }
    }

    pub fn clear(&mut self) {
        *self = Minutes::default();
    }
}
