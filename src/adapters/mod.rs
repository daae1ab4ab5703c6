pub mod local_blob;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Agenda, AgendaKind, AgendaStatus, SessionKey, StatusTransition};
use crate::error::Result;

pub use local_blob::LocalBlobStore;
pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Short-lived read reference minted by a blob store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedReference {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

impl SignedReference {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Persistence collaborator for agenda records
#[async_trait]
pub trait AgendaRepository: Send + Sync {
    async fn insert(&self, agenda: &Agenda) -> Result<()>;

    async fn update(&self, agenda: &Agenda) -> Result<()>;

    async fn fetch(&self, id: Uuid) -> Result<Agenda>;

    async fn list_by_status(&self, status: AgendaStatus) -> Result<Vec<Agenda>>;

    async fn list_by_group(&self, group_id: Uuid) -> Result<Vec<Agenda>>;

    async fn delete(&self, id: Uuid) -> Result<()>;

    /// All-or-nothing bulk delete. Must reject the whole batch when any id
    /// is missing or bound to a meeting, naming the blockers.
    async fn delete_many(&self, ids: &[Uuid]) -> Result<()>;

    /// Next sequence number for a meeting of this kind in this year
    async fn next_meeting_number(&self, kind: AgendaKind, year: i32) -> Result<i32>;

    /// Persist every member of a finalized session in one transaction; on
    /// failure no member row changes.
    async fn finalize_group(&self, members: &[Agenda]) -> Result<()>;

    async fn record_transition(
        &self,
        agenda_id: Uuid,
        transition: &StatusTransition,
    ) -> Result<()>;

    async fn transitions(&self, agenda_id: Uuid) -> Result<Vec<StatusTransition>>;
}

/// Blob storage collaborator. Consumers never build storage URLs themselves;
/// reads go through `issue_signed_read` + `read_signed`.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<()>;

    async fn delete(&self, path: &str) -> Result<()>;

    async fn issue_signed_read(&self, path: &str, ttl: Duration) -> Result<SignedReference>;

    /// Fetch bytes through a previously issued reference. Fails once the
    /// reference has expired, without touching the stored object.
    async fn read_signed(&self, reference: &SignedReference) -> Result<Vec<u8>>;
}

/// Export/report collaborator, invoked only after a session finalizes
#[async_trait]
pub trait MinutesExporter: Send + Sync {
    async fn export_group(&self, key: &SessionKey) -> Result<()>;
}
