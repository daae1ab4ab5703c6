//! Secure document access gateway
//!
//! Every attachment read in the system goes through here: the gateway is the
//! only place that mints signed read references, and the only place that
//! materializes fetched bytes into scratch files for presentation. Scratch
//! copies are tracked with a release deadline independent of the reference
//! TTL and swept once overdue.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapters::{BlobStore, SignedReference};
use crate::config::AccessConfig;
use crate::error::{AccessError, QuorumError, Result};

/// Ephemeral local copy of one fetched attachment.
///
/// Dropping the handle without revoking removes the file best-effort; the
/// sweeper reclaims whatever that misses.
#[derive(Debug)]
pub struct ScratchDocument {
    id: Uuid,
    file: PathBuf,
    release_by: DateTime<Utc>,
    revoked: bool,
}

impl ScratchDocument {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn release_by(&self) -> DateTime<Utc> {
        self.release_by
    }

    pub fn is_overdue(&self) -> bool {
        self.release_by <= Utc::now()
    }
}

impl Drop for ScratchDocument {
    fn drop(&mut self) {
        if !self.revoked {
            let _ = std::fs::remove_file(&self.file);
        }
    }
}

#[derive(Debug, Clone)]
struct ScratchEntry {
    file: PathBuf,
    release_by: DateTime<Utc>,
}

/// Scratch index counters
#[derive(Debug, Clone, Serialize)]
pub struct ScratchStats {
    pub tracked: usize,
    pub overdue: usize,
}

pub struct DocumentGateway {
    blobs: Arc<dyn BlobStore>,
    config: AccessConfig,
    scratch: DashMap<Uuid, ScratchEntry>,
}

impl DocumentGateway {
    pub fn new(blobs: Arc<dyn BlobStore>, config: AccessConfig) -> Self {
        Self {
            blobs,
            config,
            scratch: DashMap::new(),
        }
    }

    /// Mint a short-lived read reference for a stored attachment.
    ///
    /// Each call returns an independent reference; a failed or expired
    /// reference is never refreshed, the caller requests a new one.
    pub async fn request_access(&self, path: &str) -> Result<SignedReference> {
        let ttl = Duration::seconds(self.config.signed_ttl_secs as i64);
        let reference = self.blobs.issue_signed_read(path, ttl).await?;
        debug!(path, expires_at = %reference.expires_at, "issued access reference");
        Ok(reference)
    }

    /// Consume a reference and materialize the bytes as a scratch file
    pub async fn fetch_to_scratch(&self, reference: &SignedReference) -> Result<ScratchDocument> {
        let bytes = self.blobs.read_signed(reference).await?;

        tokio::fs::create_dir_all(&self.config.scratch_dir).await?;
        let id = Uuid::new_v4();
        let file = self.config.scratch_dir.join(id.to_string());
        tokio::fs::write(&file, &bytes).await?;

        let release_by = Utc::now() + Duration::seconds(self.config.scratch_ttl_secs as i64);
        self.scratch.insert(
            id,
            ScratchEntry {
                file: file.clone(),
                release_by,
            },
        );
        debug!(%id, size = bytes.len(), %release_by, "materialized scratch copy");
        Ok(ScratchDocument {
            id,
            file,
            release_by,
            revoked: false,
        })
    }

    /// Explicitly release a scratch copy: delete the file, drop the index
    /// entry, disarm the handle
    pub async fn revoke(&self, mut document: ScratchDocument) -> Result<()> {
        document.revoked = true;
        self.scratch.remove(&document.id);
        match tokio::fs::remove_file(&document.file).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AccessError::ScratchMissing(document.file.display().to_string()).into())
            }
            Err(e) => Err(QuorumError::Io(e)),
        }
    }

    /// Reclaim overdue scratch copies and forget entries whose file is
    /// already gone. A copy whose removal fails stays tracked for the next
    /// pass. Returns how many files were removed.
    pub async fn sweep_scratch(&self) -> Result<usize> {
        let now = Utc::now();
        let candidates: Vec<(Uuid, ScratchEntry)> = self
            .scratch
            .iter()
            .filter(|e| e.value().release_by <= now)
            .map(|e| (*e.key(), e.value().clone()))
            .collect();

        let mut removed = 0;
        for (id, entry) in candidates {
            match tokio::fs::remove_file(&entry.file).await {
                Ok(()) => {
                    self.scratch.remove(&id);
                    removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    self.scratch.remove(&id);
                }
                Err(e) => {
                    // entry stays tracked; the next sweep retries it
                    warn!(%id, file = %entry.file.display(), error = %e, "scratch sweep failed");
                }
            }
        }
        if removed > 0 {
            info!(removed, "swept overdue scratch copies");
        }
        Ok(removed)
    }

    pub fn stats(&self) -> ScratchStats {
        let now = Utc::now();
        let tracked = self.scratch.len();
        let overdue = self
            .scratch
            .iter()
            .filter(|e| e.value().release_by <= now)
            .count();
        ScratchStats { tracked, overdue }
    }
}
