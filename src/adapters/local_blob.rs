//! Filesystem blob store
//!
//! Objects live under one root directory. Read references are self-validating
//! `local://` URLs carrying an expiry, a nonce and an HMAC-SHA256 signature,
//! so no server-side reference table is needed: a reference simply stops
//! verifying once its expiry passes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::error::{AccessError, QuorumError, Result, StorageError};

use super::{BlobStore, SignedReference};

type HmacSha256 = Hmac<Sha256>;

pub struct LocalBlobStore {
    root: PathBuf,
    key: Vec<u8>,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, key: impl Into<Vec<u8>>) -> Self {
        Self {
            root: root.into(),
            key: key.into(),
        }
    }

    /// Map a logical object path onto the root, refusing escapes
    fn object_path(&self, path: &str) -> Result<PathBuf> {
        if path.is_empty() {
            return Err(QuorumError::Validation("object path is empty".into()));
        }
        let relative = Path::new(path);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(QuorumError::Validation(format!(
                "object path escapes storage root: {}",
                path
            )));
        }
        Ok(self.root.join(relative))
    }

    fn sign(&self, path: &str, expires_unix: i64, nonce: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| QuorumError::Internal(format!("HMAC key rejected: {}", e)))?;
        mac.update(format!("{}|{}|{}", path, expires_unix, nonce).as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn verify(&self, path: &str, expires_unix: i64, nonce: &str, signature: &str) -> Result<()> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| QuorumError::Internal(format!("HMAC key rejected: {}", e)))?;
        mac.update(format!("{}|{}|{}", path, expires_unix, nonce).as_bytes());
        let bytes = hex::decode(signature)
            .map_err(|_| AccessError::Malformed("signature is not hex".into()))?;
        mac.verify_slice(&bytes)
            .map_err(|_| AccessError::BadSignature)?;
        Ok(())
    }

    /// Pull path, expiry, nonce and signature back out of a reference URL
    fn parse_reference(url: &str) -> Result<(String, i64, String, String)> {
        let parsed =
            Url::parse(url).map_err(|e| AccessError::Malformed(format!("bad URL: {}", e)))?;
        if parsed.scheme() != "local" {
            return Err(AccessError::Malformed(format!(
                "unexpected scheme: {}",
                parsed.scheme()
            ))
            .into());
        }
        let encoded = parsed.path().trim_start_matches('/');
        let path = urlencoding::decode(encoded)
            .map_err(|e| AccessError::Malformed(format!("bad path encoding: {}", e)))?
            .into_owned();

        let mut expires_unix = None;
        let mut nonce = None;
        let mut signature = None;
        for (name, value) in parsed.query_pairs() {
            match name.as_ref() {
                "exp" => expires_unix = value.parse::<i64>().ok(),
                "n" => nonce = Some(value.into_owned()),
                "sig" => signature = Some(value.into_owned()),
                _ => {}
            }
        }
        let expires_unix =
            expires_unix.ok_or_else(|| AccessError::Malformed("missing exp".into()))?;
        let nonce = nonce.ok_or_else(|| AccessError::Malformed("missing nonce".into()))?;
        let signature = signature.ok_or_else(|| AccessError::Malformed("missing sig".into()))?;
        Ok((path, expires_unix, nonce, signature))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let target = self.object_path(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::WriteFailed {
                    path: path.to_string(),
                    reason: e.to_string(),
                })?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .map_err(|e| StorageError::WriteFailed {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        debug!(path, size = bytes.len(), "stored object");
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let target = self.object_path(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => {
                debug!(path, "deleted object");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound {
                    path: path.to_string(),
                }
                .into())
            }
            Err(e) => Err(StorageError::DeleteFailed {
                path: path.to_string(),
                reason: e.to_string(),
            }
            .into()),
        }
    }

    async fn issue_signed_read(&self, path: &str, ttl: Duration) -> Result<SignedReference> {
        let target = self.object_path(path)?;
        if !tokio::fs::try_exists(&target).await.unwrap_or(false) {
            return Err(StorageError::NotFound {
                path: path.to_string(),
            }
            .into());
        }

        let expires_at = Utc::now() + ttl;
        let expires_unix = expires_at.timestamp();
        let nonce = hex::encode(rand::random::<[u8; 8]>());
        let signature = self.sign(path, expires_unix, &nonce)?;
        let url = format!(
            "local:///{}?exp={}&n={}&sig={}",
            urlencoding::encode(path),
            expires_unix,
            nonce,
            signature
        );
        Ok(SignedReference { url, expires_at })
    }

    async fn read_signed(&self, reference: &SignedReference) -> Result<Vec<u8>> {
        let (path, expires_unix, nonce, signature) = Self::parse_reference(&reference.url)?;
        self.verify(&path, expires_unix, &nonce, &signature)?;

        let expires_at = Utc
            .timestamp_opt(expires_unix, 0)
            .single()
            .ok_or_else(|| AccessError::Malformed("exp out of range".into()))?;
        if expires_at <= Utc::now() {
            return Err(AccessError::Expired { expired_at: expires_at }.into());
        }

        let target = self.object_path(&path)?;
        tokio::fs::read(&target).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound { path }.into()
            } else {
                QuorumError::Io(e)
            }
        })
    }
}

/// Object key for an uploaded attachment, unique per upload
pub fn attachment_path(agenda_id: Uuid, slot_id: &str, filename: &str) -> String {
    let safe_name: String = filename
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "agendas/{}/{}/{}-{}",
        agenda_id,
        slot_id,
        &Uuid::new_v4().to_string()[..8],
        safe_name
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store(dir: &tempfile::TempDir) -> LocalBlobStore {
        LocalBlobStore::new(dir.path(), b"test-signing-key".to_vec())
    }

    #[tokio::test]
    async fn test_put_then_read_through_signed_reference() {
        let dir = tempdir().unwrap();
        let blobs = store(&dir);
        blobs.put("agendas/1/note.pdf", b"note body").await.unwrap();

        let reference = blobs
            .issue_signed_read("agendas/1/note.pdf", Duration::minutes(5))
            .await
            .unwrap();
        assert!(!reference.is_expired());

        let bytes = blobs.read_signed(&reference).await.unwrap();
        assert_eq!(bytes, b"note body");
    }

    #[tokio::test]
    async fn test_two_requests_yield_independent_references() {
        let dir = tempdir().unwrap();
        let blobs = store(&dir);
        blobs.put("agendas/1/note.pdf", b"x").await.unwrap();

        let first = blobs
            .issue_signed_read("agendas/1/note.pdf", Duration::minutes(5))
            .await
            .unwrap();
        let second = blobs
            .issue_signed_read("agendas/1/note.pdf", Duration::minutes(5))
            .await
            .unwrap();

        assert_ne!(first.url, second.url);
        assert_eq!(blobs.read_signed(&first).await.unwrap(), b"x");
        assert_eq!(blobs.read_signed(&second).await.unwrap(), b"x");
    }

    #[tokio::test]
    async fn test_expired_reference_fails_without_touching_object() {
        let dir = tempdir().unwrap();
        let blobs = store(&dir);
        blobs.put("agendas/1/note.pdf", b"kept").await.unwrap();

        let stale = blobs
            .issue_signed_read("agendas/1/note.pdf", Duration::seconds(-1))
            .await
            .unwrap();
        let err = stale.url.clone();
        match blobs.read_signed(&stale).await.unwrap_err() {
            QuorumError::Access(AccessError::Expired { .. }) => {}
            other => panic!("unexpected error for {err}: {other}"),
        }

        // the stored object is untouched and a fresh reference still works
        let fresh = blobs
            .issue_signed_read("agendas/1/note.pdf", Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(blobs.read_signed(&fresh).await.unwrap(), b"kept");
    }

    #[tokio::test]
    async fn test_tampered_signature_rejected() {
        let dir = tempdir().unwrap();
        let blobs = store(&dir);
        blobs.put("agendas/1/note.pdf", b"x").await.unwrap();
        blobs.put("agendas/1/other.pdf", b"y").await.unwrap();

        let mut reference = blobs
            .issue_signed_read("agendas/1/note.pdf", Duration::minutes(5))
            .await
            .unwrap();

        // flip the last signature character
        let flipped = if reference.url.ends_with('0') { "1" } else { "0" };
        reference.url.pop();
        reference.url.push_str(flipped);
        assert!(matches!(
            blobs.read_signed(&reference).await.unwrap_err(),
            QuorumError::Access(AccessError::BadSignature)
        ));

        // swapping the path under an otherwise valid signature also fails
        let valid = blobs
            .issue_signed_read("agendas/1/note.pdf", Duration::minutes(5))
            .await
            .unwrap();
        let swapped = SignedReference {
            url: valid.url.replace("note.pdf", "other.pdf"),
            expires_at: valid.expires_at,
        };
        assert!(matches!(
            blobs.read_signed(&swapped).await.unwrap_err(),
            QuorumError::Access(AccessError::BadSignature)
        ));
    }

    #[tokio::test]
    async fn test_signing_missing_object_fails() {
        let dir = tempdir().unwrap();
        let blobs = store(&dir);
        assert!(matches!(
            blobs
                .issue_signed_read("agendas/1/ghost.pdf", Duration::minutes(5))
                .await
                .unwrap_err(),
            QuorumError::Storage(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_path_escape_rejected() {
        let dir = tempdir().unwrap();
        let blobs = store(&dir);
        assert!(blobs.put("../outside.pdf", b"x").await.is_err());
        assert!(blobs.put("/etc/passwd", b"x").await.is_err());
        assert!(blobs.delete("a/../../b").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_missing_object() {
        let dir = tempdir().unwrap();
        let blobs = store(&dir);
        assert!(matches!(
            blobs.delete("agendas/1/ghost.pdf").await.unwrap_err(),
            QuorumError::Storage(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn test_attachment_path_sanitizes_filename() {
        let id = Uuid::new_v4();
        let path = attachment_path(id, "proposal_note", "q3 plan (final).pdf");
        assert!(path.starts_with(&format!("agendas/{}/proposal_note/", id)));
        assert!(path.ends_with("q3_plan__final_.pdf"));
        assert!(!path.contains(' '));
    }
}
