//! Distributed repository locks.
//!
//! One document per repository in the hidden lock index. Acquisition is a
//! create-if-absent (`op_type=create`); losing the race means reading the
//! holder and, if its lease has lapsed, deleting it with a compare-and-set
//! keyed on `_seq_no`/`_primary_term` before retrying. A cold start sweeps
//! every lapsed lock.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use curator_client::EsClient;

use crate::deepfreeze::status::LOCK_INDEX;
use crate::error::{Error, Result};

/// How long a lock lives without being released.
pub const LOCK_EXPIRY_SECS: i64 = 2 * 60 * 60;
/// Total wall clock spent trying to acquire before giving up.
pub const ACQUIRE_WALL_SECS: u64 = 30;
const INITIAL_BACKOFF_MS: u64 = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockDoc {
    locked_by: String,
    locked_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// Whether a lock lease has lapsed.
pub fn is_expired(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    expires_at <= now
}

/// An acquired repository lock. Explicitly released; a crashed holder's
/// lock lapses after [`LOCK_EXPIRY_SECS`].
pub struct RepositoryLock {
    client: EsClient,
    repository: String,
    owner: String,
}

impl RepositoryLock {
    /// Acquire the lock for a repository, with bounded exponential backoff.
    pub async fn acquire(client: &EsClient, repository: &str, owner: &str) -> Result<Self> {
        let mut backoff = Duration::from_millis(INITIAL_BACKOFF_MS);
        let mut elapsed = Duration::ZERO;
        let budget = Duration::from_secs(ACQUIRE_WALL_SECS);

        loop {
            let now = Utc::now();
            let doc = LockDoc {
                locked_by: owner.to_string(),
                locked_at: now,
                expires_at: now + chrono::Duration::seconds(LOCK_EXPIRY_SECS),
            };
            if client
                .create_doc(LOCK_INDEX, repository, &serde_json::to_value(&doc)?)
                .await?
            {
                debug!(repository, owner, "acquired repository lock");
                return Ok(Self {
                    client: client.clone(),
                    repository: repository.to_string(),
                    owner: owner.to_string(),
                });
            }

            // Somebody holds it. A lapsed lease is reaped with a CAS delete
            // so two reapers cannot both think they won.
            if let Some(existing) = client.get_doc(LOCK_INDEX, repository).await? {
                let held: LockDoc = serde_json::from_value(existing.source.clone())?;
                if is_expired(held.expires_at, Utc::now()) {
                    warn!(
                        repository,
                        held_by = %held.locked_by,
                        "reaping expired repository lock"
                    );
                    let _ = client
                        .delete_doc(
                            LOCK_INDEX,
                            repository,
                            Some((existing.seq_no, existing.primary_term)),
                        )
                        .await?;
                    continue;
                }
            }

            if elapsed >= budget {
                return Err(Error::LockTimeout(format!(
                    "could not lock repository {} within {}s",
                    repository, ACQUIRE_WALL_SECS
                )));
            }
            tokio::time::sleep(backoff).await;
            elapsed += backoff;
            backoff = (backoff * 2).min(Duration::from_secs(8));
        }
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Release the lock. Absent documents (lease already reaped) are fine.
    pub async fn release(self) -> Result<()> {
        self.client
            .delete_doc(LOCK_INDEX, &self.repository, None)
            .await?;
        debug!(repository = %self.repository, owner = %self.owner, "released repository lock");
        Ok(())
    }
}

/// Cold-start sweep: delete every lapsed lock.
pub async fn sweep_expired_locks(client: &EsClient) -> Result<usize> {
    let docs = client
        .search_docs(LOCK_INDEX, &json!({ "match_all": {} }))
        .await?;
    let now = Utc::now();
    let mut reaped = 0;
    for doc in docs {
        let Ok(held) = serde_json::from_value::<LockDoc>(doc.source.clone()) else {
            continue;
        };
        if is_expired(held.expires_at, now)
            && client
                .delete_doc(LOCK_INDEX, &doc.id, Some((doc.seq_no, doc.primary_term)))
                .await?
        {
            reaped += 1;
        }
    }
    if reaped > 0 {
        debug!(reaped, "swept expired repository locks");
    }
    Ok(reaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_decision() {
        let now = Utc::now();
        assert!(is_expired(now - chrono::Duration::seconds(1), now));
        assert!(is_expired(now, now));
        assert!(!is_expired(now + chrono::Duration::seconds(1), now));
    }

    #[test]
    fn test_lock_doc_round_trip() {
        let now = Utc::now();
        let doc = LockDoc {
            locked_by: "curator-rotate".to_string(),
            locked_at: now,
            expires_at: now + chrono::Duration::seconds(LOCK_EXPIRY_SECS),
        };
        let value = serde_json::to_value(&doc).unwrap();
        let back: LockDoc = serde_json::from_value(value).unwrap();
        assert_eq!(back.locked_by, "curator-rotate");
        assert_eq!(back.expires_at, doc.expires_at);
    }
}
