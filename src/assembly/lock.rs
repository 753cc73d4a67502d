//! Publish locking.
//!
//! Two CI jobs publishing the same stack would race on the manifest. The
//! store keeps a lock record next to the assembly for the duration of a
//! publish; a record older than [`LOCK_EXPIRY_SECS`] is taken over.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ArtifactError, Result};

/// Lock expiry duration in seconds.
pub const LOCK_EXPIRY_SECS: i64 = 300;

/// A publish lock record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishLock {
    /// Unique lock identifier.
    pub lock_id: String,
    /// Publisher holding the lock.
    pub holder: String,
    /// Stack the lock guards.
    pub stack_name: String,
    /// When the lock was acquired.
    pub acquired_at: DateTime<Utc>,
    /// When the lock expires.
    pub expires_at: DateTime<Utc>,
}

impl PublishLock {
    /// Claims the lock of `stack_name` given the record currently stored.
    ///
    /// An empty `holder` is replaced by [`generate_publisher_id`].
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::Locked`] if `current` is still live.
    pub fn claim(current: Option<Self>, holder: &str, stack_name: &str) -> Result<Self> {
        if let Some(current) = current {
            if !current.is_expired() {
                let expires_in = current.remaining_secs();
                return Err(ArtifactError::Locked {
                    holder: current.holder,
                    since: current.acquired_at.to_rfc3339(),
                    expires_in,
                }
                .into());
            }
            tracing::debug!("Taking over expired publish lock {}", current.lock_id);
        }

        let holder = if holder.is_empty() {
            generate_publisher_id()
        } else {
            holder.to_string()
        };

        let now = Utc::now();
        Ok(Self {
            lock_id: Uuid::new_v4().to_string(),
            holder,
            stack_name: stack_name.to_string(),
            acquired_at: now,
            expires_at: now + Duration::seconds(LOCK_EXPIRY_SECS),
        })
    }

    /// Checks if the lock has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Seconds until the lock expires, zero once expired.
    #[must_use]
    pub fn remaining_secs(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds().max(0)
    }
}

/// Identifies the current process as `user@host-pid`.
#[must_use]
pub fn generate_publisher_id() -> String {
    let host = hostname::get().map_or_else(|_| String::from("unknown"), |h| h.to_string_lossy().to_string());
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| String::from("ci"));

    format!("{user}@{host}-{}", std::process::id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EdgestackError;

    #[test]
    fn test_claim_free_lock() {
        let lock = PublishLock::claim(None, "ci-runner", "app-dev").unwrap();
        assert_eq!(lock.holder, "ci-runner");
        assert_eq!(lock.stack_name, "app-dev");
        assert!(!lock.is_expired());
        assert!(lock.remaining_secs() > 0);
    }

    #[test]
    fn test_live_lock_is_refused() {
        let held = PublishLock::claim(None, "job-1", "app-dev").unwrap();
        let err = PublishLock::claim(Some(held), "job-2", "app-dev").unwrap_err();
        assert!(err.to_string().contains("expires in"));

        assert!(matches!(
            err,
            EdgestackError::Artifact(ArtifactError::Locked { ref holder, .. }) if holder == "job-1"
        ));
    }

    #[test]
    fn test_expired_lock_is_taken_over() {
        let mut held = PublishLock::claim(None, "job-1", "app-dev").unwrap();
        held.expires_at = Utc::now() - Duration::seconds(1);
        assert_eq!(held.remaining_secs(), 0);

        let taken = PublishLock::claim(Some(held.clone()), "job-2", "app-dev").unwrap();
        assert_eq!(taken.holder, "job-2");
        assert_ne!(taken.lock_id, held.lock_id);
    }

    #[test]
    fn test_empty_holder_gets_publisher_id() {
        let lock = PublishLock::claim(None, "", "app-dev").unwrap();
        assert!(lock.holder.ends_with(&format!("-{}", std::process::id())));
        assert!(lock.holder.contains('@'));
    }
}
