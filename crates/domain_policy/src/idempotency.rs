//! Request-level mutual exclusion
//!
//! Acceptance runs under two families of locks: one request key derived from
//! the order number plus the party set, and one key per insured derived from
//! the plan and the insured's primary fields. Contended keys are polled with
//! a randomised backoff; a request that cannot take its keys within the
//! ceiling is turned away as unavailable rather than queued forever.

use std::sync::Arc;
use std::time::Duration;

use core_kernel::{fingerprint, person_set_fingerprint, LockStore, ServiceError, ServiceResult};
use rand::Rng;
use uuid::Uuid;

use crate::draft::{ApplicantDraft, InsuredDraft};

/// Total time a request may spend waiting on contended keys.
const WAIT_CEILING: Duration = Duration::from_millis(10_000);

/// Backoff bounds between polls, in milliseconds.
const BACKOFF_MS: std::ops::RangeInclusive<u64> = 200..=1000;

/// How a key was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquisition {
    /// Taken on the first attempt; this request is the primary holder.
    Owner,
    /// Taken after another holder released it; the caller should re-check
    /// state that the previous holder may have written.
    AfterWait,
}

/// Tracks which keys this request actually holds, so release never touches
/// a key some other request still owns.
pub struct LockSet {
    locks: Arc<dyn LockStore>,
    held: Vec<String>,
}

impl LockSet {
    pub fn new(locks: Arc<dyn LockStore>) -> Self {
        Self { locks, held: Vec::new() }
    }

    /// Acquires a single key, polling while contended.
    pub async fn acquire(&mut self, key: &str) -> ServiceResult<Acquisition> {
        if self.locks.try_acquire(key).await? {
            self.held.push(key.to_string());
            return Ok(Acquisition::Owner);
        }
        self.wait_for(std::slice::from_ref(&key.to_string())).await?;
        Ok(Acquisition::AfterWait)
    }

    /// Acquires every key in `keys`, polling the contended remainder.
    pub async fn acquire_all(&mut self, keys: &[String]) -> ServiceResult<Acquisition> {
        let mut contended = Vec::new();
        for key in keys {
            if self.locks.try_acquire(key).await? {
                self.held.push(key.clone());
            } else {
                contended.push(key.clone());
            }
        }
        if contended.is_empty() {
            return Ok(Acquisition::Owner);
        }
        self.wait_for(&contended).await?;
        Ok(Acquisition::AfterWait)
    }

    async fn wait_for(&mut self, keys: &[String]) -> ServiceResult<()> {
        let mut pending: Vec<String> = keys.to_vec();
        let mut waited = Duration::ZERO;
        while !pending.is_empty() {
            if waited >= WAIT_CEILING {
                return Err(ServiceError::unavailable(
                    "the request conflicts with one still in flight, try again later",
                ));
            }
            let backoff = Duration::from_millis(rand::thread_rng().gen_range(BACKOFF_MS));
            tokio::time::sleep(backoff).await;
            waited += backoff;

            let mut still_pending = Vec::new();
            for key in pending {
                if self.locks.try_acquire(&key).await? {
                    self.held.push(key);
                } else {
                    still_pending.push(key);
                }
            }
            pending = still_pending;
        }
        Ok(())
    }

    /// Releases every held key. Failures are logged and swallowed; by this
    /// point the request outcome is already decided.
    pub async fn release_all(mut self) {
        for key in self.held.drain(..) {
            if let Err(err) = self.locks.release(&key).await {
                tracing::warn!(key = %key, error = %err, "failed to release lock key");
            }
        }
    }
}

/// Key guarding one acceptance request: the order number plus the identity
/// set of all parties, so a replay with the same parties maps to the same
/// key while a different party set under a reused order number does not.
pub fn accept_request_key(
    order_no: &str,
    producer_id: Uuid,
    applicants: &[ApplicantDraft],
    insureds: &[InsuredDraft],
) -> String {
    let applicant_ids: Vec<Vec<String>> = applicants.iter().map(applicant_identity).collect();
    let insured_ids: Vec<Vec<String>> = insureds.iter().map(insured_identity).collect();
    let digest = fingerprint(&[
        order_no.to_string(),
        producer_id.to_string(),
        person_set_fingerprint(&applicant_ids),
        person_set_fingerprint(&insured_ids),
    ]);
    format!("accept:{digest}")
}

/// Key guarding one insured's primary-field identity on a plan.
pub fn insured_key(
    product_id: Uuid,
    product_version: &str,
    plan_id: Uuid,
    primary_values: &[String],
) -> String {
    let mut parts = vec![
        product_id.to_string(),
        product_version.to_string(),
        plan_id.to_string(),
    ];
    parts.extend_from_slice(primary_values);
    format!("accept-insured:{}", fingerprint(&parts))
}

fn applicant_identity(a: &ApplicantDraft) -> Vec<String> {
    vec![
        a.name.clone().unwrap_or_default(),
        a.id_type.clone().unwrap_or_default(),
        a.id_no.clone().unwrap_or_default(),
    ]
}

fn insured_identity(i: &InsuredDraft) -> Vec<String> {
    vec![
        i.name.clone().unwrap_or_default(),
        i.id_type.clone().unwrap_or_default(),
        i.id_no.clone().unwrap_or_default(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    use async_trait::async_trait;

    #[derive(Default)]
    struct MemoryLocks {
        held: Mutex<HashSet<String>>,
    }

    #[async_trait]
    impl LockStore for MemoryLocks {
        async fn try_acquire(&self, key: &str) -> ServiceResult<bool> {
            Ok(self.held.lock().unwrap().insert(key.to_string()))
        }

        async fn release(&self, key: &str) -> ServiceResult<()> {
            self.held.lock().unwrap().remove(key);
            Ok(())
        }
    }

    fn person(name: &str, id_no: &str) -> InsuredDraft {
        InsuredDraft {
            name: Some(name.into()),
            id_type: Some("idcard".into()),
            id_no: Some(id_no.into()),
            ..Default::default()
        }
    }

    #[test]
    fn request_key_ignores_party_order() {
        let producer = Uuid::new_v4();
        let a = vec![person("a", "1"), person("b", "2")];
        let b = vec![person("b", "2"), person("a", "1")];
        assert_eq!(
            accept_request_key("ORD", producer, &[], &a),
            accept_request_key("ORD", producer, &[], &b),
        );
    }

    #[test]
    fn request_key_changes_with_party_identity() {
        let producer = Uuid::new_v4();
        let a = vec![person("a", "1")];
        let b = vec![person("a", "2")];
        assert_ne!(
            accept_request_key("ORD", producer, &[], &a),
            accept_request_key("ORD", producer, &[], &b),
        );
    }

    #[tokio::test]
    async fn first_holder_owns_and_release_frees_only_held_keys() {
        let locks: Arc<dyn LockStore> = Arc::new(MemoryLocks::default());

        let mut first = LockSet::new(Arc::clone(&locks));
        assert_eq!(first.acquire("k1").await.unwrap(), Acquisition::Owner);

        // A second set holding a different key must not free k1.
        let mut second = LockSet::new(Arc::clone(&locks));
        assert_eq!(second.acquire("k2").await.unwrap(), Acquisition::Owner);
        second.release_all().await;
        assert!(!locks.try_acquire("k1").await.unwrap());

        first.release_all().await;
        assert!(locks.try_acquire("k1").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn contended_key_is_acquired_once_released() {
        let locks: Arc<dyn LockStore> = Arc::new(MemoryLocks::default());
        assert!(locks.try_acquire("k").await.unwrap());

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let mut set = LockSet::new(locks);
                let got = set.acquire("k").await;
                set.release_all().await;
                got
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        locks.release("k").await.unwrap();

        assert_eq!(waiter.await.unwrap().unwrap(), Acquisition::AfterWait);
    }

    #[tokio::test(start_paused = true)]
    async fn never_released_key_times_out_as_unavailable() {
        let locks: Arc<dyn LockStore> = Arc::new(MemoryLocks::default());
        assert!(locks.try_acquire("k").await.unwrap());

        let mut set = LockSet::new(Arc::clone(&locks));
        let err = set.acquire("k").await.unwrap_err();
        assert_eq!(err.http_status(), 503);
        set.release_all().await;
    }
}
