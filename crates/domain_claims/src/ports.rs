//! Persistence and delivery ports for the claims side

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_kernel::ServiceResult;
use domain_policy::PolicyBundle;
use rust_decimal::Decimal;
use serde_json::Value;
use uuid::Uuid;

use crate::model::{ClaimRecord, CompensationTask, NotifyTask};

/// A due compensation task joined to its claim and policy.
#[derive(Debug, Clone)]
pub struct CompensationWorkItem {
    pub task: CompensationTask,
    pub claim: ClaimRecord,
    pub policy: PolicyBundle,
}

/// Everything a successful settlement writes, applied atomically: the claim
/// moves to `paying` with its sums, the task finishes, and a notification
/// task is queued.
#[derive(Debug, Clone)]
pub struct CompensationOutcome {
    pub task_id: Uuid,
    pub claim_id: Uuid,
    pub sum_insured: Decimal,
    /// Per-insured sums, keyed by policy insured number.
    pub insured_sums: Vec<(String, Decimal)>,
    pub notify: NotifyTask,
    pub finished_at: DateTime<Utc>,
}

#[async_trait]
pub trait ClaimStore: Send + Sync + 'static {
    async fn find_by_claim_no(&self, claim_no: &str) -> ServiceResult<Option<ClaimRecord>>;

    /// True when the policy already has a claim still pending.
    async fn pending_claim_exists(&self, policy_id: Uuid) -> ServiceResult<bool>;

    /// Persists the claim and, when auto-compensation applies, its task, as
    /// one atomic write.
    async fn create_claim(
        &self,
        claim: &ClaimRecord,
        task: Option<&CompensationTask>,
    ) -> ServiceResult<()>;

    async fn due_compensation_tasks(
        &self,
        limit: usize,
    ) -> ServiceResult<Vec<CompensationWorkItem>>;

    async fn mark_tasks_handing(
        &self,
        task_ids: &[Uuid],
        at: DateTime<Utc>,
    ) -> ServiceResult<()>;

    async fn complete_compensation(&self, outcome: &CompensationOutcome) -> ServiceResult<()>;

    /// Terminal failure: the task keeps its reasons for a human to act on.
    async fn fail_compensation(
        &self,
        task_id: Uuid,
        reasons: Value,
        at: DateTime<Utc>,
    ) -> ServiceResult<()>;
}

#[async_trait]
pub trait NotifyStore: Send + Sync + 'static {
    /// Pending tasks plus retry tasks whose retry instant has passed.
    async fn due_tasks(&self, now: DateTime<Utc>, limit: usize) -> ServiceResult<Vec<NotifyTask>>;

    async fn mark_handing(&self, task_ids: &[Uuid], at: DateTime<Utc>) -> ServiceResult<()>;

    async fn record_success(&self, task_id: Uuid, at: DateTime<Utc>) -> ServiceResult<()>;

    /// Schedules another attempt.
    async fn record_retry(
        &self,
        task_id: Uuid,
        retries: u32,
        retry_at: DateTime<Utc>,
        reason: &str,
    ) -> ServiceResult<()>;

    /// Terminal failure; the task will not be retried.
    async fn record_failure(
        &self,
        task_id: Uuid,
        reason: &str,
        at: DateTime<Utc>,
    ) -> ServiceResult<()>;
}

/// A signed webhook about to be delivered.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub url: String,
    pub authorization: String,
    pub body: Value,
}

/// Why a delivery did not land. Transport-level trouble (connect, timeout,
/// 5xx) is retryable; everything else is not.
#[derive(Debug, Clone)]
pub struct DeliveryError {
    pub retryable: bool,
    pub message: String,
}

#[async_trait]
pub trait WebhookTransport: Send + Sync + 'static {
    async fn deliver(&self, request: &WebhookRequest) -> Result<(), DeliveryError>;
}
