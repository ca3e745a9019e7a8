//! Claim, compensation-task and notification storage over the shared state

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_kernel::{ServiceError, ServiceResult};
use domain_claims::{
    ClaimRecord, ClaimStatus, ClaimStore, CompensationOutcome, CompensationTask,
    CompensationWorkItem, NotifyStatus, NotifyStore, NotifyTask, TaskStatus,
};
use serde_json::Value;
use uuid::Uuid;

use super::MemoryStore;

#[async_trait]
impl ClaimStore for MemoryStore {
    async fn find_by_claim_no(&self, claim_no: &str) -> ServiceResult<Option<ClaimRecord>> {
        let state = self.state.lock().await;
        Ok(state.claims.iter().find(|c| c.claim_no == claim_no).cloned())
    }

    async fn pending_claim_exists(&self, policy_id: Uuid) -> ServiceResult<bool> {
        let state = self.state.lock().await;
        Ok(state
            .claims
            .iter()
            .any(|c| c.policy_id == policy_id && c.status == ClaimStatus::Pending))
    }

    async fn create_claim(
        &self,
        claim: &ClaimRecord,
        task: Option<&CompensationTask>,
    ) -> ServiceResult<()> {
        let mut state = self.state.lock().await;
        // Re-checked under the state lock so two racing applications cannot
        // both land a pending claim on the same policy.
        if state
            .claims
            .iter()
            .any(|c| c.policy_id == claim.policy_id && c.status == ClaimStatus::Pending)
        {
            return Err(ServiceError::invalid_request(
                "the policy already has a pending claim",
            )
            .with_target("policyNo"));
        }
        state.claims.push(claim.clone());
        if let Some(task) = task {
            state.compensation_tasks.push(task.clone());
        }
        Ok(())
    }

    async fn due_compensation_tasks(
        &self,
        limit: usize,
    ) -> ServiceResult<Vec<CompensationWorkItem>> {
        let state = self.state.lock().await;
        let mut items = Vec::new();
        for task in state
            .compensation_tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .take(limit)
        {
            let claim = state
                .claims
                .iter()
                .find(|c| c.id == task.claim_id)
                .ok_or_else(|| {
                    ServiceError::internal("compensation task references a missing claim")
                        .untrusted()
                })?;
            let policy = state
                .policies
                .iter()
                .find(|b| b.policy.id == claim.policy_id)
                .ok_or_else(|| {
                    ServiceError::internal("claim references a missing policy").untrusted()
                })?;
            items.push(CompensationWorkItem {
                task: task.clone(),
                claim: claim.clone(),
                policy: policy.clone(),
            });
        }
        Ok(items)
    }

    async fn mark_tasks_handing(
        &self,
        task_ids: &[Uuid],
        at: DateTime<Utc>,
    ) -> ServiceResult<()> {
        let mut state = self.state.lock().await;
        for task in state
            .compensation_tasks
            .iter_mut()
            .filter(|t| task_ids.contains(&t.id))
        {
            task.status = TaskStatus::Handing;
            task.handled_at = Some(at);
        }
        Ok(())
    }

    async fn complete_compensation(&self, outcome: &CompensationOutcome) -> ServiceResult<()> {
        let mut state = self.state.lock().await;
        let task = state
            .compensation_tasks
            .iter_mut()
            .find(|t| t.id == outcome.task_id)
            .ok_or_else(|| ServiceError::internal("unknown compensation task").untrusted())?;
        task.status = TaskStatus::Succeed;
        task.finished_at = Some(outcome.finished_at);

        let claim = state
            .claims
            .iter_mut()
            .find(|c| c.id == outcome.claim_id)
            .ok_or_else(|| ServiceError::internal("unknown claim").untrusted())?;
        claim.status = ClaimStatus::Paying;
        claim.sum_insured = outcome.sum_insured;
        for (no, sum) in &outcome.insured_sums {
            if let Some(entry) = claim.insureds.iter_mut().find(|i| &i.no == no) {
                entry.sum_insured = *sum;
            }
        }

        state.notify_tasks.push(outcome.notify.clone());
        Ok(())
    }

    async fn fail_compensation(
        &self,
        task_id: Uuid,
        reasons: Value,
        at: DateTime<Utc>,
    ) -> ServiceResult<()> {
        let mut state = self.state.lock().await;
        let task = state
            .compensation_tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| ServiceError::internal("unknown compensation task").untrusted())?;
        task.status = TaskStatus::Failure;
        task.finished_at = Some(at);
        task.failure_reasons = Some(reasons);
        Ok(())
    }
}

#[async_trait]
impl NotifyStore for MemoryStore {
    async fn due_tasks(&self, now: DateTime<Utc>, limit: usize) -> ServiceResult<Vec<NotifyTask>> {
        let state = self.state.lock().await;
        Ok(state
            .notify_tasks
            .iter()
            .filter(|t| match t.status {
                NotifyStatus::Pending => true,
                NotifyStatus::Retry => t.retry_at.is_some_and(|at| at <= now),
                _ => false,
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_handing(&self, task_ids: &[Uuid], at: DateTime<Utc>) -> ServiceResult<()> {
        let mut state = self.state.lock().await;
        for task in state
            .notify_tasks
            .iter_mut()
            .filter(|t| task_ids.contains(&t.id))
        {
            task.status = NotifyStatus::Handing;
            task.handled_at = Some(at);
        }
        Ok(())
    }

    async fn record_success(&self, task_id: Uuid, at: DateTime<Utc>) -> ServiceResult<()> {
        let mut state = self.state.lock().await;
        let task = notify_task(&mut state.notify_tasks, task_id)?;
        task.status = NotifyStatus::Succeed;
        task.finished_at = Some(at);
        Ok(())
    }

    async fn record_retry(
        &self,
        task_id: Uuid,
        retries: u32,
        retry_at: DateTime<Utc>,
        reason: &str,
    ) -> ServiceResult<()> {
        let mut state = self.state.lock().await;
        let task = notify_task(&mut state.notify_tasks, task_id)?;
        task.status = NotifyStatus::Retry;
        task.retries = retries;
        task.retry_at = Some(retry_at);
        task.failure_reason = Some(reason.to_string());
        Ok(())
    }

    async fn record_failure(
        &self,
        task_id: Uuid,
        reason: &str,
        at: DateTime<Utc>,
    ) -> ServiceResult<()> {
        let mut state = self.state.lock().await;
        let task = notify_task(&mut state.notify_tasks, task_id)?;
        task.status = NotifyStatus::Failure;
        task.finished_at = Some(at);
        task.failure_reason = Some(reason.to_string());
        Ok(())
    }
}

fn notify_task(tasks: &mut [NotifyTask], task_id: Uuid) -> ServiceResult<&mut NotifyTask> {
    tasks
        .iter_mut()
        .find(|t| t.id == task_id)
        .ok_or_else(|| ServiceError::internal("unknown notification task").untrusted())
}

#[cfg(test)]
mod tests {
    use super::*;
    use biz_config::ClaimConfig;
    use chrono::Duration;
    use domain_claims::ClaimInsuredRecord;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn claim(policy_id: Uuid, status: ClaimStatus) -> ClaimRecord {
        ClaimRecord {
            id: Uuid::new_v4(),
            policy_id,
            policy_no: "OPC1".into(),
            producer_id: Uuid::new_v4(),
            claim_no: Uuid::new_v4().simple().to_string(),
            status,
            sum_insured: Decimal::ZERO,
            insureds: vec![ClaimInsuredRecord { no: "a".into(), sum_insured: Decimal::ZERO }],
            biz_config: ClaimConfig::default(),
            applied_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn a_second_pending_claim_on_one_policy_is_refused() {
        let store = MemoryStore::new();
        let policy_id = Uuid::new_v4();
        store.create_claim(&claim(policy_id, ClaimStatus::Pending), None).await.unwrap();
        let err = store
            .create_claim(&claim(policy_id, ClaimStatus::Pending), None)
            .await
            .unwrap_err();
        assert_eq!(err.target.as_deref(), Some("policyNo"));
    }

    #[tokio::test]
    async fn settlement_updates_claim_task_and_queues_the_notification() {
        let store = MemoryStore::new();
        let claim = claim(Uuid::new_v4(), ClaimStatus::Pending);
        let task = CompensationTask::for_claim(&claim, "default", Utc::now());
        store.create_claim(&claim, Some(&task)).await.unwrap();

        let now = Utc::now();
        let notify = NotifyTask::claim_status_change(
            claim.producer_id,
            &claim.claim_no,
            &claim.policy_no,
            ClaimStatus::Paying,
            now,
        );
        store
            .complete_compensation(&CompensationOutcome {
                task_id: task.id,
                claim_id: claim.id,
                sum_insured: dec!(40),
                insured_sums: vec![("a".into(), dec!(40))],
                notify,
                finished_at: now,
            })
            .await
            .unwrap();

        let stored = store.find_by_claim_no(&claim.claim_no).await.unwrap().unwrap();
        assert_eq!(stored.status, ClaimStatus::Paying);
        assert_eq!(stored.sum_insured, dec!(40));
        assert_eq!(stored.insureds[0].sum_insured, dec!(40));
        assert_eq!(store.due_tasks(now, 10).await.unwrap().len(), 1);
        assert!(!store.pending_claim_exists(claim.policy_id).await.unwrap());
    }

    #[tokio::test]
    async fn retry_tasks_become_due_only_after_their_instant() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let mut task = NotifyTask::claim_status_change(
            Uuid::new_v4(),
            "CLM1",
            "OPC1",
            ClaimStatus::Paying,
            now,
        );
        task.status = NotifyStatus::Retry;
        task.retry_at = Some(now + Duration::seconds(30));
        store.state.lock().await.notify_tasks.push(task.clone());

        assert!(store.due_tasks(now, 10).await.unwrap().is_empty());
        let later = now + Duration::seconds(31);
        assert_eq!(store.due_tasks(later, 10).await.unwrap().len(), 1);

        store.record_failure(task.id, "gone", later).await.unwrap();
        assert!(store.due_tasks(later, 10).await.unwrap().is_empty());
    }
}
