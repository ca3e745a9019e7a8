//! Automatic compensation
//!
//! A background job drains pending compensation tasks in small batches.
//! Each task settles one claim: the sums insured are computed from the
//! claim's frozen configuration, checked against the automatic ceiling, and
//! written together with a `paying` status change and its producer
//! notification. A settlement that cannot proceed fails terminally with its
//! reasons recorded for manual review.

use std::sync::Arc;

use biz_config::CalculateMode;
use chrono::{DateTime, Utc};
use core_kernel::{ServiceError, ServiceResult};
use domain_policy::{FormulaRegistry, PayoutLine};
use rust_decimal::Decimal;
use tokio::task::JoinSet;

use crate::model::{ClaimStatus, NotifyTask};
use crate::ports::{ClaimStore, CompensationOutcome, CompensationWorkItem};

/// Tasks claimed per run.
const BATCH_SIZE: usize = 10;

/// Settles due compensation tasks.
pub struct CompensationJob {
    claims: Arc<dyn ClaimStore>,
    formulas: Arc<FormulaRegistry>,
}

impl CompensationJob {
    pub fn new(claims: Arc<dyn ClaimStore>, formulas: Arc<FormulaRegistry>) -> Self {
        Self { claims, formulas }
    }

    /// Claims one batch of due tasks and settles each concurrently. Returns
    /// the number of claims that moved to `paying`.
    pub async fn run_once(&self, now: DateTime<Utc>) -> ServiceResult<usize> {
        let items = self.claims.due_compensation_tasks(BATCH_SIZE).await?;
        if items.is_empty() {
            return Ok(0);
        }

        let task_ids: Vec<_> = items.iter().map(|item| item.task.id).collect();
        self.claims.mark_tasks_handing(&task_ids, now).await?;

        let mut handles = JoinSet::new();
        for item in items {
            let claims = Arc::clone(&self.claims);
            let formulas = Arc::clone(&self.formulas);
            handles.spawn(async move { settle_one(claims, formulas, item, now).await });
        }

        let mut settled = 0;
        while let Some(joined) = handles.join_next().await {
            let outcome = joined.map_err(|e| {
                ServiceError::internal("compensation task panicked")
                    .with_inner(e.to_string())
                    .untrusted()
            })?;
            if outcome? {
                settled += 1;
            }
        }
        Ok(settled)
    }
}

/// Settles a single task. A settlement error marks the task failed and is
/// not bubbled up, so one bad claim never blocks the rest of the batch.
async fn settle_one(
    claims: Arc<dyn ClaimStore>,
    formulas: Arc<FormulaRegistry>,
    item: CompensationWorkItem,
    now: DateTime<Utc>,
) -> ServiceResult<bool> {
    let task_id = item.task.id;
    let claim_no = item.claim.claim_no.clone();
    match settle(&formulas, &item, now) {
        Ok(outcome) => {
            claims.complete_compensation(&outcome).await?;
            tracing::info!(
                claim_no = %claim_no,
                sum_insured = %outcome.sum_insured,
                "claim compensated automatically"
            );
            Ok(true)
        }
        Err(err) => {
            tracing::warn!(claim_no = %claim_no, error = %err, "automatic compensation failed");
            let reasons = serde_json::json!([err.message]);
            claims.fail_compensation(task_id, reasons, now).await?;
            Ok(false)
        }
    }
}

/// Computes the payout for one claim and assembles the settlement write.
fn settle(
    formulas: &FormulaRegistry,
    item: &CompensationWorkItem,
    now: DateTime<Utc>,
) -> ServiceResult<CompensationOutcome> {
    let claim = &item.claim;
    let rule = &claim.biz_config.premium;

    // Join the claimed insureds back to the policy rows they point at.
    let mut lines = Vec::with_capacity(claim.insureds.len());
    for entry in &claim.insureds {
        let insured = item
            .policy
            .insureds
            .iter()
            .find(|i| i.no == entry.no)
            .ok_or_else(|| {
                ServiceError::internal("claim references an insured missing from the policy")
                    .with_target("insureds")
                    .untrusted()
            })?;
        lines.push(PayoutLine {
            no: insured.no.clone(),
            birth: insured.birth,
            sum_insured: Decimal::ZERO,
        });
    }

    let total = match rule.calculate_mode {
        CalculateMode::Fixed => {
            for line in &mut lines {
                line.sum_insured = rule.fixed;
            }
            rule.fixed * Decimal::from(lines.len())
        }
        CalculateMode::Formula => {
            let formula = formulas.get(&rule.formula.name)?;
            let total =
                formula.payout(&rule.formula.params, item.policy.policy.effective_time, &mut lines)?;
            let sum: Decimal = lines.iter().map(|l| l.sum_insured).sum();
            if sum != total {
                return Err(ServiceError::internal(
                    "per-insured sums do not add up to the aggregate payout",
                )
                .untrusted());
            }
            total
        }
        _ => {
            return Err(ServiceError::internal(
                "the claim configuration does not define a payout mode",
            )
            .untrusted())
        }
    };

    let ceiling = claim.biz_config.auto_compensate.maximum;
    if total > ceiling {
        return Err(ServiceError::internal(format!(
            "payout {total} exceeds the automatic compensation ceiling {ceiling}"
        )));
    }

    Ok(CompensationOutcome {
        task_id: item.task.id,
        claim_id: claim.id,
        sum_insured: total,
        insured_sums: lines.into_iter().map(|l| (l.no, l.sum_insured)).collect(),
        notify: NotifyTask::claim_status_change(
            claim.producer_id,
            &claim.claim_no,
            &claim.policy_no,
            ClaimStatus::Paying,
            now,
        ),
        finished_at: now,
    })
}
