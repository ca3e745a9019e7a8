//! Cancellation: terminate a policy and settle the premium
//!
//! The refund formula decides the earned portion of each insured premium;
//! the difference between the earned total and the bound premium is what the
//! producer gets back (negative difference) on the resulting endorsement.

use biz_config::CalculateMode;
use chrono::Utc;
use core_kernel::{ServiceError, ServiceResult};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::draft::PolicyStatus;
use crate::endorsement::{
    next_endorse_no, EndorsementDetail, EndorsementRecord, EndorsementSave, EndorsementType,
    PolicySnapshot,
};
use crate::formula::{CoverageWindow, RefundLine};
use crate::responses::CancelResponse;
use crate::services::PolicyService;

impl PolicyService {
    pub async fn cancel(
        &self,
        producer_code: &str,
        policy_no: &str,
    ) -> ServiceResult<CancelResponse> {
        let producer = self.identify_producer(producer_code).await?;
        let bundle = self.load_owned_policy(policy_no, &producer).await?;
        if bundle.policy.status == PolicyStatus::Canceled {
            return Err(ServiceError::invalid_request("the policy is already canceled")
                .with_target("policyNo"));
        }

        let cfg = &bundle.policy.biz_config.cancel;
        if !cfg.allow_cancel {
            return Err(ServiceError::invalid_request("cancellation is not allowed")
                .with_target("policyNo"));
        }
        let now = Utc::now();
        if !cfg.period.allow_effective && bundle.policy.effective_time < now {
            return Err(ServiceError::invalid_request(
                "the policy is already in force and cannot be canceled",
            )
            .with_target("policyNo"));
        }
        if !cfg.period.allow_expired && bundle.policy.expiry_time < now {
            return Err(ServiceError::invalid_request(
                "the policy is already expired and cannot be canceled",
            )
            .with_target("policyNo"));
        }

        if cfg.premium.calculate_mode != CalculateMode::Formula {
            return Err(ServiceError::internal(
                "cancellation supports only formula premium settlement",
            )
            .untrusted());
        }
        let formula = self.formulas.get(&cfg.premium.formula.name)?;
        let window = CoverageWindow {
            effective_time: bundle.policy.effective_time,
            expiry_time: bundle.policy.expiry_time,
        };
        let mut lines: Vec<RefundLine> = bundle
            .insureds
            .iter()
            .map(|i| RefundLine {
                no: i.no.clone(),
                premium: i.premium,
                new_premium: Decimal::ZERO,
            })
            .collect();
        let earned = formula.refund(&cfg.premium.formula.params, window, now, &mut lines)?;
        let sum: Decimal = lines.iter().map(|l| l.new_premium).sum();
        if sum != earned {
            return Err(ServiceError::internal(
                "settled premiums do not sum to the aggregate",
            )
            .untrusted());
        }

        let difference = earned - bundle.policy.premium;
        let mut details = Vec::new();
        if difference != Decimal::ZERO {
            details.push(EndorsementDetail::policy(
                "premium",
                serde_json::json!(bundle.policy.premium),
                serde_json::json!(earned),
            ));
        }
        for line in &lines {
            if line.new_premium != line.premium {
                details.push(EndorsementDetail::insured(
                    &line.no,
                    "premium",
                    serde_json::json!(line.premium),
                    serde_json::json!(line.new_premium),
                ));
            }
        }

        let endorse_no = next_endorse_no(&bundle.policy.endorse_no)?;
        let snapshot = PolicySnapshot::capture(&bundle, &endorse_no);

        let mut updated = bundle.clone();
        updated.policy.endorse_no = endorse_no.clone();
        updated.policy.status = PolicyStatus::Canceled;
        updated.policy.premium = earned;
        for (insured, line) in updated.insureds.iter_mut().zip(&lines) {
            insured.premium = line.new_premium;
        }

        let save = EndorsementSave {
            endorsement: EndorsementRecord {
                id: Uuid::new_v4(),
                policy_id: bundle.policy.id,
                endorse_no: endorse_no.clone(),
                kind: EndorsementType::Cancel,
                difference,
                details,
                created_at: now,
            },
            snapshot,
            updated,
        };
        self.policies.apply_endorsement(&save).await?;
        tracing::info!(
            policy_no = %bundle.policy.policy_no,
            endorse_no = %endorse_no,
            difference = %difference,
            "policy canceled"
        );

        Ok(CancelResponse {
            policy_no: bundle.policy.policy_no.clone(),
            endorse_no,
            difference,
        })
    }
}
