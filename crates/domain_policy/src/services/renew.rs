//! Renewal: bind a follow-on term from an existing policy
//!
//! The new term starts one second after the old one ends and keeps the same
//! coverage length, parties and configuration snapshot. Its policy number is
//! the old number with an incremented `-NN` term segment, which also makes
//! renewal idempotent: a term that already exists is refused.

use biz_config::CalculateMode;
use chrono::Utc;
use core_kernel::{ServiceError, ServiceResult};
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use crate::draft::{
    ApplicantRecord, InsuredRecord, PolicyBundle, PolicyDraft, PolicyRecord, PolicyStatus,
};
use crate::responses::PolicyResponse;
use crate::services::{ChargeBlame, PolicyService};

impl PolicyService {
    pub async fn renew(
        &self,
        producer_code: &str,
        policy_no: &str,
    ) -> ServiceResult<PolicyResponse> {
        let producer = self.identify_producer(producer_code).await?;
        let bundle = self.load_owned_policy(policy_no, &producer).await?;
        let cfg = bundle.policy.biz_config.renew.clone();
        if !cfg.allow_renew {
            return Err(ServiceError::invalid_request("renewal is not allowed")
                .with_target("policyNo"));
        }

        let old = &bundle.policy;
        let term = old.expiry_time - old.effective_time;
        let effective = old.expiry_time + chrono::Duration::seconds(1);
        let expiry = effective + term;

        let mut draft = PolicyDraft {
            order_no: Uuid::new_v4().simple().to_string(),
            contract_code: old.contract_code.clone(),
            contract_version: Some(old.contract_version.clone()),
            plan_code: old.plan_code.clone(),
            effective_time: Some(effective),
            expiry_time: Some(expiry),
            premium: Some(old.premium),
            extensions: old.extensions.clone(),
            applicants: bundle.applicants.iter().map(|a| a.replicate()).collect(),
            insureds: bundle.insureds.iter().map(|i| i.replicate()).collect(),
        };

        match cfg.premium.calculate_mode {
            CalculateMode::Fixed => {
                for insured in &mut draft.insureds {
                    insured.premium = Some(cfg.premium.fixed);
                }
                draft.premium =
                    Some(cfg.premium.fixed * Decimal::from(draft.insureds.len() as u64));
            }
            // Continue carries the previous term's figures, Formula reprices
            // inside charge_draft, and a derived term cannot adopt client
            // figures.
            CalculateMode::Continue | CalculateMode::Formula => {}
            CalculateMode::AdoptClient => {
                return Err(ServiceError::internal(
                    "renewal premium cannot adopt client figures",
                )
                .untrusted());
            }
        }
        self.charge_draft(&mut draft, &cfg.premium, ChargeBlame::System)?;

        let new_policy_no = renewal_policy_no(&old.policy_no)?;
        if self.policies.policy_no_exists(&new_policy_no).await? {
            return Err(ServiceError::invalid_request("the policy is already renewed")
                .with_target("policyNo")
                .with_details(json!({ "policyNo": new_policy_no })));
        }

        let now = Utc::now();
        let renewed = PolicyBundle {
            policy: PolicyRecord {
                id: Uuid::new_v4(),
                order_no: draft.order_no,
                policy_no: new_policy_no,
                endorse_no: "000".to_string(),
                producer_id: old.producer_id,
                contract_id: old.contract_id,
                contract_code: old.contract_code.clone(),
                contract_version: old.contract_version.clone(),
                product_id: old.product_id,
                product_code: old.product_code.clone(),
                product_version: old.product_version.clone(),
                plan_id: old.plan_id,
                plan_code: old.plan_code.clone(),
                effective_time: effective,
                expiry_time: expiry,
                bound_time: now,
                premium: draft.premium.unwrap_or(old.premium),
                status: PolicyStatus::Valid,
                extensions: draft.extensions,
                biz_config: old.biz_config.clone(),
            },
            applicants: draft.applicants.iter().map(ApplicantRecord::from_draft).collect(),
            insureds: draft.insureds.iter().map(InsuredRecord::from_draft).collect(),
        };
        self.policies.create_policy(&renewed).await?;
        tracing::info!(
            policy_no = %renewed.policy.policy_no,
            renewed_from = %old.policy_no,
            "policy renewed"
        );
        Ok(PolicyResponse::from_bundle(&renewed))
    }
}

/// Increments the `-NN` term segment: a first renewal appends `-01`, later
/// ones count the segment up, keeping at least two digits.
fn renewal_policy_no(policy_no: &str) -> ServiceResult<String> {
    let mut parts: Vec<String> = policy_no.split('-').map(str::to_string).collect();
    let term: u32 = match parts.get(1) {
        None => 0,
        Some(segment) => segment.parse().map_err(|_| {
            ServiceError::internal("policy number carries a malformed term segment")
                .untrusted()
        })?,
    };
    let segment = format!("{:02}", term + 1);
    if parts.len() >= 2 {
        parts[1] = segment;
    } else {
        parts.push(segment);
    }
    Ok(parts.join("-"))
}
