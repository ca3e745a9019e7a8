//! Claim application and reads
//!
//! A claim names insureds on an in-force policy. The claim section of the
//! policy's configuration snapshot decides which identifying fields the
//! submission must carry; every supplied field must agree with the stored
//! insured row for the match to count. At most one claim per policy may be
//! pending at a time.

use std::sync::Arc;

use biz_config::{ClaimInsuredsRule, FieldRule};
use chrono::{DateTime, Utc};
use core_kernel::{SequenceStore, ServiceError, ServiceResult};
use domain_policy::{CatalogStore, InsuredRecord, PolicyBundle, PolicyStatus, PolicyStore, Producer};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{ClaimInsuredRecord, ClaimRecord, ClaimStatus, CompensationTask};
use crate::ports::ClaimStore;

const CLAIM_NO_PREFIX: &str = "CLM";
const CLAIM_NO_SEQUENCE: &str = "claim-no-incr";
const MAX_NO_LENGTH: usize = 64;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClaimInsuredSubmission {
    pub no: Option<String>,
    pub relationship: Option<String>,
    pub name: Option<String>,
    pub id_type: Option<String>,
    pub id_no: Option<String>,
    pub gender: Option<String>,
    pub birth: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClaimRequest {
    pub policy_no: Option<String>,
    pub insureds: Vec<ClaimInsuredSubmission>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimInsuredView {
    pub no: String,
    pub relationship: Option<String>,
    pub name: Option<String>,
    pub id_type: Option<String>,
    pub id_no: Option<String>,
    pub gender: Option<String>,
    pub birth: Option<DateTime<Utc>>,
    pub sum_insured: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimResponse {
    pub claim_no: String,
    pub policy_no: String,
    pub status: ClaimStatus,
    pub sum_insured: Decimal,
    pub applied_at: DateTime<Utc>,
    pub insureds: Vec<ClaimInsuredView>,
}

pub struct ClaimService {
    catalog: Arc<dyn CatalogStore>,
    policies: Arc<dyn PolicyStore>,
    claims: Arc<dyn ClaimStore>,
    sequences: Arc<dyn SequenceStore>,
}

impl ClaimService {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        policies: Arc<dyn PolicyStore>,
        claims: Arc<dyn ClaimStore>,
        sequences: Arc<dyn SequenceStore>,
    ) -> Self {
        Self { catalog, policies, claims, sequences }
    }

    pub async fn apply(
        &self,
        producer_code: &str,
        request: ClaimRequest,
    ) -> ServiceResult<ClaimResponse> {
        let producer = self.identify_producer(producer_code).await?;
        let policy_no = request
            .policy_no
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ServiceError::invalid_request("policyNo is required").with_target("policyNo")
            })?;
        let bundle = self.load_owned_policy(policy_no, &producer).await?;

        let now = Utc::now();
        if bundle.policy.status == PolicyStatus::Canceled {
            return Err(ServiceError::invalid_request("the policy is canceled")
                .with_target("policyNo"));
        }
        if bundle.policy.effective_time > now || bundle.policy.expiry_time < now {
            return Err(ServiceError::invalid_request("the policy is not in force")
                .with_target("policyNo"));
        }
        if self.claims.pending_claim_exists(bundle.policy.id).await? {
            return Err(ServiceError::invalid_request(
                "the policy already has a pending claim",
            )
            .with_target("policyNo"));
        }

        let cfg = bundle.policy.biz_config.claim.clone();
        screen_submissions(&request.insureds, &cfg.insureds)?;
        let matched = match_insureds(&request.insureds, &bundle)?;

        let claim_no = self.next_claim_no(now).await?;
        let claim = ClaimRecord {
            id: Uuid::new_v4(),
            policy_id: bundle.policy.id,
            policy_no: bundle.policy.policy_no.clone(),
            producer_id: producer.id,
            claim_no,
            status: ClaimStatus::Pending,
            sum_insured: Decimal::ZERO,
            insureds: matched
                .iter()
                .map(|record| ClaimInsuredRecord {
                    no: record.no.clone(),
                    sum_insured: Decimal::ZERO,
                })
                .collect(),
            biz_config: cfg.clone(),
            applied_at: now,
        };
        let task = cfg
            .auto_compensate
            .enable
            .then(|| CompensationTask::for_claim(&claim, &cfg.auto_compensate.compensator, now));

        self.claims.create_claim(&claim, task.as_ref()).await?;
        tracing::info!(
            claim_no = %claim.claim_no,
            policy_no = %claim.policy_no,
            auto_compensate = task.is_some(),
            "claim accepted"
        );

        Ok(assemble_response(&claim, &bundle))
    }

    /// Fetches a claim owned by the calling producer.
    pub async fn get(&self, producer_code: &str, claim_no: &str) -> ServiceResult<ClaimResponse> {
        let producer = self.identify_producer(producer_code).await?;
        validate_claim_no(claim_no)?;
        let claim = self
            .claims
            .find_by_claim_no(claim_no)
            .await?
            .ok_or_else(|| ServiceError::not_found("claim not found").with_target("claimNo"))?;
        if claim.producer_id != producer.id {
            return Err(ServiceError::access_denied(
                "the claim belongs to another producer",
            ));
        }
        let bundle = self
            .policies
            .find_by_policy_no(&claim.policy_no)
            .await?
            .ok_or_else(|| {
                ServiceError::internal("claim references a missing policy").untrusted()
            })?;
        Ok(assemble_response(&claim, &bundle))
    }

    async fn identify_producer(&self, code: &str) -> ServiceResult<Producer> {
        self.catalog
            .producer_by_code(code)
            .await?
            .ok_or_else(|| ServiceError::unauthorized("unknown producer"))
    }

    async fn load_owned_policy(
        &self,
        policy_no: &str,
        producer: &Producer,
    ) -> ServiceResult<PolicyBundle> {
        let bundle = self
            .policies
            .find_by_policy_no(policy_no)
            .await?
            .ok_or_else(|| ServiceError::not_found("policy not found").with_target("policyNo"))?;
        if bundle.policy.producer_id != producer.id {
            return Err(ServiceError::access_denied(
                "the policy belongs to another producer",
            ));
        }
        Ok(bundle)
    }

    async fn next_claim_no(&self, now: DateTime<Utc>) -> ServiceResult<String> {
        let seq = self.sequences.next(CLAIM_NO_SEQUENCE).await?;
        Ok(format!("{CLAIM_NO_PREFIX}{}{seq:06}", now.format("%Y%m%d")))
    }
}

fn validate_claim_no(claim_no: &str) -> ServiceResult<()> {
    if claim_no.is_empty() || claim_no.len() > MAX_NO_LENGTH {
        return Err(ServiceError::invalid_request("claimNo is malformed").with_target("claimNo"));
    }
    if !claim_no.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ServiceError::invalid_request("claimNo is malformed").with_target("claimNo"));
    }
    Ok(())
}

/// Enforces the configured required flags on every submitted insured.
fn screen_submissions(
    submissions: &[ClaimInsuredSubmission],
    rules: &ClaimInsuredsRule,
) -> ServiceResult<()> {
    if submissions.is_empty() {
        return Err(ServiceError::invalid_request("insureds must not be empty")
            .with_target("insureds"));
    }
    for (i, submission) in submissions.iter().enumerate() {
        let checks: [(&str, bool, &FieldRule); 7] = [
            ("no", submission.no.is_none(), &rules.no),
            ("relationship", submission.relationship.is_none(), &rules.relationship),
            ("name", submission.name.is_none(), &rules.name),
            ("idType", submission.id_type.is_none(), &rules.id_type),
            ("idNo", submission.id_no.is_none(), &rules.id_no),
            ("gender", submission.gender.is_none(), &rules.gender),
            ("birth", submission.birth.is_none(), &rules.birth),
        ];
        for (field, missing, rule) in checks {
            if rule.required && missing {
                let path = format!("insureds[{i}].{field}");
                return Err(
                    ServiceError::invalid_request(format!("{path} is required")).with_target(path)
                );
            }
        }
    }
    Ok(())
}

/// Resolves each submission to a distinct policy insured. Every supplied
/// identifying field must agree with the stored row.
fn match_insureds<'a>(
    submissions: &[ClaimInsuredSubmission],
    bundle: &'a PolicyBundle,
) -> ServiceResult<Vec<&'a InsuredRecord>> {
    let mut matched: Vec<&InsuredRecord> = Vec::with_capacity(submissions.len());
    for (i, submission) in submissions.iter().enumerate() {
        let record = bundle
            .insureds
            .iter()
            .find(|record| matches_record(submission, record))
            .ok_or_else(|| {
                ServiceError::invalid_request(format!(
                    "insureds[{i}] does not match any insured on the policy"
                ))
                .with_target(format!("insureds[{i}]"))
            })?;
        if matched.iter().any(|m| m.no == record.no) {
            return Err(ServiceError::invalid_request(format!(
                "insureds[{i}] matches an insured already named on this claim"
            ))
            .with_target(format!("insureds[{i}]")));
        }
        matched.push(record);
    }
    Ok(matched)
}

fn matches_record(submission: &ClaimInsuredSubmission, record: &InsuredRecord) -> bool {
    let text_agrees = |supplied: &Option<String>, stored: &Option<String>| match supplied {
        None => true,
        Some(v) => stored.as_deref() == Some(v.as_str()),
    };
    submission.no.as_deref().map_or(true, |no| no == record.no)
        && text_agrees(&submission.relationship, &record.relationship)
        && text_agrees(&submission.name, &record.name)
        && text_agrees(&submission.id_type, &record.id_type)
        && text_agrees(&submission.id_no, &record.id_no)
        && text_agrees(&submission.gender, &record.gender)
}

fn assemble_response(claim: &ClaimRecord, bundle: &PolicyBundle) -> ClaimResponse {
    ClaimResponse {
        claim_no: claim.claim_no.clone(),
        policy_no: claim.policy_no.clone(),
        status: claim.status,
        sum_insured: claim.sum_insured,
        applied_at: claim.applied_at,
        insureds: claim
            .insureds
            .iter()
            .map(|ci| {
                let record = bundle.insureds.iter().find(|r| r.no == ci.no);
                ClaimInsuredView {
                    no: ci.no.clone(),
                    relationship: record.and_then(|r| r.relationship.clone()),
                    name: record.and_then(|r| r.name.clone()),
                    id_type: record.and_then(|r| r.id_type.clone()),
                    id_no: record.and_then(|r| r.id_no.clone()),
                    gender: record.and_then(|r| r.gender.clone()),
                    birth: record.and_then(|r| r.birth),
                    sum_insured: ci.sum_insured,
                }
            })
            .collect(),
    }
}
