//! Acceptance: validate, adjust, price and bind a submission
//!
//! The whole operation runs under a request-identity lock so replays of the
//! same order map onto the already-bound policy, and under per-insured locks
//! so the same person cannot be double-covered by two in-flight requests.

use std::collections::BTreeMap;
use std::sync::Arc;

use biz_config::{resolve, AcceptConfig, ConfigLayers};
use chrono::Utc;
use core_kernel::{ServiceError, ServiceResult};
use serde_json::json;
use uuid::Uuid;

use crate::adjust;
use crate::catalog::{Contract, Plan, Producer, Product};
use crate::draft::{
    AcceptRequest, ApplicantRecord, InsuredDraft, InsuredRecord, PolicyBundle, PolicyDraft,
    PolicyRecord, PolicyStatus,
};
use crate::idempotency::{self, Acquisition, LockSet};
use crate::ports::RepeatInsuredQuery;
use crate::responses::{AcceptOutcome, PolicyResponse};
use crate::schema;
use crate::services::{draft_window, ChargeBlame, PolicyService};

impl PolicyService {
    pub async fn accept(
        &self,
        producer_code: &str,
        request: AcceptRequest,
    ) -> ServiceResult<AcceptOutcome> {
        let producer = self.identify_producer(producer_code).await?;
        let draft = schema::validate_basal(request)?;

        let request_key = idempotency::accept_request_key(
            &draft.order_no,
            producer.id,
            &draft.applicants,
            &draft.insureds,
        );
        let mut locks = LockSet::new(Arc::clone(&self.locks));
        let result = match locks.acquire(&request_key).await {
            Ok(acquisition) => self.accept_locked(&producer, draft, acquisition, &mut locks).await,
            Err(err) => Err(err),
        };
        locks.release_all().await;
        result
    }

    async fn accept_locked(
        &self,
        producer: &Producer,
        mut draft: PolicyDraft,
        acquisition: Acquisition,
        locks: &mut LockSet,
    ) -> ServiceResult<AcceptOutcome> {
        if let Some(existing) = self
            .policies
            .find_by_order_no(&draft.order_no, producer.id)
            .await?
        {
            verify_replay(&existing, &draft)?;
            tracing::info!(
                order_no = %draft.order_no,
                policy_no = %existing.policy.policy_no,
                "acceptance replay mapped onto the bound policy"
            );
            return Ok(AcceptOutcome {
                replayed: true,
                policy: PolicyResponse::from_bundle(&existing),
            });
        }
        if acquisition == Acquisition::AfterWait {
            // The earlier holder finished without binding anything.
            return Err(ServiceError::internal(
                "a concurrent identical request ended without a bound policy",
            ));
        }

        let (contract, product, plan) = self.resolve_catalog(producer, &draft).await?;
        let config = resolve(ConfigLayers {
            product: product.biz_config.clone(),
            plan: plan.biz_config.clone(),
            producer: producer.biz_config.clone(),
            contract: contract.biz_config.clone(),
        })?;

        let now = Utc::now();
        schema::validate_draft(&mut draft, &config.accept, now)?;
        adjust::adjust(&mut draft, &config.accept, now)?;
        schema::validate_adjusted(&draft, &config.accept)?;

        let identities = insured_identities(&draft.insureds, &config.accept);
        let mut keys: Vec<String> = identities
            .iter()
            .map(|identity| {
                idempotency::insured_key(
                    product.id,
                    &product.version,
                    plan.id,
                    &identity.values().cloned().collect::<Vec<_>>(),
                )
            })
            .collect();
        // Identical insureds within one request collapse onto one key.
        keys.sort();
        keys.dedup();
        locks.acquire_all(&keys).await?;

        let window = draft_window(&draft)?;
        let duplicates = self
            .policies
            .repeat_insureds(&RepeatInsuredQuery {
                product_id: product.id,
                product_version: product.version.clone(),
                plan_id: plan.id,
                effective_time: window.effective_time,
                expiry_time: window.expiry_time,
                keys: identities,
            })
            .await?;
        if !duplicates.is_empty() {
            return Err(ServiceError::invalid_request(
                "some insureds already hold overlapping coverage on this plan",
            )
            .with_target("insureds")
            .with_details(json!({ "duplicates": duplicates })));
        }

        self.charge_draft(&mut draft, &config.accept.premium, ChargeBlame::Client)?;

        let policy_no = self.next_policy_no(now).await?;
        let bundle = bind(draft, producer, &contract, &product, &plan, config, policy_no, now)?;
        self.policies.create_policy(&bundle).await?;
        tracing::info!(
            order_no = %bundle.policy.order_no,
            policy_no = %bundle.policy.policy_no,
            premium = %bundle.policy.premium,
            "policy bound"
        );

        Ok(AcceptOutcome { replayed: false, policy: PolicyResponse::from_bundle(&bundle) })
    }

    pub(crate) async fn resolve_catalog(
        &self,
        producer: &Producer,
        draft: &PolicyDraft,
    ) -> ServiceResult<(Contract, Product, Plan)> {
        let contract = self
            .catalog
            .contract_by_code(&draft.contract_code, draft.contract_version.as_deref())
            .await?
            .filter(|c| c.producer_id == producer.id)
            .ok_or_else(|| {
                ServiceError::invalid_request("contract not found").with_target("contractCode")
            })?;
        let product = self
            .catalog
            .product_by_id(contract.product_id)
            .await?
            .ok_or_else(|| {
                ServiceError::internal("contract references a missing product").untrusted()
            })?;
        let plan = self
            .catalog
            .plan_by_code(&draft.plan_code, &product.version)
            .await?
            .filter(|p| p.product_id == product.id)
            .ok_or_else(|| {
                ServiceError::invalid_request("plan not found").with_target("planCode")
            })?;
        Ok((contract, product, plan))
    }
}

/// A replayed order number must carry the same party set as the bound
/// policy; otherwise the order number was reused for different business.
fn verify_replay(existing: &PolicyBundle, draft: &PolicyDraft) -> ServiceResult<()> {
    let applicants_match = existing.applicants.iter().all(|record| {
        draft.applicants.iter().any(|d| {
            same_identity(
                (&record.name, &record.id_type, &record.id_no),
                (&d.name, &d.id_type, &d.id_no),
            )
        })
    });
    let insureds_match = existing.insureds.iter().all(|record| {
        draft.insureds.iter().any(|d| {
            same_identity(
                (&record.name, &record.id_type, &record.id_no),
                (&d.name, &d.id_type, &d.id_no),
            )
        })
    });
    if applicants_match && insureds_match {
        Ok(())
    } else {
        Err(ServiceError::invalid_request(
            "orderNo is already bound to a policy with different parties",
        )
        .with_target("orderNo"))
    }
}

type Identity<'a> = (&'a Option<String>, &'a Option<String>, &'a Option<String>);

fn same_identity(a: Identity<'_>, b: Identity<'_>) -> bool {
    let norm = |v: &Option<String>| v.as_deref().unwrap_or("").trim().to_string();
    norm(a.0) == norm(b.0) && norm(a.1) == norm(b.1) && norm(a.2) == norm(b.2)
}

/// Primary-field value map per insured. `BTreeMap` iteration gives a stable
/// field order for lock keys and queries.
fn insured_identities(
    insureds: &[InsuredDraft],
    cfg: &AcceptConfig,
) -> Vec<BTreeMap<String, String>> {
    insureds
        .iter()
        .map(|insured| {
            cfg.insureds
                .primary_fields
                .iter()
                .map(|field| (field.clone(), primary_value(insured, field)))
                .collect()
        })
        .collect()
}

fn primary_value(insured: &InsuredDraft, field: &str) -> String {
    let text = |v: &Option<String>| v.clone().unwrap_or_default();
    match field {
        "name" => text(&insured.name),
        "idType" => text(&insured.id_type),
        "idNo" => text(&insured.id_no),
        "gender" => text(&insured.gender),
        "relationship" => text(&insured.relationship),
        "contactNo" => text(&insured.contact_no),
        "email" => text(&insured.email),
        "birth" => insured
            .birth
            .map(|b| b.format("%Y%m%d").to_string())
            .unwrap_or_default(),
        _ => String::new(),
    }
}

#[allow(clippy::too_many_arguments)]
fn bind(
    draft: PolicyDraft,
    producer: &Producer,
    contract: &Contract,
    product: &Product,
    plan: &Plan,
    config: biz_config::BizConfig,
    policy_no: String,
    now: chrono::DateTime<Utc>,
) -> ServiceResult<PolicyBundle> {
    let window = draft_window(&draft)?;
    let premium = draft.premium.ok_or_else(|| {
        ServiceError::internal("no aggregate premium after charging").untrusted()
    })?;
    Ok(PolicyBundle {
        policy: PolicyRecord {
            id: Uuid::new_v4(),
            order_no: draft.order_no,
            policy_no,
            endorse_no: "000".to_string(),
            producer_id: producer.id,
            contract_id: contract.id,
            contract_code: contract.code.clone(),
            contract_version: contract.version.clone(),
            product_id: product.id,
            product_code: product.code.clone(),
            product_version: product.version.clone(),
            plan_id: plan.id,
            plan_code: plan.code.clone(),
            effective_time: window.effective_time,
            expiry_time: window.expiry_time,
            bound_time: now,
            premium,
            status: PolicyStatus::Valid,
            extensions: draft.extensions,
            biz_config: config,
        },
        applicants: draft.applicants.iter().map(ApplicantRecord::from_draft).collect(),
        insureds: draft.insureds.iter().map(InsuredRecord::from_draft).collect(),
    })
}
