//! Policy storage over the shared state

use std::collections::BTreeMap;

use async_trait::async_trait;
use core_kernel::{ServiceError, ServiceResult};
use domain_policy::{
    EndorsementSave, InsuredRecord, PolicyBundle, PolicyStatus, PolicyStore, RepeatInsuredQuery,
};
use uuid::Uuid;

use super::MemoryStore;

#[async_trait]
impl PolicyStore for MemoryStore {
    async fn find_by_order_no(
        &self,
        order_no: &str,
        producer_id: Uuid,
    ) -> ServiceResult<Option<PolicyBundle>> {
        let state = self.state.lock().await;
        Ok(state
            .policies
            .iter()
            .find(|b| b.policy.order_no == order_no && b.policy.producer_id == producer_id)
            .cloned())
    }

    async fn find_by_policy_no(&self, policy_no: &str) -> ServiceResult<Option<PolicyBundle>> {
        let state = self.state.lock().await;
        Ok(state
            .policies
            .iter()
            .find(|b| b.policy.policy_no == policy_no)
            .cloned())
    }

    async fn policy_no_exists(&self, policy_no: &str) -> ServiceResult<bool> {
        let state = self.state.lock().await;
        Ok(state.policies.iter().any(|b| b.policy.policy_no == policy_no))
    }

    async fn repeat_insureds(
        &self,
        query: &RepeatInsuredQuery,
    ) -> ServiceResult<Vec<BTreeMap<String, String>>> {
        let state = self.state.lock().await;
        let candidates: Vec<&PolicyBundle> = state
            .policies
            .iter()
            .filter(|b| {
                b.policy.status == PolicyStatus::Valid
                    && b.policy.product_id == query.product_id
                    && b.policy.product_version == query.product_version
                    && b.policy.plan_id == query.plan_id
                    && b.policy.effective_time <= query.expiry_time
                    && b.policy.expiry_time >= query.effective_time
            })
            .collect();

        let matched = query
            .keys
            .iter()
            .filter(|key| {
                candidates
                    .iter()
                    .flat_map(|b| b.insureds.iter())
                    .any(|insured| matches_key(insured, key))
            })
            .cloned()
            .collect();
        Ok(matched)
    }

    async fn create_policy(&self, bundle: &PolicyBundle) -> ServiceResult<()> {
        let mut state = self.state.lock().await;
        if state
            .policies
            .iter()
            .any(|b| b.policy.policy_no == bundle.policy.policy_no)
        {
            return Err(ServiceError::internal("policy number already bound")
                .with_target("policyNo")
                .untrusted());
        }
        state.policies.push(bundle.clone());
        Ok(())
    }

    async fn apply_endorsement(&self, save: &EndorsementSave) -> ServiceResult<()> {
        let mut state = self.state.lock().await;
        let slot = state
            .policies
            .iter_mut()
            .find(|b| b.policy.id == save.updated.policy.id)
            .ok_or_else(|| {
                ServiceError::internal("endorsement targets a missing policy").untrusted()
            })?;
        *slot = save.updated.clone();
        state.endorsements.push(save.endorsement.clone());
        state.snapshots.push(save.snapshot.clone());
        Ok(())
    }
}

/// True when the stored insured carries every value the key names.
fn matches_key(insured: &InsuredRecord, key: &BTreeMap<String, String>) -> bool {
    key.iter().all(|(field, value)| &stored_value(insured, field) == value)
}

/// Normalised field values, matching how query keys are built.
fn stored_value(insured: &InsuredRecord, field: &str) -> String {
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
