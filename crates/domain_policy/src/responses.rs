//! Wire-level response shapes for the policy surface

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use crate::draft::{PolicyBundle, PolicyStatus};
use crate::endorsement::EndorsementDetail;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantView {
    pub no: String,
    pub name: Option<String>,
    pub id_type: Option<String>,
    pub id_no: Option<String>,
    pub gender: Option<String>,
    pub birth: Option<DateTime<Utc>>,
    pub contact_no: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsuredView {
    pub no: String,
    pub relationship: Option<String>,
    pub name: Option<String>,
    pub id_type: Option<String>,
    pub id_no: Option<String>,
    pub gender: Option<String>,
    pub birth: Option<DateTime<Utc>>,
    pub contact_no: Option<String>,
    pub email: Option<String>,
    pub premium: Decimal,
}

/// The full view of a bound policy, returned by acceptance, renewal and reads.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyResponse {
    pub order_no: String,
    pub policy_no: String,
    pub endorse_no: String,
    pub contract_code: String,
    pub contract_version: String,
    pub product_code: String,
    pub product_version: String,
    pub plan_code: String,
    pub effective_time: DateTime<Utc>,
    pub expiry_time: DateTime<Utc>,
    pub bound_time: DateTime<Utc>,
    pub premium: Decimal,
    pub status: PolicyStatus,
    pub extensions: Value,
    pub applicants: Vec<ApplicantView>,
    pub insureds: Vec<InsuredView>,
}

impl PolicyResponse {
    pub fn from_bundle(bundle: &PolicyBundle) -> Self {
        let policy = &bundle.policy;
        Self {
            order_no: policy.order_no.clone(),
            policy_no: policy.policy_no.clone(),
            endorse_no: policy.endorse_no.clone(),
            contract_code: policy.contract_code.clone(),
            contract_version: policy.contract_version.clone(),
            product_code: policy.product_code.clone(),
            product_version: policy.product_version.clone(),
            plan_code: policy.plan_code.clone(),
            effective_time: policy.effective_time,
            expiry_time: policy.expiry_time,
            bound_time: policy.bound_time,
            premium: policy.premium,
            status: policy.status,
            extensions: policy.extensions.clone(),
            applicants: bundle
                .applicants
                .iter()
                .map(|a| ApplicantView {
                    no: a.no.clone(),
                    name: a.name.clone(),
                    id_type: a.id_type.clone(),
                    id_no: a.id_no.clone(),
                    gender: a.gender.clone(),
                    birth: a.birth,
                    contact_no: a.contact_no.clone(),
                    email: a.email.clone(),
                })
                .collect(),
            insureds: bundle
                .insureds
                .iter()
                .map(|i| InsuredView {
                    no: i.no.clone(),
                    relationship: i.relationship.clone(),
                    name: i.name.clone(),
                    id_type: i.id_type.clone(),
                    id_no: i.id_no.clone(),
                    gender: i.gender.clone(),
                    birth: i.birth,
                    contact_no: i.contact_no.clone(),
                    email: i.email.clone(),
                    premium: i.premium,
                })
                .collect(),
        }
    }
}

/// The result of acceptance: the bound policy, flagged when the request was
/// a replay of an already-bound order.
#[derive(Debug, Clone)]
pub struct AcceptOutcome {
    pub replayed: bool,
    pub policy: PolicyResponse,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteInsuredView {
    pub name: Option<String>,
    pub premium: Decimal,
}

/// A priced but unbound submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub plan_code: String,
    pub effective_time: DateTime<Utc>,
    pub expiry_time: DateTime<Utc>,
    pub premium: Decimal,
    pub insureds: Vec<QuoteInsuredView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub policy_no: String,
    pub endorse_no: String,
    /// Negative when premium is returned to the producer.
    pub difference: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndorseResponse {
    pub policy_no: String,
    pub endorse_no: String,
    pub difference: Decimal,
    pub details: Vec<EndorsementDetail>,
}
