//! Policy wire model and persisted records
//!
//! An acceptance request arrives as an [`AcceptRequest`], is normalised into a
//! [`PolicyDraft`] by basal validation, mutated by the adjustment pass, and
//! finally bound into a [`PolicyBundle`] (policy row plus party rows).

use biz_config::BizConfig;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Lifecycle status of a bound policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyStatus {
    Valid,
    Canceled,
}

impl PolicyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyStatus::Valid => "valid",
            PolicyStatus::Canceled => "canceled",
        }
    }
}

/// Applicant as submitted by the producer.
///
/// Every field is optional on the wire; the business configuration decides
/// which ones are required, defaulted, or stripped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicantDraft {
    pub name: Option<String>,
    pub id_type: Option<String>,
    pub id_no: Option<String>,
    pub gender: Option<String>,
    pub birth: Option<DateTime<Utc>>,
    pub contact_no: Option<String>,
    pub email: Option<String>,
}

/// Insured as submitted by the producer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InsuredDraft {
    pub relationship: Option<String>,
    pub name: Option<String>,
    pub id_type: Option<String>,
    pub id_no: Option<String>,
    pub gender: Option<String>,
    pub birth: Option<DateTime<Utc>>,
    pub contact_no: Option<String>,
    pub email: Option<String>,
    pub premium: Option<Decimal>,
}

/// Raw acceptance request body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AcceptRequest {
    pub order_no: Option<String>,
    pub contract_code: Option<String>,
    pub contract_version: Option<String>,
    pub plan_code: Option<String>,
    pub effective_time: Option<DateTime<Utc>>,
    pub expiry_time: Option<DateTime<Utc>>,
    pub premium: Option<Decimal>,
    pub extensions: Option<Value>,
    pub applicants: Vec<ApplicantDraft>,
    pub insureds: Vec<InsuredDraft>,
}

/// Acceptance request after basal validation, carried through the two
/// schema passes and the adjustment pass.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDraft {
    pub order_no: String,
    pub contract_code: String,
    pub contract_version: Option<String>,
    pub plan_code: String,
    pub effective_time: Option<DateTime<Utc>>,
    pub expiry_time: Option<DateTime<Utc>>,
    pub premium: Option<Decimal>,
    pub extensions: Value,
    pub applicants: Vec<ApplicantDraft>,
    pub insureds: Vec<InsuredDraft>,
}

/// Bound policy row.
///
/// Catalog codes are denormalised onto the record so reads and endorsements
/// never need a catalog lookup. `biz_config` is the resolved configuration
/// snapshot taken at bind time; every later lifecycle decision uses this
/// snapshot, never a re-resolved one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRecord {
    pub id: Uuid,
    pub order_no: String,
    pub policy_no: String,
    pub endorse_no: String,
    pub producer_id: Uuid,
    pub contract_id: Uuid,
    pub contract_code: String,
    pub contract_version: String,
    pub product_id: Uuid,
    pub product_code: String,
    pub product_version: String,
    pub plan_id: Uuid,
    pub plan_code: String,
    pub effective_time: DateTime<Utc>,
    pub expiry_time: DateTime<Utc>,
    pub bound_time: DateTime<Utc>,
    pub premium: Decimal,
    pub status: PolicyStatus,
    pub extensions: Value,
    pub biz_config: BizConfig,
}

/// Persisted applicant row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantRecord {
    pub no: String,
    pub name: Option<String>,
    pub id_type: Option<String>,
    pub id_no: Option<String>,
    pub gender: Option<String>,
    pub birth: Option<DateTime<Utc>>,
    pub contact_no: Option<String>,
    pub email: Option<String>,
}

/// Persisted insured row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsuredRecord {
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

/// A policy row together with its party rows. The unit of persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyBundle {
    pub policy: PolicyRecord,
    pub applicants: Vec<ApplicantRecord>,
    pub insureds: Vec<InsuredRecord>,
}

impl ApplicantRecord {
    /// Materialises a draft applicant with a freshly assigned party number.
    pub fn from_draft(draft: &ApplicantDraft) -> Self {
        Self {
            no: Uuid::new_v4().simple().to_string(),
            name: draft.name.clone(),
            id_type: draft.id_type.clone(),
            id_no: draft.id_no.clone(),
            gender: draft.gender.clone(),
            birth: draft.birth,
            contact_no: draft.contact_no.clone(),
            email: draft.email.clone(),
        }
    }

    /// Copies party details onto a new row, dropping the party number.
    pub fn replicate(&self) -> ApplicantDraft {
        ApplicantDraft {
            name: self.name.clone(),
            id_type: self.id_type.clone(),
            id_no: self.id_no.clone(),
            gender: self.gender.clone(),
            birth: self.birth,
            contact_no: self.contact_no.clone(),
            email: self.email.clone(),
        }
    }
}

impl InsuredRecord {
    pub fn from_draft(draft: &InsuredDraft) -> Self {
        Self {
            no: Uuid::new_v4().simple().to_string(),
            relationship: draft.relationship.clone(),
            name: draft.name.clone(),
            id_type: draft.id_type.clone(),
            id_no: draft.id_no.clone(),
            gender: draft.gender.clone(),
            birth: draft.birth,
            contact_no: draft.contact_no.clone(),
            email: draft.email.clone(),
            premium: draft.premium.unwrap_or_default(),
        }
    }

    pub fn replicate(&self) -> InsuredDraft {
        InsuredDraft {
            relationship: self.relationship.clone(),
            name: self.name.clone(),
            id_type: self.id_type.clone(),
            id_no: self.id_no.clone(),
            gender: self.gender.clone(),
            birth: self.birth,
            contact_no: self.contact_no.clone(),
            email: self.email.clone(),
            premium: Some(self.premium),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accept_request_tolerates_missing_fields() {
        let req: AcceptRequest = serde_json::from_value(json!({
            "orderNo": "ORD-1",
            "applicants": [{"name": "Alice"}]
        }))
        .unwrap();
        assert_eq!(req.order_no.as_deref(), Some("ORD-1"));
        assert!(req.contract_code.is_none());
        assert_eq!(req.applicants.len(), 1);
        assert!(req.insureds.is_empty());
    }

    #[test]
    fn status_serialises_lowercase() {
        assert_eq!(
            serde_json::to_value(PolicyStatus::Canceled).unwrap(),
            json!("canceled")
        );
    }

    #[test]
    fn record_and_replica_round_trip_party_details() {
        let draft = InsuredDraft {
            relationship: Some("self".into()),
            name: Some("Bob".into()),
            premium: Some(Decimal::new(125, 1)),
            ..Default::default()
        };
        let record = InsuredRecord::from_draft(&draft);
        assert!(!record.no.is_empty());
        let replica = record.replicate();
        assert_eq!(replica.name, draft.name);
        assert_eq!(replica.premium, draft.premium);
    }
}
