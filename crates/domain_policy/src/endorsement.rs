//! Endorsement records
//!
//! Every change to a bound policy (field endorsement or cancellation) is
//! written as an endorsement: a header row, one detail row per changed field,
//! and a snapshot of the policy as it stood before the change.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::draft::PolicyBundle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndorsementType {
    Endorse,
    Cancel,
}

/// Which row a detail targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailScope {
    Policy,
    Applicant,
    Insured,
}

/// A single before/after field change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndorsementDetail {
    #[serde(rename = "type")]
    pub scope: DetailScope,
    pub field: String,
    pub original: Value,
    pub current: Value,
    /// Party number for applicant/insured scoped details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_no: Option<String>,
}

impl EndorsementDetail {
    pub fn policy(field: &str, original: Value, current: Value) -> Self {
        Self {
            scope: DetailScope::Policy,
            field: field.to_string(),
            original,
            current,
            target_no: None,
        }
    }

    pub fn applicant(no: &str, field: &str, original: Value, current: Value) -> Self {
        Self {
            scope: DetailScope::Applicant,
            field: field.to_string(),
            original,
            current,
            target_no: Some(no.to_string()),
        }
    }

    pub fn insured(no: &str, field: &str, original: Value, current: Value) -> Self {
        Self {
            scope: DetailScope::Insured,
            field: field.to_string(),
            original,
            current,
            target_no: Some(no.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndorsementRecord {
    pub id: Uuid,
    pub policy_id: Uuid,
    pub endorse_no: String,
    #[serde(rename = "type")]
    pub kind: EndorsementType,
    /// Premium difference the endorsement produced, negative for refunds.
    pub difference: Decimal,
    pub details: Vec<EndorsementDetail>,
    pub created_at: DateTime<Utc>,
}

/// The policy as it stood before the endorsement was applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySnapshot {
    pub policy_id: Uuid,
    pub endorse_no: String,
    pub content: Value,
}

impl PolicySnapshot {
    /// Captures the pre-change state of a bundle.
    pub fn capture(bundle: &PolicyBundle, endorse_no: &str) -> Self {
        Self {
            policy_id: bundle.policy.id,
            endorse_no: endorse_no.to_string(),
            content: serde_json::json!({
                "policy": bundle.policy,
                "applicants": bundle.applicants,
                "insureds": bundle.insureds,
            }),
        }
    }
}

/// Everything an endorsement writes, applied atomically by the store.
#[derive(Debug, Clone)]
pub struct EndorsementSave {
    pub endorsement: EndorsementRecord,
    pub snapshot: PolicySnapshot,
    pub updated: PolicyBundle,
}

/// Rolls an endorsement number forward: "000" -> "001".
///
/// Numbers are three digits, zero padded. A malformed stored number is a
/// data integrity fault, not a caller mistake.
pub fn next_endorse_no(current: &str) -> core_kernel::ServiceResult<String> {
    let n: u32 = current.parse().map_err(|_| {
        core_kernel::ServiceError::internal("policy carries a malformed endorse number")
            .untrusted()
    })?;
    Ok(format!("{:03}", n + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn details_serialise_with_type_tag() {
        let detail = EndorsementDetail::insured("abc", "premium", json!(10), json!(15));
        let v = serde_json::to_value(&detail).unwrap();
        assert_eq!(v["type"], json!("insured"));
        assert_eq!(v["targetNo"], json!("abc"));
    }

    #[test]
    fn policy_details_omit_target() {
        let detail = EndorsementDetail::policy("premium", json!(10), json!(15));
        let v = serde_json::to_value(&detail).unwrap();
        assert!(v.get("targetNo").is_none());
    }

    #[test]
    fn endorse_numbers_roll_forward_zero_padded() {
        assert_eq!(next_endorse_no("000").unwrap(), "001");
        assert_eq!(next_endorse_no("009").unwrap(), "010");
        assert_eq!(next_endorse_no("099").unwrap(), "100");
        assert!(next_endorse_no("x1").is_err());
    }
}
