//! Claim, compensation-task and notification-task records

use biz_config::ClaimConfig;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    Pending,
    Declined,
    Paying,
    Paid,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Pending => "pending",
            ClaimStatus::Declined => "declined",
            ClaimStatus::Paying => "paying",
            ClaimStatus::Paid => "paid",
        }
    }
}

/// One policy insured named on a claim. `sum_insured` stays zero until the
/// claim moves to `paying`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimInsuredRecord {
    pub no: String,
    pub sum_insured: Decimal,
}

/// A claim against a bound policy.
///
/// `biz_config` is the claim section of the policy's configuration snapshot,
/// frozen again at application time so later policy changes cannot alter a
/// claim already in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRecord {
    pub id: Uuid,
    pub policy_id: Uuid,
    pub policy_no: String,
    pub producer_id: Uuid,
    pub claim_no: String,
    pub status: ClaimStatus,
    pub sum_insured: Decimal,
    pub insureds: Vec<ClaimInsuredRecord>,
    pub biz_config: ClaimConfig,
    pub applied_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Handing,
    Succeed,
    Failure,
}

/// A deferred automatic-compensation work item, one per auto-compensated
/// claim. Failures are terminal: the task records its reasons and a human
/// takes over.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompensationTask {
    pub id: Uuid,
    pub claim_id: Uuid,
    pub compensator: String,
    pub status: TaskStatus,
    pub handled_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub failure_reasons: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl CompensationTask {
    pub fn for_claim(claim: &ClaimRecord, compensator: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            claim_id: claim.id,
            compensator: compensator.to_string(),
            status: TaskStatus::Pending,
            handled_at: None,
            finished_at: None,
            failure_reasons: None,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyStatus {
    Pending,
    Handing,
    Retry,
    Succeed,
    Failure,
}

pub const NOTIFY_CLAIM_STATUS_CHANGE: &str = "ClaimStatusChange";

/// An outbound webhook delivery with its retry bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyTask {
    pub id: Uuid,
    pub producer_id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub body: Value,
    pub status: NotifyStatus,
    pub retries: u32,
    pub retry_at: Option<DateTime<Utc>>,
    pub handled_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NotifyTask {
    /// The notification sent when a claim changes status.
    pub fn claim_status_change(
        producer_id: Uuid,
        claim_no: &str,
        policy_no: &str,
        status: ClaimStatus,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            producer_id,
            kind: NOTIFY_CLAIM_STATUS_CHANGE.to_string(),
            body: serde_json::json!({
                "type": NOTIFY_CLAIM_STATUS_CHANGE,
                "content": {
                    "claimNo": claim_no,
                    "policyNo": policy_no,
                    "status": status,
                },
            }),
            status: NotifyStatus::Pending,
            retries: 0,
            retry_at: None,
            handled_at: None,
            finished_at: None,
            failure_reason: None,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_serialise_lowercase() {
        assert_eq!(serde_json::to_value(ClaimStatus::Paying).unwrap(), "paying");
        assert_eq!(serde_json::to_value(TaskStatus::Succeed).unwrap(), "succeed");
        assert_eq!(serde_json::to_value(NotifyStatus::Retry).unwrap(), "retry");
    }

    #[test]
    fn claim_status_change_carries_the_wire_payload() {
        let task = NotifyTask::claim_status_change(
            Uuid::new_v4(),
            "CLM001",
            "OPC001",
            ClaimStatus::Paying,
            Utc::now(),
        );
        assert_eq!(task.body["type"], "ClaimStatusChange");
        assert_eq!(task.body["content"]["claimNo"], "CLM001");
        assert_eq!(task.body["content"]["status"], "paying");
        assert_eq!(task.status, NotifyStatus::Pending);
        assert_eq!(task.retries, 0);
    }
}
